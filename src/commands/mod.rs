pub mod admin;
pub mod replace;
pub mod vote;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::helpers::command_def::{CommandDef, InteractionHandler};

pub const COMMANDS: &[CommandDef] = &[
    CommandDef {
        name: vote::VOTE,
        builder: vote::vote_builder,
        handler: |c, i| Box::pin(async move { vote::vote(c, i).await }),
        re_register: true,
        whitelisted_servers: None,
    },
    CommandDef {
        name: vote::UNVOTE,
        builder: vote::unvote_builder,
        handler: |c, i| Box::pin(async move { vote::unvote(c, i).await }),
        re_register: true,
        whitelisted_servers: None,
    },
    CommandDef {
        name: admin::ADMIN,
        builder: admin::admin_builder,
        handler: |c, i| Box::pin(async move { admin::admin(c, i).await }),
        re_register: true,
        whitelisted_servers: None,
    },
];

static COMMAND_MAP: Lazy<DashMap<String, InteractionHandler>> = Lazy::new(|| {
    let map = DashMap::new();

    for cmd in COMMANDS {
        map.insert(cmd.name.to_string(), cmd.handler);
    }

    map
});

pub fn get_handler(command_name: &str) -> Option<InteractionHandler> {
    COMMAND_MAP
        .get(command_name)
        .as_ref()
        .map(|entry| *entry.value())
}
