use std::collections::HashSet;
use std::sync::Arc;

use evlog::meta;
use serenity::async_trait;
use serenity::client::{Context, EventHandler};
use serenity::model::application::interaction::Interaction;
use serenity::model::gateway::Ready;
use serenity::model::guild::Guild;
use serenity::prelude::TypeMapKey;

use lootpoll_bot::db::dbclient::DBClient;
use lootpoll_bot::engine::VoteEngine;
use lootpoll_bot::runtime::get_logger;

use crate::commands;
use crate::commands::replace;

pub struct BotData {
    pub db_client: Arc<DBClient>,
    pub engine: Arc<VoteEngine<DBClient>>,
}

impl BotData {
    pub fn new(db_client: Arc<DBClient>, engine: Arc<VoteEngine<DBClient>>) -> Self {
        Self {
            db_client,
            engine,
        }
    }
}

impl TypeMapKey for BotData {
    type Value = BotData;
}

pub struct BotHandler {}

impl BotHandler {
    async fn register_commands(&self, ctx: &Context, guild: &Guild) -> anyhow::Result<()> {
        let existing = guild.id.get_application_commands(&ctx.http).await?
            .into_iter()
            .map(|v| v.name)
            .collect::<HashSet<_>>();

        for cmd in commands::COMMANDS {
            let whitelisted = match cmd.whitelisted_servers {
                None => true,
                Some(servers) => servers.iter().any(|v| v.0 == guild.id.0),
            };

            if !whitelisted {
                get_logger().debug("Command is not allowed in this server.", meta! {
                    "GuildID" => guild.id,
                    "GuildName" => guild.name,
                    "Command" => cmd.name
                });
                continue;
            }

            if existing.contains(cmd.name) && !cmd.re_register {
                get_logger().debug("Command already registered in this server.", meta! {
                    "GuildID" => guild.id,
                    "GuildName" => guild.name,
                    "Command" => cmd.name
                });
                continue;
            }

            let created = guild.id.create_application_command(&ctx.http, |c| {
                (cmd.builder)(c)
            }).await?;

            get_logger().debug("Registered command in server.", meta! {
                "GuildID" => guild.id,
                "GuildName" => guild.name,
                "Command" => cmd.name,
                "ID" => created.id
            });
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for BotHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        get_logger().info("Connected to gateway.", meta! {
            "User" => ready.user.name,
            "Guilds" => ready.guilds.len(),
        });
    }

    async fn guild_create(&self, ctx: Context, guild: Guild, _is_new: bool) {
        get_logger().info("Guild ready.", meta![
            "ID" => guild.id,
            "Name" => guild.name,
        ]);

        if let Err(e) = self.register_commands(&ctx, &guild).await {
            get_logger().error("Failed to register commands in server.", meta! {
                "GuildID" => guild.id,
                "GuildName" => guild.name,
                "Error" => e,
            });
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::ApplicationCommand(interaction) => {
                let guild_id = interaction.guild_id.map(|v| v.to_string()).unwrap_or_default();

                get_logger().info("Command interaction.", meta! {
                    "GuildID" => guild_id,
                    "InteractionID" => interaction.id,
                    "CommandID" => interaction.data.id,
                    "CommandName" => interaction.data.name
                });

                let handler = match commands::get_handler(&interaction.data.name) {
                    None => return,
                    Some(v) => v,
                };

                let interaction_id = interaction.id;
                let command_id = interaction.data.id;
                let command_name = interaction.data.name.clone();

                let r: anyhow::Result<()> = handler(ctx, interaction).await;
                if let Err(e) = r {
                    get_logger().error("Error occurred in interaction processor.", meta! {
                        "GuildID" => guild_id,
                        "InteractionID" => interaction_id,
                        "CommandID" => command_id,
                        "CommandName" => command_name,
                        "Error" => e,
                    });
                }
            }
            Interaction::MessageComponent(component) => {
                if !component.data.custom_id.starts_with(replace::PREFIX) {
                    return;
                }

                let interaction_id = component.id;
                let custom_id = component.data.custom_id.clone();

                if let Err(e) = replace::replace(ctx, component).await {
                    get_logger().error("Error occurred in component processor.", meta! {
                        "InteractionID" => interaction_id,
                        "CustomID" => custom_id,
                        "Error" => e,
                    });
                }
            }
            _ => {}
        }
    }
}
