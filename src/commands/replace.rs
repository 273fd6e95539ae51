use evlog::meta;
use once_cell::sync::Lazy;
use regex::Regex;
use serenity::client::Context;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;

use lootpoll_bot::engine::negotiator::{ReplacementChoice, Resolution};
use lootpoll_bot::runtime::get_logger;

use crate::commands::vote::engine_error_text;
use crate::handler::BotData;
use crate::helpers::command_resp;

pub const PREFIX: &str = "replace:";

static CUSTOM_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^replace:(\d+):(\d+|cancel)$").unwrap());

pub fn custom_id(id_offer: u64, choice: ReplacementChoice) -> String {
    match choice {
        ReplacementChoice::Evict(i) => format!("{}{}:{}", PREFIX, id_offer, i),
        ReplacementChoice::Cancel => format!("{}{}:cancel", PREFIX, id_offer),
    }
}

pub fn parse_custom_id(custom_id: &str) -> Option<(u64, ReplacementChoice)> {
    let caps = CUSTOM_ID.captures(custom_id)?;

    let id_offer = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let choice = match caps.get(2)?.as_str() {
        "cancel" => ReplacementChoice::Cancel,
        i => ReplacementChoice::Evict(i.parse::<usize>().ok()?),
    };

    Some((id_offer, choice))
}

pub async fn replace(ctx: Context, component: MessageComponentInteraction) -> anyhow::Result<()> {
    let (id_offer, choice) = match parse_custom_id(&component.data.custom_id) {
        None => {
            get_logger().info("Malformed replacement button.", meta! {
                "InteractionID" => component.id,
                "CustomID" => component.data.custom_id,
            });
            command_resp::update_component_result(&ctx, &component, "This button is no longer valid.").await?;
            return Ok(());
        }
        Some(v) => v,
    };

    let data = ctx.data.read().await;
    let data = data.get::<BotData>().ok_or_else(|| anyhow::anyhow!("bot data is not registered"))?;

    let result = data.engine.resolve_replacement(id_offer, component.user.id.0, choice).await;

    let text = match result {
        Ok(Resolution::Swapped { evicted, entry, .. }) => format!(
            "Replaced your vote for **{}** in *'{}'* with **{}**.",
            evicted.entry.name, evicted.ballot_name, entry.name,
        ),
        Ok(Resolution::AlreadyHeld { entry }) => format!(
            "You already hold a vote for **{}**; nothing was replaced.", entry.name,
        ),
        Ok(Resolution::Cancelled) => "Cancelled; your votes are unchanged.".to_owned(),
        Err(e) => match engine_error_text(&e) {
            Some(text) => text,
            None => {
                command_resp::update_component_result(&ctx, &component, "Error occurred upon attempt to replace vote.").await?;
                return Err(e.into());
            }
        },
    };

    command_resp::update_component_result(&ctx, &component, text).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_evict_and_cancel() {
        assert_eq!(parse_custom_id("replace:17:0"), Some((17, ReplacementChoice::Evict(0))));
        assert_eq!(parse_custom_id("replace:17:3"), Some((17, ReplacementChoice::Evict(3))));
        assert_eq!(parse_custom_id("replace:4:cancel"), Some((4, ReplacementChoice::Cancel)));
    }

    #[test]
    fn rejects_malformed() {
        for id in ["", "replace:", "replace:1", "replace:x:0", "replace:1:-1", "replace:1:2:3", "vote:1:0", "replace:1:CANCEL"] {
            assert_eq!(parse_custom_id(id), None, "{}", id);
        }
        assert_eq!(parse_custom_id("replace:99999999999999999999999:0"), None);
    }

    #[test]
    fn largest_offer_id_fits() {
        let id = custom_id(u64::MAX, ReplacementChoice::Evict(1));
        assert!(id.len() <= 100);
        assert_eq!(parse_custom_id(&id), Some((u64::MAX, ReplacementChoice::Evict(1))));
    }

    #[test]
    fn custom_id_parses_back() {
        for choice in [ReplacementChoice::Evict(0), ReplacementChoice::Evict(12), ReplacementChoice::Cancel] {
            assert_eq!(parse_custom_id(&custom_id(8, choice)), Some((8, choice)));
        }
    }
}
