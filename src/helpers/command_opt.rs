use serenity::client::Context;
use serenity::model::application::interaction::application_command::{ApplicationCommandInteraction, CommandDataOption, CommandDataOptionValue};
use serenity::model::user::User;

use crate::helpers::command_resp;

pub fn find_string_opt(options: &[CommandDataOption], name: &str) -> Option<String> {
    options.iter()
        .find(|o| o.name == name)
        .and_then(|o| match &o.resolved {
            Some(CommandDataOptionValue::String(v)) => Some(v.trim().to_owned()),
            _ => None,
        })
        .filter(|v| !v.is_empty())
}

pub fn find_integer_opt(options: &[CommandDataOption], name: &str) -> Option<i64> {
    options.iter()
        .find(|o| o.name == name)
        .and_then(|o| match &o.resolved {
            Some(CommandDataOptionValue::Integer(v)) => Some(*v),
            _ => None,
        })
}

pub fn find_user_opt(options: &[CommandDataOption], name: &str) -> Option<User> {
    options.iter()
        .find(|o| o.name == name)
        .and_then(|o| match &o.resolved {
            Some(CommandDataOptionValue::User(user, _)) => Some(user.clone()),
            _ => None,
        })
}

/// The invoked subcommand and its own options.
pub fn find_subcommand(options: &[CommandDataOption]) -> Option<(&str, &[CommandDataOption])> {
    options.first().map(|o| (o.name.as_str(), o.options.as_slice()))
}

/// Looks up a required option, answering the interaction when it is absent.
pub async fn find_required<T>(
    ctx: &Context,
    interaction: &ApplicationCommandInteraction,
    options: &[CommandDataOption],
    finder: fn(&[CommandDataOption], &str) -> Option<T>,
    name: &str,
) -> anyhow::Result<Option<T>> {
    match finder(options, name) {
        Some(v) => Ok(Some(v)),
        None => {
            command_resp::reply_deferred_result(ctx, interaction, format!("Missing required option `{}`.", name)).await?;
            Ok(None)
        }
    }
}
