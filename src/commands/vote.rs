use evlog::meta;
use itertools::Itertools;
use serenity::builder::CreateApplicationCommand;
use serenity::client::Context;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::component::ButtonStyle;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;

use lootpoll_bot::db::dbclient::DBClient;
use lootpoll_bot::db::schema::{Ballot, Entry, VotingContext};
use lootpoll_bot::engine::error::{EngineError, Missing};
use lootpoll_bot::engine::negotiator::{ReplacementChoice, ReplacementOffer};
use lootpoll_bot::engine::store::{resolve_ballot, BallotCatalog};
use lootpoll_bot::engine::{UnvoteOutcome, UnvoteRequest, VoteOutcome, VoteRequest};
use lootpoll_bot::runtime::get_logger;

use crate::commands::replace;
use crate::handler::BotData;
use crate::helpers::command_resp::Button;
use crate::helpers::{command_opt, command_resp};

pub const VOTE: &str = "vote";
pub const UNVOTE: &str = "unvote";

pub fn vote_builder(cmd: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    cmd.name(VOTE)
        .description("Vote for an item in a loot poll")
        .create_option(|opt| opt
            .name("poll")
            .description("Poll ID or name")
            .required(true)
            .kind(CommandOptionType::String))
        .create_option(|opt| opt
            .name("item")
            .description("Item name as listed in the poll")
            .required(true)
            .kind(CommandOptionType::String))
        .create_option(|opt| {
            opt
                .name("mode")
                .description("What the item is for")
                .required(true)
                .kind(CommandOptionType::String);

            for context in VotingContext::ALL {
                opt.add_string_choice(context.label(), context.as_str());
            }

            opt
        })
}

pub fn unvote_builder(cmd: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    cmd.name(UNVOTE)
        .description("Remove your vote for an item in a loot poll")
        .create_option(|opt| opt
            .name("poll")
            .description("Poll ID or name")
            .required(true)
            .kind(CommandOptionType::String))
        .create_option(|opt| opt
            .name("item")
            .description("Item name as listed in the poll")
            .required(true)
            .kind(CommandOptionType::String))
        .create_option(|opt| {
            opt
                .name("mode")
                .description("Only remove the vote for this mode; all modes if omitted")
                .required(false)
                .kind(CommandOptionType::String);

            for context in VotingContext::ALL {
                opt.add_string_choice(context.label(), context.as_str());
            }

            opt
        })
}

pub async fn vote(ctx: Context, interaction: ApplicationCommandInteraction) -> anyhow::Result<()> {
    command_resp::reply_deferred_ack(&ctx, &interaction).await?;

    let id_guild = match interaction.guild_id {
        None => {
            command_resp::reply_deferred_result(&ctx, &interaction, "Loot polls can only be used in a server.").await?;
            return Ok(());
        }
        Some(v) => v.0,
    };
    let id_user = interaction.user.id.0;

    let data = ctx.data.read().await;
    let data = data.get::<BotData>().ok_or_else(|| anyhow::anyhow!("bot data is not registered"))?;

    let options = &interaction.data.options;
    let poll = match command_opt::find_required(&ctx, &interaction, options, command_opt::find_string_opt, "poll").await? {
        None => return Ok(()),
        Some(v) => v,
    };
    let item = match command_opt::find_required(&ctx, &interaction, options, command_opt::find_string_opt, "item").await? {
        None => return Ok(()),
        Some(v) => v,
    };
    let mode = match command_opt::find_required(&ctx, &interaction, options, command_opt::find_string_opt, "mode").await? {
        None => return Ok(()),
        Some(v) => v,
    };

    let context = match mode.parse::<VotingContext>() {
        Ok(v) => v,
        Err(_) => {
            command_resp::reply_deferred_result(&ctx, &interaction, format!("Unknown mode `{}`.", mode)).await?;
            return Ok(());
        }
    };

    let (ballot, entry) = match find_target(&ctx, &interaction, &data.db_client, id_guild, &poll, &item).await? {
        None => return Ok(()),
        Some(v) => v,
    };

    let outcome = data.engine.request_vote(VoteRequest {
        id_guild,
        id_user,
        user_name: invoker_name(&interaction),
        id_ballot: ballot.id,
        id_entry: entry.id,
        context,
    }).await;

    match outcome {
        Ok(VoteOutcome::Recorded(_)) => {
            command_resp::reply_deferred_result(&ctx, &interaction, format!(
                "Voted for **{}** in **'{}'** ({}).", entry.name, ballot.name, context.label()
            )).await?;
        }
        Ok(VoteOutcome::AlreadyHeld) => {
            command_resp::reply_deferred_result(&ctx, &interaction, format!(
                "You already voted for **{}** in **'{}'** ({}).", entry.name, ballot.name, context.label()
            )).await?;
        }
        Ok(VoteOutcome::Denied(offer)) => {
            command_resp::reply_deferred_buttons(&ctx, &interaction, offer_text(&offer), &offer_buttons(&offer)).await?;
        }
        Err(e) => {
            reply_engine_error(&ctx, &interaction, e).await?;
        }
    }

    Ok(())
}

pub async fn unvote(ctx: Context, interaction: ApplicationCommandInteraction) -> anyhow::Result<()> {
    command_resp::reply_deferred_ack(&ctx, &interaction).await?;

    let id_guild = match interaction.guild_id {
        None => {
            command_resp::reply_deferred_result(&ctx, &interaction, "Loot polls can only be used in a server.").await?;
            return Ok(());
        }
        Some(v) => v.0,
    };

    let data = ctx.data.read().await;
    let data = data.get::<BotData>().ok_or_else(|| anyhow::anyhow!("bot data is not registered"))?;

    let options = &interaction.data.options;
    let poll = match command_opt::find_required(&ctx, &interaction, options, command_opt::find_string_opt, "poll").await? {
        None => return Ok(()),
        Some(v) => v,
    };
    let item = match command_opt::find_required(&ctx, &interaction, options, command_opt::find_string_opt, "item").await? {
        None => return Ok(()),
        Some(v) => v,
    };

    let context = match command_opt::find_string_opt(options, "mode") {
        None => None,
        Some(mode) => match mode.parse::<VotingContext>() {
            Ok(v) => Some(v),
            Err(_) => {
                command_resp::reply_deferred_result(&ctx, &interaction, format!("Unknown mode `{}`.", mode)).await?;
                return Ok(());
            }
        },
    };

    let (ballot, entry) = match find_target(&ctx, &interaction, &data.db_client, id_guild, &poll, &item).await? {
        None => return Ok(()),
        Some(v) => v,
    };

    let outcome = data.engine.request_unvote(UnvoteRequest {
        id_guild,
        id_user: interaction.user.id.0,
        id_ballot: ballot.id,
        id_entry: entry.id,
        context,
    }).await;

    match outcome {
        Ok(UnvoteOutcome::Removed(_)) => {
            command_resp::reply_deferred_result(&ctx, &interaction, format!(
                "Removed your vote for **{}** in **'{}'**.", entry.name, ballot.name
            )).await?;
        }
        Ok(UnvoteOutcome::NotHeld) => {
            command_resp::reply_deferred_result(&ctx, &interaction, format!(
                "You have no vote for **{}** in **'{}'**.", entry.name, ballot.name
            )).await?;
        }
        Err(e) => {
            reply_engine_error(&ctx, &interaction, e).await?;
        }
    }

    Ok(())
}

pub async fn find_poll(
    ctx: &Context,
    interaction: &ApplicationCommandInteraction,
    db_client: &DBClient,
    id_guild: u64,
    poll: &str,
) -> anyhow::Result<Option<Ballot>> {
    match resolve_ballot(db_client, id_guild, poll).await {
        Ok(Some(v)) => Ok(Some(v)),
        Ok(None) => {
            get_logger().info("Failed to find poll by ID or name.", meta! {
                "InteractionID" => interaction.id,
                "Poll" => poll,
            });
            command_resp::reply_deferred_result(ctx, interaction, format!("Failed to find poll **'{}'**.", poll)).await?;
            Ok(None)
        }
        Err(e) => {
            command_resp::reply_deferred_result(ctx, interaction, "Error occurred upon attempt to find poll.").await?;
            Err(e)
        }
    }
}

pub async fn find_target(
    ctx: &Context,
    interaction: &ApplicationCommandInteraction,
    db_client: &DBClient,
    id_guild: u64,
    poll: &str,
    item: &str,
) -> anyhow::Result<Option<(Ballot, Entry)>> {
    let ballot = match find_poll(ctx, interaction, db_client, id_guild, poll).await? {
        None => return Ok(None),
        Some(v) => v,
    };

    let entry = match db_client.find_entry_by_name(ballot.id, item).await {
        Ok(Some(v)) => v,
        Ok(None) => {
            get_logger().info("Failed to find item in poll.", meta! {
                "InteractionID" => interaction.id,
                "BallotID" => ballot.id,
                "Item" => item,
            });
            command_resp::reply_deferred_result(ctx, interaction, format!(
                "Poll **'{}'** has no item named **'{}'**.", ballot.name, item
            )).await?;
            return Ok(None);
        }
        Err(e) => {
            command_resp::reply_deferred_result(ctx, interaction, "Error occurred upon attempt to find item.").await?;
            return Err(e);
        }
    };

    Ok(Some((ballot, entry)))
}

fn invoker_name(interaction: &ApplicationCommandInteraction) -> String {
    interaction.member.as_ref()
        .map(|m| m.display_name().to_string())
        .unwrap_or_else(|| interaction.user.name.clone())
}

fn offer_text(offer: &ReplacementOffer) -> String {
    let occupants = offer.occupants().iter()
        .enumerate()
        .map(|(i, held)| format!("**{}.** {} in *'{}'*", i + 1, held.entry.name, held.ballot_name))
        .join("\n");

    format!(
        "You already hold {} of {} **{}** votes for {}:\n{}\n\nPick a vote to replace with **{}**, or cancel.",
        offer.occupants().len(),
        offer.denial.capacity,
        offer.denial.bucket,
        offer.context.label(),
        occupants,
        offer.candidate.name,
    )
}

fn offer_buttons(offer: &ReplacementOffer) -> Vec<Button> {
    let mut buttons = offer.occupants().iter()
        .enumerate()
        .map(|(i, held)| Button {
            custom_id: replace::custom_id(offer.id, ReplacementChoice::Evict(i)),
            label: format!("Replace {}", held.entry.name),
            style: ButtonStyle::Danger,
        })
        .collect::<Vec<_>>();

    buttons.push(Button {
        custom_id: replace::custom_id(offer.id, ReplacementChoice::Cancel),
        label: "Cancel".to_owned(),
        style: ButtonStyle::Secondary,
    });

    buttons
}

/// User-facing text for engine errors that are not faults.
pub fn engine_error_text(e: &EngineError) -> Option<String> {
    let text = match e {
        EngineError::NotFound(Missing::Ballot(_)) => "That poll no longer exists.".to_owned(),
        EngineError::NotFound(Missing::Entry(_)) => "That item no longer exists.".to_owned(),
        EngineError::NotFound(Missing::Offer(_)) => "This choice has already been answered or has expired.".to_owned(),
        EngineError::NotFound(Missing::Occupant(_)) => "That vote is not one of the choices.".to_owned(),
        EngineError::BallotClosed(_) => "Poll is closed.".to_owned(),
        EngineError::DuplicateVote(_) => "That vote was already recorded.".to_owned(),
        EngineError::RaceLost { evicted, denial } => format!(
            "Your vote for **{}** was removed, but the new vote could not be placed: \
            **{}** filled up again ({} of {}). Vote again to pick another replacement.",
            evicted.entry.name, denial.bucket, denial.occupants.len(), denial.capacity,
        ),
        EngineError::Interrupted { evicted, .. } => format!(
            "Your vote for **{}** was removed, but the new vote could not be recorded. \
            Vote again to place it.",
            evicted.entry.name,
        ),
        EngineError::StoreUnavailable(_) => return None,
    };

    Some(text)
}

pub async fn reply_engine_error(ctx: &Context, interaction: &ApplicationCommandInteraction, e: EngineError) -> anyhow::Result<()> {
    match engine_error_text(&e) {
        Some(text) => {
            get_logger().info("Vote request rejected.", meta! {
                "InteractionID" => interaction.id,
                "Reason" => e,
            });
            command_resp::reply_deferred_result(ctx, interaction, text).await
        }
        None => {
            command_resp::reply_deferred_result(ctx, interaction, "Error occurred upon attempt to update votes.").await?;
            Err(e.into())
        }
    }
}
