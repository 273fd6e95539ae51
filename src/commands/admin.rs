use chrono::{Duration, Utc};
use evlog::meta;
use serenity::builder::{CreateApplicationCommand, CreateApplicationCommandOption};
use serenity::client::Context;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::{ApplicationCommandInteraction, CommandDataOption};
use serenity::model::mention::Mentionable;
use serenity::model::permissions::Permissions;

use lootpoll_bot::db::schema::{BossType, Category, NewBallot, VotingContext};
use lootpoll_bot::engine::store::BallotCatalog;
use lootpoll_bot::engine::{UnvoteOutcome, UnvoteRequest};
use lootpoll_bot::runtime::get_logger;

use crate::commands::vote::{find_poll, find_target, reply_engine_error};
use crate::handler::BotData;
use crate::helpers::{command_opt, command_resp};

pub const ADMIN: &str = "admin";

const BOSS_TYPES: [BossType; 3] = [BossType::WorldBoss, BossType::Archboss, BossType::Mixed];
const CATEGORIES: [Category; 3] = [Category::Weapon, Category::Armor, Category::Accessory];

fn poll_opt(opt: &mut CreateApplicationCommandOption) -> &mut CreateApplicationCommandOption {
    opt.name("poll")
        .description("Poll ID or name")
        .required(true)
        .kind(CommandOptionType::String)
}

fn user_opt(opt: &mut CreateApplicationCommandOption) -> &mut CreateApplicationCommandOption {
    opt.name("user")
        .description("Member")
        .required(true)
        .kind(CommandOptionType::User)
}

fn mode_opt(opt: &mut CreateApplicationCommandOption, required: bool) -> &mut CreateApplicationCommandOption {
    opt.name("mode")
        .description("Voting mode")
        .required(required)
        .kind(CommandOptionType::String);

    for context in VotingContext::ALL {
        opt.add_string_choice(context.label(), context.as_str());
    }

    opt
}

pub fn admin_builder(cmd: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    cmd.name(ADMIN)
        .description("Manage loot polls")
        .default_member_permissions(Permissions::ADMINISTRATOR)
        .dm_permission(false)
        .create_option(|sub| sub
            .name("create")
            .description("Create a new poll")
            .kind(CommandOptionType::SubCommand)
            .create_sub_option(|opt| opt
                .name("name")
                .description("Poll name")
                .required(true)
                .kind(CommandOptionType::String))
            .create_sub_option(|opt| {
                opt.name("type")
                    .description("Boss type")
                    .required(true)
                    .kind(CommandOptionType::String);

                for boss_type in BOSS_TYPES {
                    opt.add_string_choice(boss_type.as_str(), boss_type.as_str());
                }

                opt
            })
            .create_sub_option(|opt| mode_opt(opt, true))
            .create_sub_option(|opt| opt
                .name("expires_hours")
                .description("Auto-close after N hours")
                .required(false)
                .kind(CommandOptionType::Integer)))
        .create_option(|sub| sub
            .name("additem")
            .description("Add an item to a poll")
            .kind(CommandOptionType::SubCommand)
            .create_sub_option(poll_opt)
            .create_sub_option(|opt| opt
                .name("item")
                .description("Item name")
                .required(true)
                .kind(CommandOptionType::String))
            .create_sub_option(|opt| {
                opt.name("category")
                    .description("Category")
                    .required(true)
                    .kind(CommandOptionType::String);

                for category in CATEGORIES {
                    opt.add_string_choice(category.as_str(), category.as_str());
                }

                opt
            })
            .create_sub_option(|opt| opt
                .name("slot")
                .description("Slot or weapon type, e.g. chest, earring, gs")
                .required(true)
                .kind(CommandOptionType::String)))
        .create_option(|sub| sub
            .name("close")
            .description("Close a poll")
            .kind(CommandOptionType::SubCommand)
            .create_sub_option(poll_opt))
        .create_option(|sub| sub
            .name("wipe")
            .description("Delete a poll with its items and votes")
            .kind(CommandOptionType::SubCommand)
            .create_sub_option(poll_opt))
        .create_option(|sub| sub
            .name("removevote")
            .description("Remove a member's vote for an item")
            .kind(CommandOptionType::SubCommand)
            .create_sub_option(poll_opt)
            .create_sub_option(user_opt)
            .create_sub_option(|opt| opt
                .name("item")
                .description("Item name")
                .required(true)
                .kind(CommandOptionType::String))
            .create_sub_option(|opt| mode_opt(opt, false)))
        .create_option(|sub| sub
            .name("clearvotes")
            .description("Clear all of a member's votes in a poll")
            .kind(CommandOptionType::SubCommand)
            .create_sub_option(poll_opt)
            .create_sub_option(user_opt))
}

fn is_admin(interaction: &ApplicationCommandInteraction) -> bool {
    interaction.member.as_ref()
        .and_then(|m| m.permissions)
        .map_or(false, |p| p.administrator())
}

pub async fn admin(ctx: Context, interaction: ApplicationCommandInteraction) -> anyhow::Result<()> {
    command_resp::reply_deferred_ack(&ctx, &interaction).await?;

    let id_guild = match interaction.guild_id {
        None => {
            command_resp::reply_deferred_result(&ctx, &interaction, "Loot polls can only be used in a server.").await?;
            return Ok(());
        }
        Some(v) => v.0,
    };

    if !is_admin(&interaction) {
        get_logger().info("Non-admin attempted admin command.", meta! {
            "GuildID" => id_guild,
            "UserID" => interaction.user.id,
        });
        command_resp::reply_deferred_result(&ctx, &interaction, "Admin only.").await?;
        return Ok(());
    }

    let data = ctx.data.read().await;
    let data = data.get::<BotData>().ok_or_else(|| anyhow::anyhow!("bot data is not registered"))?;

    let (sub, options) = match command_opt::find_subcommand(&interaction.data.options) {
        None => {
            command_resp::reply_deferred_result(&ctx, &interaction, "Missing subcommand.").await?;
            return Ok(());
        }
        Some(v) => v,
    };

    get_logger().info("Admin action.", meta! {
        "GuildID" => id_guild,
        "UserID" => interaction.user.id,
        "Subcommand" => sub,
    });

    match sub {
        "create" => create(&ctx, &interaction, data, id_guild, options).await,
        "additem" => add_item(&ctx, &interaction, data, id_guild, options).await,
        "close" => close(&ctx, &interaction, data, id_guild, options).await,
        "wipe" => wipe(&ctx, &interaction, data, id_guild, options).await,
        "removevote" => remove_vote(&ctx, &interaction, data, id_guild, options).await,
        "clearvotes" => clear_votes(&ctx, &interaction, data, id_guild, options).await,
        other => command_resp::reply_deferred_result(&ctx, &interaction, format!("Unknown subcommand `{}`.", other)).await,
    }
}

async fn create(
    ctx: &Context,
    interaction: &ApplicationCommandInteraction,
    data: &BotData,
    id_guild: u64,
    options: &[CommandDataOption],
) -> anyhow::Result<()> {
    let name = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "name").await? {
        None => return Ok(()),
        Some(v) => v,
    };
    let boss_type = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "type").await? {
        None => return Ok(()),
        Some(v) => v,
    };
    let mode = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "mode").await? {
        None => return Ok(()),
        Some(v) => v,
    };

    let (boss_type, context) = match (boss_type.parse::<BossType>(), mode.parse::<VotingContext>()) {
        (Ok(b), Ok(c)) => (b, c),
        _ => {
            command_resp::reply_deferred_result(ctx, interaction, "Invalid type or mode.").await?;
            return Ok(());
        }
    };

    let expires_at = command_opt::find_integer_opt(options, "expires_hours")
        .filter(|h| *h > 0)
        .map(|h| Utc::now() + Duration::hours(h));

    if data.db_client.find_ballot_by_name(id_guild, &name).await?.is_some() {
        command_resp::reply_deferred_result(ctx, interaction, "A poll with that name already exists.").await?;
        return Ok(());
    }

    let ballot = data.db_client.create_ballot(&NewBallot {
        id_guild,
        name,
        expires_at,
        boss_type,
        context,
    }).await?;

    get_logger().info("Created ballot.", meta! {
        "GuildID" => id_guild,
        "BallotID" => ballot.id,
        "BallotName" => ballot.name,
    });

    command_resp::reply_deferred_result(ctx, interaction, format!(
        "Created poll **{}** (ID {}).", ballot.name, ballot.id
    )).await
}

async fn add_item(
    ctx: &Context,
    interaction: &ApplicationCommandInteraction,
    data: &BotData,
    id_guild: u64,
    options: &[CommandDataOption],
) -> anyhow::Result<()> {
    let poll = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "poll").await? {
        None => return Ok(()),
        Some(v) => v,
    };
    let item = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "item").await? {
        None => return Ok(()),
        Some(v) => v,
    };
    let category = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "category").await? {
        None => return Ok(()),
        Some(v) => v,
    };
    let slot = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "slot").await? {
        None => return Ok(()),
        Some(v) => v,
    };

    let category = match category.parse::<Category>() {
        Ok(v) => v,
        Err(_) => {
            command_resp::reply_deferred_result(ctx, interaction, "Category must be weapon, armor, or accessory.").await?;
            return Ok(());
        }
    };

    let ballot = match find_poll(ctx, interaction, &data.db_client, id_guild, &poll).await? {
        None => return Ok(()),
        Some(v) => v,
    };

    if !ballot.open {
        command_resp::reply_deferred_result(ctx, interaction, "Poll is closed.").await?;
        return Ok(());
    }

    if data.db_client.find_entry_by_name(ballot.id, &item).await?.is_some() {
        command_resp::reply_deferred_result(ctx, interaction, "That item already exists in this poll.").await?;
        return Ok(());
    }

    let entry = data.db_client.upsert_entry(ballot.id, &item, category, &slot).await?;

    command_resp::reply_deferred_result(ctx, interaction, format!(
        "Added **{}** ({} • {}) to **{}**.", entry.name, entry.category, entry.slot, ballot.name
    )).await
}

async fn close(
    ctx: &Context,
    interaction: &ApplicationCommandInteraction,
    data: &BotData,
    id_guild: u64,
    options: &[CommandDataOption],
) -> anyhow::Result<()> {
    let poll = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "poll").await? {
        None => return Ok(()),
        Some(v) => v,
    };

    let ballot = match find_poll(ctx, interaction, &data.db_client, id_guild, &poll).await? {
        None => return Ok(()),
        Some(v) => v,
    };

    match data.engine.close_ballot(id_guild, ballot.id).await {
        Ok(true) => command_resp::reply_deferred_result(ctx, interaction, format!("Closed poll **{}**.", ballot.name)).await,
        Ok(false) => command_resp::reply_deferred_result(ctx, interaction, format!("Poll **{}** is already closed.", ballot.name)).await,
        Err(e) => reply_engine_error(ctx, interaction, e).await,
    }
}

async fn wipe(
    ctx: &Context,
    interaction: &ApplicationCommandInteraction,
    data: &BotData,
    id_guild: u64,
    options: &[CommandDataOption],
) -> anyhow::Result<()> {
    let poll = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "poll").await? {
        None => return Ok(()),
        Some(v) => v,
    };

    let ballot = match find_poll(ctx, interaction, &data.db_client, id_guild, &poll).await? {
        None => return Ok(()),
        Some(v) => v,
    };

    match data.engine.delete_ballot(id_guild, ballot.id).await {
        Ok(_) => command_resp::reply_deferred_result(ctx, interaction, format!("Deleted poll **{}**.", ballot.name)).await,
        Err(e) => reply_engine_error(ctx, interaction, e).await,
    }
}

async fn remove_vote(
    ctx: &Context,
    interaction: &ApplicationCommandInteraction,
    data: &BotData,
    id_guild: u64,
    options: &[CommandDataOption],
) -> anyhow::Result<()> {
    let poll = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "poll").await? {
        None => return Ok(()),
        Some(v) => v,
    };
    let user = match command_opt::find_required(ctx, interaction, options, command_opt::find_user_opt, "user").await? {
        None => return Ok(()),
        Some(v) => v,
    };
    let item = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "item").await? {
        None => return Ok(()),
        Some(v) => v,
    };

    let context = match command_opt::find_string_opt(options, "mode") {
        None => None,
        Some(mode) => match mode.parse::<VotingContext>() {
            Ok(v) => Some(v),
            Err(_) => {
                command_resp::reply_deferred_result(ctx, interaction, format!("Unknown mode `{}`.", mode)).await?;
                return Ok(());
            }
        },
    };

    let (ballot, entry) = match find_target(ctx, interaction, &data.db_client, id_guild, &poll, &item).await? {
        None => return Ok(()),
        Some(v) => v,
    };

    let outcome = data.engine.request_unvote(UnvoteRequest {
        id_guild,
        id_user: user.id.0,
        id_ballot: ballot.id,
        id_entry: entry.id,
        context,
    }).await;

    match outcome {
        Ok(UnvoteOutcome::Removed(_)) => command_resp::reply_deferred_result(ctx, interaction, format!(
            "Removed {}'s vote for **{}** in **'{}'**.", user.mention(), entry.name, ballot.name
        )).await,
        Ok(UnvoteOutcome::NotHeld) => command_resp::reply_deferred_result(ctx, interaction, format!(
            "{} had no vote on **{}** in **'{}'**.", user.mention(), entry.name, ballot.name
        )).await,
        Err(e) => reply_engine_error(ctx, interaction, e).await,
    }
}

async fn clear_votes(
    ctx: &Context,
    interaction: &ApplicationCommandInteraction,
    data: &BotData,
    id_guild: u64,
    options: &[CommandDataOption],
) -> anyhow::Result<()> {
    let poll = match command_opt::find_required(ctx, interaction, options, command_opt::find_string_opt, "poll").await? {
        None => return Ok(()),
        Some(v) => v,
    };
    let user = match command_opt::find_required(ctx, interaction, options, command_opt::find_user_opt, "user").await? {
        None => return Ok(()),
        Some(v) => v,
    };

    let ballot = match find_poll(ctx, interaction, &data.db_client, id_guild, &poll).await? {
        None => return Ok(()),
        Some(v) => v,
    };

    match data.engine.clear_votes(id_guild, ballot.id, user.id.0).await {
        Ok(removed) => command_resp::reply_deferred_result(ctx, interaction, format!(
            "Cleared {} vote(s) for {} in **'{}'**.", removed, user.mention(), ballot.name
        )).await,
        Err(e) => reply_engine_error(ctx, interaction, e).await,
    }
}
