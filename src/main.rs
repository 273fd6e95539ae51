use std::sync::Arc;

use anyhow::Context;
use evlog::{meta, LogEventConsolePrinter, Logger};
use serenity::model::gateway::GatewayIntents;
use serenity::Client;

use lootpoll_bot::config::Config;
use lootpoll_bot::db::dbclient::DBClient;
use lootpoll_bot::engine::bucket::BucketRules;
use lootpoll_bot::engine::VoteEngine;
use lootpoll_bot::runtime::{get_logger, set_logger};
use lootpoll_bot::support::expiry;

use crate::handler::{BotData, BotHandler};

mod commands;
mod handler;
mod helpers;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let mut logger = Logger::default();
    logger.register(LogEventConsolePrinter::default());
    set_logger(logger);

    if let Err(e) = run().await {
        get_logger().error("Bot exited with error.", meta! {
            "Error" => e,
        });
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let db_client = Arc::new(DBClient::new(&config.database_url).await?);
    db_client.migrate().await?;

    let engine = Arc::new(VoteEngine::new(db_client.clone(), BucketRules::new(config.rule_set)));

    get_logger().info("Vote engine ready.", meta! {
        "RuleSet" => format!("{:?}", config.rule_set),
        "SweepSecs" => config.sweep_every.as_secs(),
    });

    tokio::spawn(expiry::run_expiry_sweep(engine.clone(), config.sweep_every));

    let data = BotData::new(db_client, engine);

    let mut client = Client::builder(&config.token, GatewayIntents::GUILDS)
        .event_handler(BotHandler {})
        .application_id(config.application_id)
        .await
        .context("client initialization error")?;
    client.data.write().await.insert::<BotData>(data);

    client.start_autosharded().await.context("client error")?;

    Ok(())
}
