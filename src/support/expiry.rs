use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use evlog::meta;
use tokio::time::{interval, MissedTickBehavior};

use crate::db::schema::Ballot;
use crate::engine::store::{BallotCatalog, BallotStore};
use crate::engine::VoteEngine;
use crate::runtime::get_logger;

#[derive(Debug, Default)]
pub struct SweepReport {
    pub closed: Vec<Ballot>,
    pub expired_offers: usize,
}

/// Closes expired ballots and drops stale replacement offers every `every`
/// until the process exits.
pub async fn run_expiry_sweep<S>(engine: Arc<VoteEngine<S>>, every: Duration)
    where S: BallotStore + BallotCatalog + ?Sized
{
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if let Err(e) = sweep_once(engine.as_ref(), Utc::now()).await {
            get_logger().error("Expiry sweep failed.", meta! {
                "Error" => e,
            });
        }
    }
}

pub async fn sweep_once<S>(engine: &VoteEngine<S>, now: DateTime<Utc>) -> anyhow::Result<SweepReport>
    where S: BallotStore + BallotCatalog + ?Sized
{
    let expired_offers = engine.expire_offers(now);
    if expired_offers > 0 {
        get_logger().debug("Dropped stale replacement offers.", meta! {
            "Expired" => expired_offers,
            "Pending" => engine.pending_offers(),
        });
    }

    let closed = engine.store().close_expired_ballots(now).await?;

    for ballot in &closed {
        get_logger().info("Closed expired ballot.", meta! {
            "GuildID" => ballot.id_guild,
            "BallotID" => ballot.id,
            "BallotName" => ballot.name,
        });
    }

    Ok(SweepReport { closed, expired_offers })
}
