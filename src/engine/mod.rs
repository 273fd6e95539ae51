//! Vote eligibility and replacement.
//!
//! [`VoteEngine`] is the entry point for the command layer. Every mutation on
//! a `(guild, context, bucket)` runs under that bucket's lock, from reading the
//! user's snapshot to writing the result, so two requests against the same
//! bucket can never both see a free slot.

pub mod bucket;
pub mod commit;
pub mod eligibility;
pub mod error;
pub mod negotiator;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use evlog::meta;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::schema::{Ballot, Entry, Vote, VoteKey, VotingContext};
use crate::engine::bucket::{BucketKey, BucketRules};
use crate::engine::commit::Committer;
use crate::engine::eligibility::{evaluate, Eligibility};
use crate::engine::error::{EngineError, EngineResult, Missing};
use crate::engine::negotiator::{Negotiator, ReplacementChoice, ReplacementOffer, Resolution};
use crate::engine::store::{BallotCatalog, BallotStore};
use crate::runtime::get_logger;

/// How long a replacement offer stays answerable. Matches the lifetime of a
/// Discord interaction token, after which its buttons can no longer be edited.
pub const OFFER_TTL_MINUTES: i64 = 15;

#[derive(Debug, Clone)]
pub struct VoteRequest {
    pub id_guild: u64,
    pub id_user: u64,
    pub user_name: String,
    pub id_ballot: i32,
    pub id_entry: i32,
    pub context: VotingContext,
}

#[derive(Debug, Clone)]
pub struct UnvoteRequest {
    pub id_guild: u64,
    pub id_user: u64,
    pub id_ballot: i32,
    pub id_entry: i32,
    /// `None` removes the user's vote on the entry in every context.
    pub context: Option<VotingContext>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    Recorded(Vote),
    /// The user already holds this exact vote; nothing was written.
    AlreadyHeld,
    /// The bucket is full; the offer lists what could be replaced.
    Denied(ReplacementOffer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnvoteOutcome {
    Removed(u64),
    NotHeld,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketLock {
    id_guild: u64,
    context: VotingContext,
    bucket: BucketKey,
}

pub struct VoteEngine<S: ?Sized> {
    store: Arc<S>,
    rules: BucketRules,
    negotiator: Negotiator,
    locks: DashMap<BucketLock, Arc<Mutex<()>>>,
}

impl<S: BallotStore + ?Sized> VoteEngine<S> {
    pub fn new(store: Arc<S>, rules: BucketRules) -> Self {
        Self {
            store,
            rules,
            negotiator: Negotiator::new(),
            locks: DashMap::new(),
        }
    }

    pub fn rules(&self) -> &BucketRules {
        &self.rules
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn pending_offers(&self) -> usize {
        self.negotiator.pending()
    }

    pub async fn request_vote(&self, req: VoteRequest) -> EngineResult<VoteOutcome> {
        let (_, entry) = self.load_target(req.id_guild, req.id_ballot, req.id_entry).await?;

        let _guard = self.lock_bucket(req.id_guild, req.context, &entry).await;

        let ballot = self.open_ballot(req.id_guild, req.id_ballot, req.id_user).await?;

        let held = self.store.list_open_votes_for_user(req.id_guild, req.id_user, req.context).await?;

        let key = VoteKey {
            id_ballot: ballot.id,
            id_entry: entry.id,
            id_user: req.id_user,
            context: req.context,
        };
        if held.iter().any(|h| h.vote.key() == key) {
            get_logger().debug("Vote already held.", meta! {
                "GuildID" => req.id_guild,
                "UserID" => req.id_user,
                "Vote" => key,
            });
            return Ok(VoteOutcome::AlreadyHeld);
        }

        match evaluate(&self.rules, &held, &entry, req.context) {
            Eligibility::Allowed => {
                let vote = Vote {
                    id_ballot: ballot.id,
                    id_entry: entry.id,
                    id_user: req.id_user,
                    user_name: req.user_name,
                    context: req.context,
                    time_cast: Utc::now(),
                };

                let vote = Committer::new(self.store.as_ref(), &self.rules).add(vote).await?;

                get_logger().info("Vote recorded.", meta! {
                    "GuildID" => req.id_guild,
                    "UserID" => req.id_user,
                    "BallotName" => ballot.name,
                    "Entry" => entry.name,
                    "Context" => req.context,
                });

                Ok(VoteOutcome::Recorded(vote))
            }
            Eligibility::Denied(denial) => {
                get_logger().info("Vote denied; bucket is full.", meta! {
                    "GuildID" => req.id_guild,
                    "UserID" => req.id_user,
                    "Entry" => entry.name,
                    "Bucket" => denial.bucket,
                    "Capacity" => denial.capacity,
                    "Context" => req.context,
                });

                let offer = self.negotiator.offer(req.id_guild, req.id_user, &req.user_name, req.context, entry, denial);

                Ok(VoteOutcome::Denied(offer))
            }
        }
    }

    pub async fn request_unvote(&self, req: UnvoteRequest) -> EngineResult<UnvoteOutcome> {
        let (ballot, entry) = self.load_target(req.id_guild, req.id_ballot, req.id_entry).await?;

        let contexts = match req.context {
            Some(v) => vec![v],
            None => VotingContext::ALL.to_vec(),
        };

        let committer = Committer::new(self.store.as_ref(), &self.rules);

        let mut removed = 0;
        for context in contexts {
            let _guard = self.lock_bucket(req.id_guild, context, &entry).await;

            removed += committer.remove(&VoteKey {
                id_ballot: ballot.id,
                id_entry: entry.id,
                id_user: req.id_user,
                context,
            }).await?;
        }

        if removed == 0 {
            return Ok(UnvoteOutcome::NotHeld);
        }

        get_logger().info("Vote removed.", meta! {
            "GuildID" => req.id_guild,
            "UserID" => req.id_user,
            "BallotName" => ballot.name,
            "Entry" => entry.name,
            "Removed" => removed,
        });

        Ok(UnvoteOutcome::Removed(removed))
    }

    pub async fn resolve_replacement(&self, id_offer: u64, id_user: u64, choice: ReplacementChoice) -> EngineResult<Resolution> {
        let offer = self.negotiator.take(id_offer, id_user)?;

        if choice == ReplacementChoice::Cancel {
            get_logger().info("Replacement cancelled.", meta! {
                "GuildID" => offer.id_guild,
                "UserID" => offer.id_user,
                "OfferID" => offer.id,
            });
            return Ok(Resolution::Cancelled);
        }

        let id_guild = offer.id_guild;
        let context = offer.context;
        self.load_target(id_guild, offer.candidate.id_ballot, offer.candidate.id).await?;

        let _guard = self.lock_bucket(id_guild, context, &offer.candidate).await;

        // The candidate's ballot may have closed while the offer was pending.
        self.open_ballot(id_guild, offer.candidate.id_ballot, id_user).await?;

        let committer = Committer::new(self.store.as_ref(), &self.rules);
        let result = offer.resolve(&committer, choice).await;

        match &result {
            Ok(Resolution::Swapped { evicted, added, .. }) => {
                get_logger().info("Vote replaced.", meta! {
                    "GuildID" => id_guild,
                    "UserID" => id_user,
                    "Evicted" => evicted.vote.key(),
                    "Added" => added.key(),
                });
            }
            Ok(Resolution::AlreadyHeld { entry }) => {
                get_logger().debug("Replacement skipped; candidate already held.", meta! {
                    "GuildID" => id_guild,
                    "UserID" => id_user,
                    "Entry" => entry.name,
                });
            }
            Ok(Resolution::Cancelled) => {}
            Err(EngineError::RaceLost { evicted, denial }) => {
                get_logger().info("Replacement lost a race; evicted vote was not restored.", meta! {
                    "GuildID" => id_guild,
                    "UserID" => id_user,
                    "Evicted" => evicted.vote.key(),
                    "Bucket" => denial.bucket,
                    "Occupants" => denial.occupants.len(),
                });
            }
            Err(EngineError::Interrupted { evicted, cause }) => {
                get_logger().error("Replacement interrupted after removing the evicted vote.", meta! {
                    "GuildID" => id_guild,
                    "UserID" => id_user,
                    "Evicted" => evicted.vote.key(),
                    "Error" => cause,
                });
            }
            Err(_) => {}
        }

        result
    }

    /// Removes every vote `id_user` holds in the ballot, in any context.
    /// Closed ballots are included so admins can clean them up.
    pub async fn clear_votes(&self, id_guild: u64, id_ballot: i32, id_user: u64) -> EngineResult<u64> {
        let ballot = self.guild_ballot(id_guild, id_ballot).await?;

        let held = self.store.list_user_votes_in_ballot(ballot.id, id_user).await?;
        let committer = Committer::new(self.store.as_ref(), &self.rules);

        let mut removed = 0;
        for h in &held {
            let _guard = self.lock_bucket(id_guild, h.vote.context, &h.entry).await;
            removed += committer.remove(&h.vote.key()).await?;
        }

        get_logger().info("Votes cleared.", meta! {
            "GuildID" => id_guild,
            "UserID" => id_user,
            "BallotName" => ballot.name,
            "Removed" => removed,
        });

        Ok(removed)
    }

    /// Drops offers older than [`OFFER_TTL_MINUTES`] and returns how many went.
    pub fn expire_offers(&self, now: DateTime<Utc>) -> usize {
        self.negotiator.expire(now - Duration::minutes(OFFER_TTL_MINUTES))
    }

    async fn guild_ballot(&self, id_guild: u64, id_ballot: i32) -> EngineResult<Ballot> {
        self.store.get_ballot(id_ballot).await?
            .filter(|b| b.id_guild == id_guild)
            .ok_or(EngineError::NotFound(Missing::Ballot(id_ballot)))
    }

    /// Reads the ballot fresh. Called with the bucket lock held so a close
    /// that lands while waiting for the lock is seen.
    async fn open_ballot(&self, id_guild: u64, id_ballot: i32, id_user: u64) -> EngineResult<Ballot> {
        let ballot = self.guild_ballot(id_guild, id_ballot).await?;

        if !ballot.open {
            get_logger().info("Vote requested on closed ballot.", meta! {
                "GuildID" => id_guild,
                "UserID" => id_user,
                "BallotID" => ballot.id,
                "BallotName" => ballot.name,
            });
            return Err(EngineError::BallotClosed(ballot.id));
        }

        Ok(ballot)
    }

    async fn load_target(&self, id_guild: u64, id_ballot: i32, id_entry: i32) -> EngineResult<(Ballot, Entry)> {
        let ballot = self.guild_ballot(id_guild, id_ballot).await?;

        let entry = self.store.get_entry(id_entry).await?
            .filter(|e| e.id_ballot == ballot.id)
            .ok_or(EngineError::NotFound(Missing::Entry(id_entry)))?;

        Ok((ballot, entry))
    }

    // Nested per-type buckets sit inside their outer bucket, so locking the
    // outer one covers both.
    async fn lock_bucket(&self, id_guild: u64, context: VotingContext, entry: &Entry) -> OwnedMutexGuard<()> {
        let key = BucketLock {
            id_guild,
            context,
            bucket: self.rules.classify_entry(entry).bucket.key,
        };

        let lock = self.locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        lock.lock_owned().await
    }
}

impl<S: BallotStore + BallotCatalog + ?Sized> VoteEngine<S> {
    /// Closes the ballot. Returns `false` if it was already closed.
    pub async fn close_ballot(&self, id_guild: u64, id_ballot: i32) -> EngineResult<bool> {
        let ballot = self.guild_ballot(id_guild, id_ballot).await?;

        let closed = self.store.close_ballot(ballot.id).await?;
        if closed {
            get_logger().info("Closed ballot.", meta! {
                "GuildID" => id_guild,
                "BallotID" => ballot.id,
                "BallotName" => ballot.name,
            });
        }

        Ok(closed)
    }

    /// Deletes the ballot along with its entries and every vote on them.
    pub async fn delete_ballot(&self, id_guild: u64, id_ballot: i32) -> EngineResult<bool> {
        let ballot = self.guild_ballot(id_guild, id_ballot).await?;

        let deleted = self.store.delete_ballot(ballot.id).await?;
        if deleted {
            get_logger().info("Deleted ballot.", meta! {
                "GuildID" => id_guild,
                "BallotID" => ballot.id,
                "BallotName" => ballot.name,
            });
        }

        Ok(deleted)
    }
}
