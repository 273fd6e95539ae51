//! Shared fixtures for the scenario tests.
//!
//! Every scenario runs the real engine over an in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use lootpoll_bot::db::memory::MemoryStore;
use lootpoll_bot::db::schema::{Ballot, BossType, Category, Entry, HeldVote, NewBallot, VotingContext};
use lootpoll_bot::engine::bucket::{BucketRules, RuleSet};
use lootpoll_bot::engine::error::EngineResult;
use lootpoll_bot::engine::negotiator::ReplacementOffer;
use lootpoll_bot::engine::store::{BallotCatalog, BallotStore};
use lootpoll_bot::engine::{UnvoteOutcome, UnvoteRequest, VoteEngine, VoteOutcome, VoteRequest};

pub const GUILD: u64 = 303056270150074368;
pub const OTHER_GUILD: u64 = 881234567890123456;
pub const ALICE: u64 = 1001;
pub const BOB: u64 = 1002;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub engine: VoteEngine<MemoryStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_rules(RuleSet::Standard)
    }

    pub fn with_rules(set: RuleSet) -> Self {
        let store = Arc::new(MemoryStore::new());
        let engine = VoteEngine::new(store.clone(), BucketRules::new(set));

        Self { store, engine }
    }

    pub async fn ballot(&self, name: &str) -> Ballot {
        self.ballot_in(GUILD, name).await
    }

    pub async fn ballot_in(&self, id_guild: u64, name: &str) -> Ballot {
        self.store.create_ballot(&NewBallot {
            id_guild,
            name: name.to_owned(),
            expires_at: None,
            boss_type: BossType::WorldBoss,
            context: VotingContext::MainPve,
        }).await.unwrap()
    }

    pub async fn entry(&self, ballot: &Ballot, name: &str, category: Category, slot: &str) -> Entry {
        self.store.upsert_entry(ballot.id, name, category, slot).await.unwrap()
    }

    pub async fn vote(&self, id_user: u64, entry: &Entry, context: VotingContext) -> EngineResult<VoteOutcome> {
        let id_guild = self.store.get_ballot(entry.id_ballot).await.unwrap().unwrap().id_guild;

        self.engine.request_vote(VoteRequest {
            id_guild,
            id_user,
            user_name: format!("user-{}", id_user),
            id_ballot: entry.id_ballot,
            id_entry: entry.id,
            context,
        }).await
    }

    pub async fn unvote(&self, id_user: u64, entry: &Entry, context: Option<VotingContext>) -> EngineResult<UnvoteOutcome> {
        self.engine.request_unvote(UnvoteRequest {
            id_guild: GUILD,
            id_user,
            id_ballot: entry.id_ballot,
            id_entry: entry.id,
            context,
        }).await
    }

    /// Votes and expects the vote to be recorded.
    pub async fn cast(&self, id_user: u64, entry: &Entry, context: VotingContext) {
        match self.vote(id_user, entry, context).await {
            Ok(VoteOutcome::Recorded(_)) => {}
            other => panic!("expected {} to be recorded, got {:?}", entry.name, other),
        }
    }

    /// Votes and expects a denial.
    pub async fn denied(&self, id_user: u64, entry: &Entry, context: VotingContext) -> ReplacementOffer {
        match self.vote(id_user, entry, context).await {
            Ok(VoteOutcome::Denied(offer)) => offer,
            other => panic!("expected {} to be denied, got {:?}", entry.name, other),
        }
    }

    pub async fn held(&self, id_user: u64, context: VotingContext) -> Vec<HeldVote> {
        self.store.list_open_votes_for_user(GUILD, id_user, context).await.unwrap()
    }

    /// Entry names the user holds in `context`, sorted.
    pub async fn held_names(&self, id_user: u64, context: VotingContext) -> Vec<String> {
        let mut names = self.held(id_user, context).await
            .into_iter()
            .map(|h| h.entry.name)
            .collect::<Vec<_>>();
        names.sort();
        names
    }
}
