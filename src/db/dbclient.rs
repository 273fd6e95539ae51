use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::db::model;
use crate::db::schema::{Ballot, Category, Entry, HeldVote, NewBallot, Vote, VoteKey, VotingContext};
use crate::engine::store::{BallotCatalog, BallotStore};

pub struct DBClient {
    pool: PgPool,
}

impl DBClient {
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .context("failed to connect to Postgres")?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("db migrate failed")?;

        Ok(())
    }

    pub fn conn(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BallotStore for DBClient {
    async fn get_ballot(&self, id_ballot: i32) -> anyhow::Result<Option<Ballot>> {
        model::get_ballot(self.conn(), id_ballot).await
    }

    async fn get_entry(&self, id_entry: i32) -> anyhow::Result<Option<Entry>> {
        model::get_entry(self.conn(), id_entry).await
    }

    async fn list_open_votes_for_user(&self, id_guild: u64, id_user: u64, context: VotingContext) -> anyhow::Result<Vec<HeldVote>> {
        model::list_open_votes_for_user(self.conn(), id_guild, id_user, context).await
    }

    async fn list_user_votes_in_ballot(&self, id_ballot: i32, id_user: u64) -> anyhow::Result<Vec<HeldVote>> {
        model::list_user_votes_in_ballot(self.conn(), id_ballot, id_user).await
    }

    async fn add_vote(&self, vote: &Vote) -> anyhow::Result<bool> {
        model::add_vote(self.conn(), vote).await
    }

    async fn remove_vote(&self, key: &VoteKey) -> anyhow::Result<u64> {
        model::remove_vote(self.conn(), key).await
    }
}

#[async_trait]
impl BallotCatalog for DBClient {
    async fn create_ballot(&self, ballot: &NewBallot) -> anyhow::Result<Ballot> {
        model::add_ballot(self.conn(), ballot).await
    }

    async fn upsert_entry(&self, id_ballot: i32, name: &str, category: Category, slot: &str) -> anyhow::Result<Entry> {
        model::upsert_entry(self.conn(), id_ballot, name, category, slot).await
    }

    async fn find_ballot_by_name(&self, id_guild: u64, name: &str) -> anyhow::Result<Option<Ballot>> {
        model::find_ballot_by_name(self.conn(), id_guild, name).await
    }

    async fn find_entry_by_name(&self, id_ballot: i32, name: &str) -> anyhow::Result<Option<Entry>> {
        model::find_entry_by_name(self.conn(), id_ballot, name).await
    }

    async fn close_ballot(&self, id_ballot: i32) -> anyhow::Result<bool> {
        model::close_ballot(self.conn(), id_ballot).await
    }

    async fn delete_ballot(&self, id_ballot: i32) -> anyhow::Result<bool> {
        model::delete_ballot(self.conn(), id_ballot).await
    }

    async fn close_expired_ballots(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Ballot>> {
        model::close_expired_ballots(self.conn(), now).await
    }
}
