use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::schema::{Ballot, Category, Entry, HeldVote, NewBallot, Vote, VoteKey, VotingContext};

/// The reads and writes the vote engine performs.
#[async_trait]
pub trait BallotStore: Send + Sync {
    async fn get_ballot(&self, id_ballot: i32) -> anyhow::Result<Option<Ballot>>;

    async fn get_entry(&self, id_entry: i32) -> anyhow::Result<Option<Entry>>;

    /// The user's votes in `context` across every open ballot of the guild.
    async fn list_open_votes_for_user(
        &self,
        id_guild: u64,
        id_user: u64,
        context: VotingContext,
    ) -> anyhow::Result<Vec<HeldVote>>;

    /// Every vote the user holds in one ballot, open or closed, in any context.
    async fn list_user_votes_in_ballot(&self, id_ballot: i32, id_user: u64) -> anyhow::Result<Vec<HeldVote>>;

    /// Returns `false` without writing when a vote with the same key exists.
    async fn add_vote(&self, vote: &Vote) -> anyhow::Result<bool>;

    /// Returns the number of votes removed.
    async fn remove_vote(&self, key: &VoteKey) -> anyhow::Result<u64>;
}

/// Ballot and entry lifecycle: setup, name lookups, closing and expiry.
#[async_trait]
pub trait BallotCatalog: Send + Sync {
    async fn create_ballot(&self, ballot: &NewBallot) -> anyhow::Result<Ballot>;

    /// Inserts the entry, or updates category and slot of the entry with the
    /// same name key in that ballot.
    async fn upsert_entry(&self, id_ballot: i32, name: &str, category: Category, slot: &str) -> anyhow::Result<Entry>;

    /// Most recent ballot of the guild whose name matches case-insensitively.
    async fn find_ballot_by_name(&self, id_guild: u64, name: &str) -> anyhow::Result<Option<Ballot>>;

    async fn find_entry_by_name(&self, id_ballot: i32, name: &str) -> anyhow::Result<Option<Entry>>;

    /// Returns `false` if the ballot was already closed or does not exist.
    async fn close_ballot(&self, id_ballot: i32) -> anyhow::Result<bool>;

    /// Deletes the ballot together with its entries and their votes.
    async fn delete_ballot(&self, id_ballot: i32) -> anyhow::Result<bool>;

    /// Closes every open ballot whose expiry is before `now` and returns them.
    async fn close_expired_ballots(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Ballot>>;
}

/// Looks a ballot up by numeric id or by name, scoped to one guild.
pub async fn resolve_ballot<S>(store: &S, id_guild: u64, id_or_name: &str) -> anyhow::Result<Option<Ballot>>
    where S: BallotStore + BallotCatalog + ?Sized
{
    let id_or_name = id_or_name.trim();

    if let Ok(id) = id_or_name.parse::<i32>() {
        if let Some(ballot) = store.get_ballot(id).await? {
            if ballot.id_guild == id_guild {
                return Ok(Some(ballot));
            }
        }
    }

    store.find_ballot_by_name(id_guild, id_or_name).await
}
