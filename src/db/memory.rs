use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::schema::{name_key, Ballot, Category, Entry, HeldVote, NewBallot, Vote, VoteKey, VotingContext};
use crate::engine::bucket::normalize_slot;
use crate::engine::store::{BallotCatalog, BallotStore};

#[derive(Default)]
struct Tables {
    ballots: Vec<Ballot>,
    entries: Vec<Entry>,
    votes: Vec<Vote>,
    next_ballot: i32,
    next_entry: i32,
}

/// Ballot store kept in process memory. Every operation takes the table lock
/// once and never holds it across an await.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> anyhow::Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }

    /// Every stored vote, open ballot or not.
    pub fn votes(&self) -> anyhow::Result<Vec<Vote>> {
        Ok(self.tables()?.votes.clone())
    }
}

#[async_trait]
impl BallotStore for MemoryStore {
    async fn get_ballot(&self, id_ballot: i32) -> anyhow::Result<Option<Ballot>> {
        let t = self.tables()?;

        Ok(t.ballots.iter().find(|b| b.id == id_ballot).cloned())
    }

    async fn get_entry(&self, id_entry: i32) -> anyhow::Result<Option<Entry>> {
        let t = self.tables()?;

        Ok(t.entries.iter().find(|e| e.id == id_entry).cloned())
    }

    async fn list_open_votes_for_user(&self, id_guild: u64, id_user: u64, context: VotingContext) -> anyhow::Result<Vec<HeldVote>> {
        let t = self.tables()?;

        let mut result = Vec::new();
        for vote in t.votes.iter().filter(|v| v.id_user == id_user && v.context == context) {
            let ballot = match t.ballots.iter().find(|b| b.id == vote.id_ballot) {
                Some(b) if b.open && b.id_guild == id_guild => b,
                _ => continue,
            };
            let entry = match t.entries.iter().find(|e| e.id == vote.id_entry) {
                None => continue,
                Some(v) => v,
            };

            result.push(HeldVote {
                vote: vote.clone(),
                entry: entry.clone(),
                ballot_name: ballot.name.clone(),
            });
        }

        Ok(result)
    }

    async fn list_user_votes_in_ballot(&self, id_ballot: i32, id_user: u64) -> anyhow::Result<Vec<HeldVote>> {
        let t = self.tables()?;

        let ballot = match t.ballots.iter().find(|b| b.id == id_ballot) {
            None => return Ok(Vec::new()),
            Some(v) => v,
        };

        Ok(t.votes.iter()
            .filter(|v| v.id_ballot == id_ballot && v.id_user == id_user)
            .filter_map(|v| t.entries.iter().find(|e| e.id == v.id_entry).map(|e| HeldVote {
                vote: v.clone(),
                entry: e.clone(),
                ballot_name: ballot.name.clone(),
            }))
            .collect())
    }

    async fn add_vote(&self, vote: &Vote) -> anyhow::Result<bool> {
        let mut t = self.tables()?;

        let key = vote.key();
        if t.votes.iter().any(|v| v.key() == key) {
            return Ok(false);
        }
        t.votes.push(vote.clone());

        Ok(true)
    }

    async fn remove_vote(&self, key: &VoteKey) -> anyhow::Result<u64> {
        let mut t = self.tables()?;

        let before = t.votes.len();
        t.votes.retain(|v| &v.key() != key);

        Ok((before - t.votes.len()) as u64)
    }
}

#[async_trait]
impl BallotCatalog for MemoryStore {
    async fn create_ballot(&self, ballot: &NewBallot) -> anyhow::Result<Ballot> {
        let mut t = self.tables()?;

        t.next_ballot += 1;
        let created = Ballot {
            id: t.next_ballot,
            time_created: Utc::now(),
            id_guild: ballot.id_guild,
            name: ballot.name.clone(),
            open: true,
            expires_at: ballot.expires_at,
            boss_type: ballot.boss_type,
            context: ballot.context,
        };
        t.ballots.push(created.clone());

        Ok(created)
    }

    async fn upsert_entry(&self, id_ballot: i32, name: &str, category: Category, slot: &str) -> anyhow::Result<Entry> {
        let mut t = self.tables()?;

        if !t.ballots.iter().any(|b| b.id == id_ballot) {
            return Err(anyhow::anyhow!("ballot {} does not exist", id_ballot));
        }

        let key = name_key(name);
        let slot = normalize_slot(slot);

        if let Some(existing) = t.entries.iter_mut().find(|e| e.id_ballot == id_ballot && e.name_key == key) {
            existing.name = name.trim().to_owned();
            existing.category = category;
            existing.slot = slot;
            return Ok(existing.clone());
        }

        t.next_entry += 1;
        let entry = Entry {
            id: t.next_entry,
            id_ballot,
            name: name.trim().to_owned(),
            name_key: key,
            category,
            slot,
        };
        t.entries.push(entry.clone());

        Ok(entry)
    }

    async fn find_ballot_by_name(&self, id_guild: u64, name: &str) -> anyhow::Result<Option<Ballot>> {
        let t = self.tables()?;

        let wanted = name_key(name);
        Ok(t.ballots.iter()
            .filter(|b| b.id_guild == id_guild && name_key(&b.name) == wanted)
            .max_by_key(|b| b.id)
            .cloned())
    }

    async fn find_entry_by_name(&self, id_ballot: i32, name: &str) -> anyhow::Result<Option<Entry>> {
        let t = self.tables()?;

        let wanted = name_key(name);
        Ok(t.entries.iter().find(|e| e.id_ballot == id_ballot && e.name_key == wanted).cloned())
    }

    async fn close_ballot(&self, id_ballot: i32) -> anyhow::Result<bool> {
        let mut t = self.tables()?;

        match t.ballots.iter_mut().find(|b| b.id == id_ballot && b.open) {
            None => Ok(false),
            Some(b) => {
                b.open = false;
                Ok(true)
            }
        }
    }

    async fn delete_ballot(&self, id_ballot: i32) -> anyhow::Result<bool> {
        let mut t = self.tables()?;

        let before = t.ballots.len();
        t.ballots.retain(|b| b.id != id_ballot);
        if t.ballots.len() == before {
            return Ok(false);
        }

        let entry_ids = t.entries.iter()
            .filter(|e| e.id_ballot == id_ballot)
            .map(|e| e.id)
            .collect::<Vec<_>>();
        t.entries.retain(|e| e.id_ballot != id_ballot);
        t.votes.retain(|v| v.id_ballot != id_ballot && !entry_ids.contains(&v.id_entry));

        Ok(true)
    }

    async fn close_expired_ballots(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Ballot>> {
        let mut t = self.tables()?;

        let mut closed = Vec::new();
        for ballot in t.ballots.iter_mut() {
            let expired = ballot.expires_at.map_or(false, |at| at < now);
            if ballot.open && expired {
                ballot.open = false;
                closed.push(ballot.clone());
            }
        }

        Ok(closed)
    }
}
