use crate::db::schema::{Entry, HeldVote, Vote, VoteKey};
use crate::engine::bucket::BucketRules;
use crate::engine::eligibility::{evaluate, Denial, Eligibility};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::store::BallotStore;

#[derive(Debug, Clone, PartialEq)]
pub enum Swap {
    Swapped { removed: u64, added: Vote },
    /// The user already holds the candidate vote; nothing was evicted.
    AlreadyHeld,
}

/// Applies decided changes to a store, one logical operation at a time.
pub struct Committer<'a, S: ?Sized> {
    store: &'a S,
    rules: &'a BucketRules,
}

impl<'a, S: BallotStore + ?Sized> Committer<'a, S> {
    pub fn new(store: &'a S, rules: &'a BucketRules) -> Self {
        Self { store, rules }
    }

    pub async fn add(&self, vote: Vote) -> EngineResult<Vote> {
        if !self.store.add_vote(&vote).await? {
            return Err(EngineError::DuplicateVote(vote.key()));
        }

        Ok(vote)
    }

    pub async fn remove(&self, key: &VoteKey) -> EngineResult<u64> {
        Ok(self.store.remove_vote(key).await?)
    }

    /// Removes `evict`, re-checks `candidate` against a fresh snapshot, then adds `add`.
    ///
    /// Nothing is removed when the user already holds `add`. Once the removal
    /// is written, a failed re-check returns [`EngineError::RaceLost`] and any
    /// other failure returns [`EngineError::Interrupted`]; both carry the
    /// evicted vote. The bucket never ends up over capacity.
    pub async fn swap(&self, id_guild: u64, evict: HeldVote, add: Vote, candidate: &Entry) -> EngineResult<Swap> {
        let key = add.key();

        let held = self.store.list_open_votes_for_user(id_guild, add.id_user, add.context).await?;
        if held.iter().any(|h| h.vote.key() == key) {
            return Ok(Swap::AlreadyHeld);
        }

        let removed = self.remove(&evict.vote.key()).await?;

        match self.place(id_guild, add, candidate).await {
            Ok(added) => Ok(Swap::Swapped { removed, added }),
            Err(Placement::Denied(denial)) => Err(EngineError::RaceLost { evicted: evict, denial }),
            Err(Placement::Failed(e)) if removed == 0 => Err(e),
            Err(Placement::Failed(e)) => Err(EngineError::Interrupted { evicted: evict, cause: Box::new(e) }),
        }
    }

    async fn place(&self, id_guild: u64, add: Vote, candidate: &Entry) -> Result<Vote, Placement> {
        let snapshot = self.store.list_open_votes_for_user(id_guild, add.id_user, add.context).await
            .map_err(|e| Placement::Failed(e.into()))?;

        if let Eligibility::Denied(denial) = evaluate(self.rules, &snapshot, candidate, add.context) {
            return Err(Placement::Denied(denial));
        }

        self.add(add).await.map_err(Placement::Failed)
    }
}

enum Placement {
    Denied(Denial),
    Failed(EngineError),
}
