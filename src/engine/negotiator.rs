//! Replacement negotiation after a denied vote.
//!
//! A denial produces a [`ReplacementOffer`] (the *offered* state). The user
//! later answers with a [`ReplacementChoice`]; resolving consumes the offer, so
//! every answer is terminal: swapped, cancelled, already held, or a lost race
//! reported as [`EngineError::RaceLost`]. Occupants are only ever evicted on
//! the user's explicit choice.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use rand::Rng;

use crate::db::schema::{Entry, HeldVote, Vote, VotingContext};
use crate::engine::commit::{Committer, Swap};
use crate::engine::eligibility::Denial;
use crate::engine::error::{EngineError, EngineResult, Missing};
use crate::engine::store::BallotStore;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementOffer {
    pub id: u64,
    pub id_guild: u64,
    pub id_user: u64,
    pub user_name: String,
    pub context: VotingContext,
    pub candidate: Entry,
    pub denial: Denial,
    pub time_created: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementChoice {
    /// Index into the offer's occupants.
    Evict(usize),
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// `entry` is the candidate the new vote went to.
    Swapped { evicted: HeldVote, added: Vote, entry: Entry },
    /// The candidate was already held when the answer arrived; nothing changed.
    AlreadyHeld { entry: Entry },
    Cancelled,
}

impl ReplacementOffer {
    pub fn occupants(&self) -> &[HeldVote] {
        &self.denial.occupants
    }

    pub fn occupant(&self, choice: ReplacementChoice) -> EngineResult<Option<&HeldVote>> {
        match choice {
            ReplacementChoice::Cancel => Ok(None),
            ReplacementChoice::Evict(i) => self.denial.occupants.get(i)
                .map(Some)
                .ok_or(EngineError::NotFound(Missing::Occupant(i))),
        }
    }

    pub async fn resolve<S>(self, committer: &Committer<'_, S>, choice: ReplacementChoice) -> EngineResult<Resolution>
        where S: BallotStore + ?Sized
    {
        let evicted = match self.occupant(choice)? {
            None => return Ok(Resolution::Cancelled),
            Some(v) => v.clone(),
        };

        let vote = Vote {
            id_ballot: self.candidate.id_ballot,
            id_entry: self.candidate.id,
            id_user: self.id_user,
            user_name: self.user_name,
            context: self.context,
            time_cast: Utc::now(),
        };

        match committer.swap(self.id_guild, evicted.clone(), vote, &self.candidate).await? {
            Swap::Swapped { added, .. } => Ok(Resolution::Swapped { evicted, added, entry: self.candidate }),
            Swap::AlreadyHeld => Ok(Resolution::AlreadyHeld { entry: self.candidate }),
        }
    }
}

/// Offers waiting for an answer, keyed by offer id.
///
/// Ids are drawn at random so buttons left over from an earlier process never
/// match a new offer.
#[derive(Default)]
pub struct Negotiator {
    offers: DashMap<u64, ReplacementOffer>,
}

impl Negotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&self, id_guild: u64, id_user: u64, user_name: &str, context: VotingContext, candidate: Entry, denial: Denial) -> ReplacementOffer {
        let mut rng = rand::thread_rng();

        loop {
            let id = rng.gen::<u64>();

            if let MapEntry::Vacant(slot) = self.offers.entry(id) {
                let offer = ReplacementOffer {
                    id,
                    id_guild,
                    id_user,
                    user_name: user_name.to_owned(),
                    context,
                    candidate,
                    denial,
                    time_created: Utc::now(),
                };
                slot.insert(offer.clone());

                return offer;
            }
        }
    }

    /// Removes the offer so it can be resolved. Offers belonging to another
    /// user stay pending and read as missing.
    pub fn take(&self, id_offer: u64, id_user: u64) -> EngineResult<ReplacementOffer> {
        self.offers.remove_if(&id_offer, |_, offer| offer.id_user == id_user)
            .map(|(_, offer)| offer)
            .ok_or(EngineError::NotFound(Missing::Offer(id_offer)))
    }

    /// Drops offers created before `cutoff` and returns how many went.
    pub fn expire(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.offers.len();
        self.offers.retain(|_, offer| offer.time_created >= cutoff);
        before.saturating_sub(self.offers.len())
    }

    pub fn pending(&self) -> usize {
        self.offers.len()
    }
}
