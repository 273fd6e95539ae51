use crate::db::schema::{Entry, HeldVote, VotingContext};
use crate::engine::bucket::{BucketKey, BucketRules};

/// The bucket that is full, and the votes filling it.
#[derive(Debug, Clone, PartialEq)]
pub struct Denial {
    pub bucket: BucketKey,
    pub capacity: usize,
    pub occupants: Vec<HeldVote>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    Allowed,
    Denied(Denial),
}

impl Eligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Eligibility::Allowed)
    }
}

/// Decides whether `candidate` may take another vote given the user's open votes.
///
/// `existing` is the user's snapshot for one guild: votes in open ballots, joined
/// with their entries. Rows from other contexts are ignored. A vote the user
/// already holds on `candidate` counts like any other occupant; callers filter
/// exact duplicates before getting here.
pub fn evaluate(rules: &BucketRules, existing: &[HeldVote], candidate: &Entry, context: VotingContext) -> Eligibility {
    let classification = rules.classify_entry(candidate);

    for bucket in classification.buckets() {
        let occupants = occupants_of(rules, existing, &bucket.key, context);

        if occupants.len() >= bucket.capacity {
            return Eligibility::Denied(Denial {
                bucket: bucket.key.clone(),
                capacity: bucket.capacity,
                occupants,
            });
        }
    }

    Eligibility::Allowed
}

pub fn occupants_of(rules: &BucketRules, existing: &[HeldVote], key: &BucketKey, context: VotingContext) -> Vec<HeldVote> {
    existing.iter()
        .filter(|held| held.vote.context == context)
        .filter(|held| rules.classify_entry(&held.entry).contains(key))
        .cloned()
        .collect()
}
