use std::fmt;

use thiserror::Error;

use crate::db::schema::{HeldVote, VoteKey};
use crate::engine::eligibility::Denial;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Ballot(i32),
    Entry(i32),
    Offer(u64),
    Occupant(usize),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Ballot(id) => write!(f, "ballot {}", id),
            Missing::Entry(id) => write!(f, "entry {}", id),
            Missing::Offer(id) => write!(f, "replacement offer {}", id),
            Missing::Occupant(i) => write!(f, "occupant #{}", i),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(Missing),

    #[error("ballot {0} is closed")]
    BallotClosed(i32),

    #[error("vote {0} already exists")]
    DuplicateVote(VoteKey),

    /// The evicted vote is gone but the candidate still did not fit.
    #[error("replaced vote was removed but its bucket filled up again")]
    RaceLost { evicted: HeldVote, denial: Denial },

    /// The evicted vote is gone and placing the candidate failed for another reason.
    #[error("replaced vote was removed but the new vote could not be written: {cause}")]
    Interrupted { evicted: HeldVote, cause: Box<EngineError> },

    #[error(transparent)]
    StoreUnavailable(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
