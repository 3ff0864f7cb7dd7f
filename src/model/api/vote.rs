use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::ProposalIndex,
    db::Vote,
    mongodb::Id,
};

/// A vote the caller wishes to cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteSpec {
    pub proposal_index: ProposalIndex,
}

/// Confirmation of a recorded (or pending) vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteDescription {
    pub election_id: Id,
    pub proposal_index: ProposalIndex,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for VoteDescription {
    fn from(vote: Vote) -> Self {
        Self {
            election_id: vote.election_id,
            proposal_index: vote.proposal_index,
            cast_at: vote.cast_at,
        }
    }
}
