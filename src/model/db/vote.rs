use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{ProposalIndex, VoterId},
    mongodb::Id,
};

/// A recorded vote: one voter's choice in one election.
///
/// At most one vote may ever exist per `(election_id, voter_id)` pair. That
/// invariant is enforced by a unique index at the storage layer rather than a
/// check-then-write in application code, so it holds under concurrency too.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub election_id: Id,
    pub voter_id: VoterId,
    pub proposal_index: ProposalIndex,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(election_id: Id, voter_id: VoterId, proposal_index: ProposalIndex) -> Self {
        Self {
            election_id,
            voter_id,
            proposal_index,
            cast_at: Utc::now(),
        }
    }
}
