use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::VoterId, mongodb::Id};

/// A voting-right grant: authorises one voter for one election.
///
/// The `(election_id, voter_id)` pair is unique-indexed, making repeated
/// grants idempotent rather than producing duplicate rows.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VotingRight {
    pub election_id: Id,
    pub voter_id: VoterId,
    /// The voter's wallet address at grant time, when one is on file.
    /// Needed to mirror the grant onto the ledger.
    pub wallet: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub granted_at: DateTime<Utc>,
}

impl VotingRight {
    pub fn new(election_id: Id, voter_id: VoterId, wallet: Option<String>) -> Self {
        Self {
            election_id,
            voter_id,
            wallet,
            granted_at: Utc::now(),
        }
    }
}
