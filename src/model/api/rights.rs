use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{common::VoterId, db::VotingRight};

/// A voter to be granted a right, as selected from the approved-user list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantTarget {
    pub voter_id: VoterId,
    /// The voter's wallet address, required when a ledger mirror is
    /// configured so the grant can be mirrored on-chain.
    #[serde(default)]
    pub wallet: Option<String>,
}

/// A batch of grants. Each is applied independently; one failure never
/// blocks the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGrantRequest {
    pub voters: Vec<GrantTarget>,
}

/// The per-voter outcome of a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Granted,
    /// The right already existed; grants are idempotent.
    AlreadyGranted,
    Failed,
}

/// A granted right, as listed back to an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantedRight {
    pub voter_id: VoterId,
    pub wallet: Option<String>,
    pub granted_at: DateTime<Utc>,
}

impl From<VotingRight> for GrantedRight {
    fn from(right: VotingRight) -> Self {
        Self {
            voter_id: right.voter_id,
            wallet: right.wallet,
            granted_at: right.granted_at,
        }
    }
}

/// One row of a batch-grant report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantReport {
    pub voter_id: VoterId,
    pub status: GrantStatus,
    /// Failure detail, naming the precondition or dependency that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
