//! The on-chain mirror: an immutable ledger of election facts behind a
//! chain-gateway service.
//!
//! When a ledger is configured it is the authoritative record; the relational
//! store is a read-optimised projection of it, populated only once a ledger
//! transaction is observed to confirm (see [`mirror`]).

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::common::{ElectionOrdinal, ProposalIndex};

mod gateway;
pub use gateway::GatewayLedger;

mod memory;
pub use memory::MemoryLedger;

pub mod mirror;
pub use mirror::{MirrorWrite, MirrorWriters};

/// A ledger transaction handle, opaque to everything but the gateway.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxId(pub String);

impl Display for TxId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The observed fate of a submitted transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// The lifecycle of a submitted ledger write, tracked explicitly rather than
/// scattered across call sites. Submission itself is synchronous, so a write
/// enters the machine at `Pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteState {
    Pending(TxId),
    Confirmed,
    Failed(String),
    /// Confirmation polling was exhausted; the true outcome is unknown and
    /// must not be assumed to be success.
    TimedOut,
}

impl WriteState {
    /// Terminal states are absorbing: once reached, no transition applies.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed(_) | Self::TimedOut)
    }

    /// Fold an observed transaction status into the state machine.
    pub fn observe(self, status: TxStatus) -> Self {
        match self {
            Self::Pending(tx) => match status {
                TxStatus::Pending => Self::Pending(tx),
                TxStatus::Confirmed => Self::Confirmed,
                TxStatus::Failed => Self::Failed(format!("transaction {} failed", tx)),
            },
            other => other,
        }
    }
}

/// Why the ledger refused an operation. With a ledger configured the
/// relational mirror lags until confirmation, so the ledger can be the first
/// place a precondition failure is detected; these reasons carry enough
/// structure to be reported as the precondition that failed, not as a
/// gateway fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    AlreadyVoted,
    ElectionClosed,
    NoRight,
    NoSuchProposal,
    Other(String),
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyVoted => f.write_str("a vote has already been recorded"),
            Self::ElectionClosed => f.write_str("voting has closed"),
            Self::NoRight => f.write_str("no right to vote"),
            Self::NoSuchProposal => f.write_str("no such proposal"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

/// Errors from the ledger subsystem. `Rejected` is a business outcome
/// detected on the ledger; the rest are external-dependency failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ledger gateway error: {0}")]
    Gateway(String),
    #[error("ledger rejected the operation: {0}")]
    Rejected(Rejection),
    #[error("no such election on the ledger: {0}")]
    UnknownElection(ElectionOrdinal),
    #[error("no such transaction: {0}")]
    UnknownTx(TxId),
    #[error("no ledger is configured")]
    NotConfigured,
}

/// The result of submitting an election creation: the index the ledger
/// assigned plus the pending transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedElection {
    pub election_index: ElectionOrdinal,
    pub tx: TxId,
}

/// The ledger's winner view: the tie-broken proposal and its display name,
/// both absent while no votes have been cast. Read in one call because the
/// two halves must come from the same state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerWinner {
    pub proposal: Option<ProposalIndex>,
    pub name: Option<String>,
}

/// The operations of the immutable vote ledger, mirroring the deployed
/// contract's interface.
#[rocket::async_trait]
pub trait VoteLedger: Send + Sync {
    async fn create_election(
        &self,
        title: &str,
        candidate_names: &[String],
        duration_secs: i64,
    ) -> Result<CreatedElection, LedgerError>;

    async fn give_right_to_vote(
        &self,
        election: ElectionOrdinal,
        voter: &str,
        weight: u64,
    ) -> Result<TxId, LedgerError>;

    async fn vote(
        &self,
        election: ElectionOrdinal,
        voter: &str,
        proposal: ProposalIndex,
    ) -> Result<TxId, LedgerError>;

    /// Seconds of voting time remaining, zero once closed.
    async fn time_left(&self, election: ElectionOrdinal) -> Result<u64, LedgerError>;

    /// Vote counts by proposal index.
    async fn vote_counts(&self, election: ElectionOrdinal) -> Result<Vec<u64>, LedgerError>;

    /// The winning proposal and its name, absent while no votes have been
    /// cast.
    async fn winner(&self, election: ElectionOrdinal) -> Result<LedgerWinner, LedgerError>;

    async fn tx_status(&self, tx: &TxId) -> Result<TxStatus, LedgerError>;
}

/// The (possibly absent) ledger, as managed Rocket state.
pub struct LedgerState(Option<Arc<dyn VoteLedger>>);

impl LedgerState {
    pub fn configured(ledger: Arc<dyn VoteLedger>) -> Self {
        Self(Some(ledger))
    }

    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<&Arc<dyn VoteLedger>> {
        self.0.as_ref()
    }

    /// The ledger, or the error reported when a ledger-only operation is
    /// attempted without one configured.
    pub fn require(&self) -> Result<&Arc<dyn VoteLedger>, LedgerError> {
        self.0.as_ref().ok_or(LedgerError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_write_follows_observed_status() {
        let pending = WriteState::Pending(TxId("tx-1".to_string()));
        assert!(!pending.is_terminal());
        assert_eq!(
            pending.clone().observe(TxStatus::Pending),
            WriteState::Pending(TxId("tx-1".to_string()))
        );
        assert_eq!(
            pending.clone().observe(TxStatus::Confirmed),
            WriteState::Confirmed
        );
        assert!(matches!(
            pending.observe(TxStatus::Failed),
            WriteState::Failed(_)
        ));
    }

    #[test]
    fn terminal_states_are_absorbing() {
        for terminal in [
            WriteState::Confirmed,
            WriteState::Failed("boom".to_string()),
            WriteState::TimedOut,
        ] {
            assert!(terminal.is_terminal());
            for status in [TxStatus::Pending, TxStatus::Confirmed, TxStatus::Failed] {
                assert_eq!(terminal.clone().observe(status), terminal);
            }
        }
    }
}
