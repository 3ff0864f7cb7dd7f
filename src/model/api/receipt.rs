use serde::{Deserialize, Serialize};

use crate::ledger::TxId;

/// How a write reached the records: directly into the relational store, or
/// submitted to the ledger with the relational mirror deferred until the
/// transaction confirms.
///
/// `Pending` is observably distinct from confirmed and from failure; a caller
/// holding a pending receipt must not assume the write is final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WriteReceipt {
    /// The write is fully recorded.
    Confirmed,
    /// The write was submitted to the ledger and awaits confirmation.
    Pending { tx_id: TxId },
}

/// A write response: the described record plus how far it has got.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse<T> {
    #[serde(flatten)]
    pub record: T,
    pub write: WriteReceipt,
}
