//! Request/response types for the HTTP API.

mod election;
pub use election::{CandidateDescription, CandidateSpec, ElectionDescription, ElectionSpec, ElectionSummary};

mod receipt;
pub use receipt::{WriteReceipt, WriteResponse};

mod results;
pub use results::{ElectionResults, LedgerResults};

mod rights;
pub use rights::{BatchGrantRequest, GrantReport, GrantStatus, GrantTarget, GrantedRight};

mod vote;
pub use vote::{VoteDescription, VoteSpec};
