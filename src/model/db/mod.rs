//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g. IDs and
//! datetimes use MongoDB's own formats.

mod election;
pub use election::{Candidate, Election, ElectionCore, ElectionMetadata};

mod rights;
pub use rights::VotingRight;

mod vote;
pub use vote::Vote;
