mod tally;

pub use tally::Tally;

/// Dense zero-based election index, shared 1:1 with the on-chain ledger.
pub type ElectionOrdinal = u32;
/// Position of a candidate within an election's immutable candidate list.
pub type ProposalIndex = u32;
/// Opaque voter identity issued by the identity service.
pub type VoterId = String;
