use serde::Serialize;

use crate::model::common::{ProposalIndex, Tally};

/// Tally results recomputed on demand from the vote ledger of record.
#[derive(Debug, Clone, Serialize)]
pub struct ElectionResults {
    /// Vote counts, indexed by proposal index.
    pub counts: Vec<u64>,
    pub total_votes: u64,
    /// The tie-broken winner; absent when no votes have been cast.
    pub winner: Option<ProposalIndex>,
    /// Every proposal currently holding the maximum count. A display
    /// concept: under a tie this names several candidates even though
    /// `winner` picks one.
    pub leading: Vec<ProposalIndex>,
}

impl From<Tally> for ElectionResults {
    fn from(tally: Tally) -> Self {
        Self {
            total_votes: tally.total(),
            winner: tally.winner(),
            leading: tally.leading(),
            counts: tally.counts().to_vec(),
        }
    }
}

/// The same results read from the on-chain ledger, which is authoritative.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerResults {
    pub counts: Vec<u64>,
    pub winning_proposal: Option<ProposalIndex>,
    pub winner_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_reflect_the_tally() {
        let results = ElectionResults::from(Tally::from_votes(3, vec![1, 1, 0]));
        assert_eq!(results.counts, vec![1, 2, 0]);
        assert_eq!(results.total_votes, 3);
        assert_eq!(results.winner, Some(1));
        assert_eq!(results.leading, vec![1]);
    }
}
