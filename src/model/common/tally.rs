use serde::Serialize;

use super::ProposalIndex;

/// Per-candidate vote counts for a single election.
///
/// A `Tally` is always derived on demand from the full set of recorded votes,
/// never stored, so it cannot go stale. Counting is a plain O(votes) scan
/// into an array indexed by proposal index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    counts: Vec<u64>,
}

impl Tally {
    /// An empty tally for an election with the given number of candidates.
    pub fn new(candidate_count: usize) -> Self {
        Self {
            counts: vec![0; candidate_count],
        }
    }

    /// Build a tally from an iterator of recorded proposal indices.
    ///
    /// Out-of-range indices cannot be produced by a vote that passed
    /// validation; if one shows up anyway the record is skipped and logged,
    /// since miscounting it would be worse.
    pub fn from_votes(
        candidate_count: usize,
        votes: impl IntoIterator<Item = ProposalIndex>,
    ) -> Self {
        let mut tally = Self::new(candidate_count);
        for proposal in votes {
            tally.record(proposal);
        }
        tally
    }

    /// Count a single vote for the given proposal.
    pub fn record(&mut self, proposal: ProposalIndex) {
        match self.counts.get_mut(proposal as usize) {
            Some(count) => *count += 1,
            None => warn!(
                "Ignoring vote for out-of-range proposal {} (only {} candidates)",
                proposal,
                self.counts.len()
            ),
        }
    }

    /// The counts, indexed by proposal index.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Total number of votes counted.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// The highest count held by any candidate; zero for an empty election.
    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// The winning proposal: the lowest proposal index achieving the maximum
    /// count. An election with no votes has no winner; index 0 must not be
    /// reported as a false winner just because every count is zero.
    pub fn winner(&self) -> Option<ProposalIndex> {
        let max = self.max_count();
        if max == 0 {
            return None;
        }
        self.counts
            .iter()
            .position(|&count| count == max)
            .map(|index| index as ProposalIndex)
    }

    /// Whether the given proposal currently holds the maximum count.
    ///
    /// Unlike [`Tally::winner`], several candidates can be leading at once
    /// under a tie; this is the display concept, not the tie-broken result.
    pub fn is_leading(&self, proposal: ProposalIndex) -> bool {
        let max = self.max_count();
        max > 0 && self.counts.get(proposal as usize).copied() == Some(max)
    }

    /// All currently leading proposals.
    pub fn leading(&self) -> Vec<ProposalIndex> {
        (0..self.counts.len() as ProposalIndex)
            .filter(|&proposal| self.is_leading(proposal))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_every_vote_exactly_once() {
        let votes = vec![0, 1, 1, 2, 1, 0];
        let tally = Tally::from_votes(3, votes.iter().copied());
        assert_eq!(tally.counts(), &[2, 3, 1]);
        assert_eq!(tally.total(), votes.len() as u64);
    }

    #[test]
    fn vote_order_does_not_matter() {
        let forwards = Tally::from_votes(3, vec![0, 1, 1, 2, 2, 2]);
        let backwards = Tally::from_votes(3, vec![2, 2, 2, 1, 1, 0]);
        assert_eq!(forwards, backwards);
        assert_eq!(forwards.winner(), backwards.winner());
    }

    #[test]
    fn tie_break_picks_lowest_index() {
        // Counts [3, 3, 1]: proposals 0 and 1 tie, 0 wins.
        let tally = Tally::from_votes(3, vec![0, 0, 0, 1, 1, 1, 2]);
        assert_eq!(tally.counts(), &[3, 3, 1]);
        assert_eq!(tally.winner(), Some(0));
    }

    #[test]
    fn zero_votes_means_no_winner() {
        let tally = Tally::new(3);
        assert_eq!(tally.counts(), &[0, 0, 0]);
        assert_eq!(tally.winner(), None);
        assert!(!tally.is_leading(0));
        assert!(tally.leading().is_empty());
    }

    #[test]
    fn ties_admit_multiple_leaders() {
        let tally = Tally::from_votes(3, vec![0, 1]);
        assert!(tally.is_leading(0));
        assert!(tally.is_leading(1));
        assert!(!tally.is_leading(2));
        assert_eq!(tally.leading(), vec![0, 1]);
        // The strict winner is still tie-broken to the lowest index.
        assert_eq!(tally.winner(), Some(0));
    }

    #[test]
    fn out_of_range_votes_are_skipped() {
        let tally = Tally::from_votes(2, vec![0, 5, 1]);
        assert_eq!(tally.counts(), &[1, 1]);
        assert_eq!(tally.total(), 2);
    }

    #[test]
    fn clear_majority_wins() {
        let tally = Tally::from_votes(2, vec![1, 1, 0]);
        assert_eq!(tally.winner(), Some(1));
        assert_eq!(tally.leading(), vec![1]);
        assert!(!tally.is_leading(0));
    }
}
