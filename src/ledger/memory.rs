use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::model::common::{ElectionOrdinal, ProposalIndex};

use super::{CreatedElection, LedgerError, LedgerWinner, Rejection, TxId, TxStatus, VoteLedger};

/// An in-process ledger with the deployed contract's semantics: weighted
/// rights, a single vote per address, a hard deadline, and a winner scan that
/// keeps the lowest index on ties.
///
/// Used by tests and by local development deployments where no chain gateway
/// is available.
pub struct MemoryLedger {
    inner: Mutex<Inner>,
    /// When false, submitted transactions stay pending until
    /// [`MemoryLedger::confirm_all`] is called.
    auto_confirm: bool,
}

struct Inner {
    elections: Vec<LedgerElection>,
    txs: HashMap<TxId, TxStatus>,
    next_tx: u64,
}

struct LedgerElection {
    title: String,
    candidates: Vec<String>,
    deadline: DateTime<Utc>,
    /// Voter address to voting weight.
    rights: HashMap<String, u64>,
    /// Voter address to chosen proposal.
    voted: HashMap<String, ProposalIndex>,
    counts: Vec<u64>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_auto_confirm(true)
    }

    pub fn with_auto_confirm(auto_confirm: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                elections: Vec::new(),
                txs: HashMap::new(),
                next_tx: 0,
            }),
            auto_confirm,
        }
    }

    /// Confirm every pending transaction.
    pub fn confirm_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        for status in inner.txs.values_mut() {
            if *status == TxStatus::Pending {
                *status = TxStatus::Confirmed;
            }
        }
    }

    /// Mark a transaction as failed, e.g. to simulate a revert.
    pub fn fail_tx(&self, tx: &TxId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(status) = inner.txs.get_mut(tx) {
            *status = TxStatus::Failed;
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn new_tx(&mut self, auto_confirm: bool) -> TxId {
        let tx = TxId(format!("memtx-{}", self.next_tx));
        self.next_tx += 1;
        let status = if auto_confirm {
            TxStatus::Confirmed
        } else {
            TxStatus::Pending
        };
        self.txs.insert(tx.clone(), status);
        tx
    }

    fn election(&self, ordinal: ElectionOrdinal) -> Result<&LedgerElection, LedgerError> {
        self.elections
            .get(ordinal as usize)
            .ok_or(LedgerError::UnknownElection(ordinal))
    }

    fn election_mut(
        &mut self,
        ordinal: ElectionOrdinal,
    ) -> Result<&mut LedgerElection, LedgerError> {
        self.elections
            .get_mut(ordinal as usize)
            .ok_or(LedgerError::UnknownElection(ordinal))
    }
}

impl LedgerElection {
    /// The contract's winner scan: strictly-greater comparison, so the
    /// lowest index among tied maxima is kept. No votes, no winner.
    fn winning_proposal(&self) -> Option<ProposalIndex> {
        let mut winner = None;
        let mut winning_count = 0u64;
        for (index, &count) in self.counts.iter().enumerate() {
            if count > winning_count {
                winning_count = count;
                winner = Some(index as ProposalIndex);
            }
        }
        winner
    }
}

#[rocket::async_trait]
impl VoteLedger for MemoryLedger {
    async fn create_election(
        &self,
        title: &str,
        candidate_names: &[String],
        duration_secs: i64,
    ) -> Result<CreatedElection, LedgerError> {
        if candidate_names.is_empty() {
            return Err(LedgerError::Rejected(Rejection::Other("no proposals".to_string())));
        }
        let mut inner = self.inner.lock().unwrap();
        let election_index = inner.elections.len() as ElectionOrdinal;
        inner.elections.push(LedgerElection {
            title: title.to_string(),
            candidates: candidate_names.to_vec(),
            deadline: Utc::now() + Duration::seconds(duration_secs),
            rights: HashMap::new(),
            voted: HashMap::new(),
            counts: vec![0; candidate_names.len()],
        });
        let tx = inner.new_tx(self.auto_confirm);
        Ok(CreatedElection { election_index, tx })
    }

    async fn give_right_to_vote(
        &self,
        election: ElectionOrdinal,
        voter: &str,
        weight: u64,
    ) -> Result<TxId, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.election_mut(election)?;
        if record.voted.contains_key(voter) {
            return Err(LedgerError::Rejected(Rejection::AlreadyVoted));
        }
        record.rights.insert(voter.to_string(), weight);
        Ok(inner.new_tx(self.auto_confirm))
    }

    async fn vote(
        &self,
        election: ElectionOrdinal,
        voter: &str,
        proposal: ProposalIndex,
    ) -> Result<TxId, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.election_mut(election)?;
        if Utc::now() >= record.deadline {
            return Err(LedgerError::Rejected(Rejection::ElectionClosed));
        }
        if record.rights.get(voter).copied().unwrap_or(0) == 0 {
            return Err(LedgerError::Rejected(Rejection::NoRight));
        }
        if record.voted.contains_key(voter) {
            return Err(LedgerError::Rejected(Rejection::AlreadyVoted));
        }
        if proposal as usize >= record.candidates.len() {
            return Err(LedgerError::Rejected(Rejection::NoSuchProposal));
        }
        let weight = record.rights[voter];
        record.voted.insert(voter.to_string(), proposal);
        record.counts[proposal as usize] += weight;
        Ok(inner.new_tx(self.auto_confirm))
    }

    async fn time_left(&self, election: ElectionOrdinal) -> Result<u64, LedgerError> {
        let inner = self.inner.lock().unwrap();
        let record = inner.election(election)?;
        let left = (record.deadline - Utc::now()).num_seconds();
        Ok(u64::try_from(left).unwrap_or(0))
    }

    async fn vote_counts(&self, election: ElectionOrdinal) -> Result<Vec<u64>, LedgerError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.election(election)?.counts.clone())
    }

    async fn winner(&self, election: ElectionOrdinal) -> Result<LedgerWinner, LedgerError> {
        let inner = self.inner.lock().unwrap();
        let record = inner.election(election)?;
        let proposal = record.winning_proposal();
        Ok(LedgerWinner {
            proposal,
            name: proposal.map(|index| record.candidates[index as usize].clone()),
        })
    }

    async fn tx_status(&self, tx: &TxId) -> Result<TxStatus, LedgerError> {
        let inner = self.inner.lock().unwrap();
        inner
            .txs
            .get(tx)
            .copied()
            .ok_or_else(|| LedgerError::UnknownTx(tx.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The full happy-path scenario: create, grant, vote, tally, winner.
    #[rocket::async_test]
    async fn student_council_scenario() {
        let ledger = MemoryLedger::new();
        let created = ledger
            .create_election(
                "Student Council",
                &["Alice".to_string(), "Bob".to_string()],
                3600,
            )
            .await
            .unwrap();
        assert_eq!(created.election_index, 0);
        assert_eq!(
            ledger.tx_status(&created.tx).await.unwrap(),
            TxStatus::Confirmed
        );

        ledger.give_right_to_vote(0, "0xv", 1).await.unwrap();
        ledger.vote(0, "0xv", 0).await.unwrap();

        // A second vote by the same voter is rejected, not overwritten.
        let err = ledger.vote(0, "0xv", 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(Rejection::AlreadyVoted)));

        assert_eq!(ledger.vote_counts(0).await.unwrap(), vec![1, 0]);
        let winner = ledger.winner(0).await.unwrap();
        assert_eq!(winner.proposal, Some(0));
        assert_eq!(winner.name, Some("Alice".to_string()));
    }

    #[rocket::async_test]
    async fn election_indices_are_dense() {
        let ledger = MemoryLedger::new();
        for expected in 0..3 {
            let created = ledger
                .create_election("E", &["X".to_string()], 60)
                .await
                .unwrap();
            assert_eq!(created.election_index, expected);
        }
    }

    #[rocket::async_test]
    async fn voting_without_a_right_is_rejected() {
        let ledger = MemoryLedger::new();
        ledger
            .create_election("E", &["X".to_string()], 60)
            .await
            .unwrap();
        let err = ledger.vote(0, "0xnobody", 0).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(Rejection::NoRight)));
    }

    #[rocket::async_test]
    async fn closed_election_rejects_votes_even_with_rights() {
        let ledger = MemoryLedger::new();
        // Deadline already passed at creation.
        ledger
            .create_election("E", &["X".to_string()], -1)
            .await
            .unwrap();
        ledger.give_right_to_vote(0, "0xv", 1).await.unwrap();
        let err = ledger.vote(0, "0xv", 0).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(Rejection::ElectionClosed)));
        assert_eq!(ledger.time_left(0).await.unwrap(), 0);
    }

    #[rocket::async_test]
    async fn out_of_range_proposal_is_rejected() {
        let ledger = MemoryLedger::new();
        ledger
            .create_election("E", &["X".to_string(), "Y".to_string()], 60)
            .await
            .unwrap();
        ledger.give_right_to_vote(0, "0xv", 1).await.unwrap();
        let err = ledger.vote(0, "0xv", 2).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(Rejection::NoSuchProposal)));
    }

    #[rocket::async_test]
    async fn no_votes_means_no_winner() {
        let ledger = MemoryLedger::new();
        ledger
            .create_election("E", &["X".to_string(), "Y".to_string()], 60)
            .await
            .unwrap();
        let winner = ledger.winner(0).await.unwrap();
        assert_eq!(winner.proposal, None);
        assert_eq!(winner.name, None);
    }

    #[rocket::async_test]
    async fn tied_winner_is_the_lowest_index() {
        let ledger = MemoryLedger::new();
        ledger
            .create_election("E", &["X".to_string(), "Y".to_string()], 60)
            .await
            .unwrap();
        ledger.give_right_to_vote(0, "0xa", 1).await.unwrap();
        ledger.give_right_to_vote(0, "0xb", 1).await.unwrap();
        ledger.vote(0, "0xa", 1).await.unwrap();
        ledger.vote(0, "0xb", 0).await.unwrap();
        assert_eq!(ledger.winner(0).await.unwrap().proposal, Some(0));
    }

    #[rocket::async_test]
    async fn manual_confirmation_flow() {
        let ledger = MemoryLedger::with_auto_confirm(false);
        let created = ledger
            .create_election("E", &["X".to_string()], 60)
            .await
            .unwrap();
        assert_eq!(
            ledger.tx_status(&created.tx).await.unwrap(),
            TxStatus::Pending
        );
        ledger.confirm_all();
        assert_eq!(
            ledger.tx_status(&created.tx).await.unwrap(),
            TxStatus::Confirmed
        );

        let tx = ledger.give_right_to_vote(0, "0xv", 1).await.unwrap();
        ledger.fail_tx(&tx);
        assert_eq!(ledger.tx_status(&tx).await.unwrap(), TxStatus::Failed);
    }
}
