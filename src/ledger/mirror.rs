use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use mongodb::Database;
use rand::Rng;
use rocket::{
    futures::future::{BoxFuture, FutureExt},
    tokio::sync::Mutex,
};

use crate::{
    error::Error,
    model::{
        db::{Election, Vote, VotingRight},
        mongodb::{is_duplicate_key_error, Coll},
    },
    scheduled_task::ScheduledTask,
};

use super::{TxId, VoteLedger, WriteState};

/// A relational write deferred until its ledger transaction confirms.
#[derive(Debug, Clone)]
pub enum MirrorWrite {
    Election(Election),
    Right(VotingRight),
    Vote(Vote),
}

impl MirrorWrite {
    fn describe(&self) -> String {
        match self {
            Self::Election(election) => {
                format!("election '{}' (ordinal {})", election.metadata.title, election.ordinal)
            }
            Self::Right(right) => {
                format!("right for voter {} in election {}", right.voter_id, right.election_id)
            }
            Self::Vote(vote) => {
                format!("vote by voter {} in election {}", vote.voter_id, vote.election_id)
            }
        }
    }

    /// Perform the projection write. Duplicate keys are tolerated: the
    /// unique indexes make replays of an already-applied write harmless.
    async fn apply(&self, db: &Database) -> Result<(), Error> {
        let result = match self {
            Self::Election(election) => Coll::<Election>::from_db(db)
                .insert_one(election, None)
                .await
                .map(|_| ()),
            Self::Right(right) => Coll::<VotingRight>::from_db(db)
                .insert_one(right, None)
                .await
                .map(|_| ()),
            Self::Vote(vote) => Coll::<Vote>::from_db(db)
                .insert_one(vote, None)
                .await
                .map(|_| ()),
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if is_duplicate_key_error(&err) => {
                debug!("Mirror write for {} was already applied", self.describe());
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Map from transaction IDs to their confirmation watchers.
type TaskMap = HashMap<TxId, ScheduledTask<Result<(), Error>>>;

/// Confirmation watchers for in-flight ledger writes.
///
/// The relational store is a projection of the ledger, so a mirror row is
/// written only once its transaction is observed to confirm; never on mere
/// submission. Polling is bounded: when the attempts run out the outcome is
/// logged as unknown and the row is left unwritten rather than guessed.
pub struct MirrorWriters {
    tasks: Arc<Mutex<TaskMap>>,
}

impl MirrorWriters {
    pub fn new() -> Self {
        Self {
            tasks: Default::default(),
        }
    }

    /// Watch the given transaction and apply `write` once it confirms.
    /// The first poll happens one interval from now.
    pub async fn schedule(
        &self,
        ledger: Arc<dyn VoteLedger>,
        db: Database,
        tx: TxId,
        write: MirrorWrite,
        poll_interval: Duration,
        attempts: u32,
    ) {
        debug!(
            "Watching {} for {} ({} attempts left)",
            tx,
            write.describe(),
            attempts
        );
        let watcher = Self::watcher(
            tx.clone(),
            write,
            ledger,
            db,
            poll_interval,
            attempts,
            self.tasks.clone(),
        );
        let run_at = next_poll_time(poll_interval);
        let mut tasks_locked = self.tasks.lock().await;
        if let Some(previous) = tasks_locked.remove(&tx) {
            // Can only happen if a transaction ID is resubmitted; the old
            // watcher is redundant either way.
            previous.cancel().await;
        }
        tasks_locked.insert(tx, ScheduledTask::new(watcher, run_at));
    }

    /// One poll of the transaction's status. Since this is a recursive async
    /// function, we must use `BoxFuture` to avoid an infinitely-recursive
    /// state machine.
    fn watcher(
        tx: TxId,
        write: MirrorWrite,
        ledger: Arc<dyn VoteLedger>,
        db: Database,
        poll_interval: Duration,
        attempts_left: u32,
        tasks: Arc<Mutex<TaskMap>>,
    ) -> BoxFuture<'static, Result<(), Error>> {
        async move {
            // An unpollable transaction counts as still pending.
            let state = match ledger.tx_status(&tx).await {
                Ok(status) => WriteState::Pending(tx.clone()).observe(status),
                Err(err) => {
                    warn!("Could not poll transaction {}: {}", tx, err);
                    WriteState::Pending(tx.clone())
                }
            };
            match state {
                WriteState::Confirmed => {
                    let result = write.apply(&db).await;
                    match &result {
                        Ok(()) => info!("Transaction {} confirmed; mirrored {}", tx, write.describe()),
                        Err(err) => error!(
                            "Transaction {} confirmed but mirroring {} failed: {}",
                            tx,
                            write.describe(),
                            err
                        ),
                    }
                    tasks.lock().await.remove(&tx);
                    result
                }
                WriteState::Failed(reason) => {
                    warn!(
                        "Dropping mirror write for {}: {}",
                        write.describe(),
                        reason
                    );
                    tasks.lock().await.remove(&tx);
                    Ok(())
                }
                _ if attempts_left == 0 => {
                    // Fail soft: the transaction may yet confirm, but we
                    // will not guess. An operator must reconcile by hand.
                    error!(
                        "Confirmation unknown for transaction {}; giving up on mirroring {}",
                        tx,
                        write.describe()
                    );
                    tasks.lock().await.remove(&tx);
                    Ok(())
                }
                _ => {
                    let retry = Self::watcher(
                        tx.clone(),
                        write,
                        ledger,
                        db,
                        poll_interval,
                        attempts_left - 1,
                        tasks.clone(),
                    );
                    let run_at = next_poll_time(poll_interval);
                    tasks
                        .lock()
                        .await
                        .insert(tx, ScheduledTask::new(retry, run_at));
                    Ok(())
                }
            }
        }
        .boxed()
    }
}

impl Default for MirrorWriters {
    fn default() -> Self {
        Self::new()
    }
}

/// The next poll instant: one interval from now plus up to a second of
/// jitter, so a burst of submissions doesn't poll in lockstep.
fn next_poll_time(poll_interval: Duration) -> chrono::DateTime<Utc> {
    let jitter = rand::thread_rng().gen_range(0..1000);
    Utc::now() + poll_interval + Duration::milliseconds(jitter)
}
