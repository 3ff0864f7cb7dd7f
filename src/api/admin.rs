use chrono::Utc;
use mongodb::{bson::doc, Database};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::{Error, Result},
    ledger::{LedgerState, MirrorWrite, MirrorWriters},
    model::{
        api::{
            BatchGrantRequest, ElectionDescription, ElectionSpec, GrantReport, GrantStatus,
            GrantTarget, GrantedRight, WriteReceipt, WriteResponse,
        },
        auth::{Admin, AuthToken},
        db::{Election, VotingRight},
        mongodb::{is_duplicate_key_error, Coll, Counter, Id, ELECTION_ORDINAL_COUNTER},
    },
};

use super::common;

pub fn routes() -> Vec<Route> {
    routes![create_election, grant_right, grant_rights_batch, granted_rights]
}

/// Create an election from a spec.
///
/// The candidate list is embedded in the election document, so the whole
/// election is written in one atomic insert. When a ledger is configured the
/// submission happens before the ordinal counter is advanced: a failed
/// gateway call then leaves the counter untouched and the request is simply
/// retryable, instead of burning an ordinal the ledger never assigned.
#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    counters: Coll<Counter>,
    ledger: &State<LedgerState>,
    mirrors: &State<MirrorWriters>,
    config: &State<Config>,
    db: &State<Database>,
) -> Result<Json<WriteResponse<ElectionDescription>>> {
    spec.validate()?;
    let spec = spec.into_inner();
    let candidate_names = spec.candidate_names();
    let duration_secs = spec.duration_secs;

    match ledger.get() {
        Some(chain) => {
            let created = chain
                .create_election(&spec.title, &candidate_names, duration_secs)
                .await?;
            let ordinal = next_ordinal(&counters).await?;
            check_ordinal_alignment(created.election_index, ordinal)?;
            let election = Election::new(spec.into_election(ordinal, Utc::now()));
            let description = ElectionDescription::from(election.clone());
            mirrors
                .schedule(
                    chain.clone(),
                    db.inner().clone(),
                    created.tx.clone(),
                    MirrorWrite::Election(election),
                    config.confirm_interval(),
                    config.confirm_attempts(),
                )
                .await;
            Ok(Json(WriteResponse {
                record: description,
                write: WriteReceipt::Pending { tx_id: created.tx },
            }))
        }
        None => {
            let ordinal = next_ordinal(&counters).await?;
            let election = Election::new(spec.into_election(ordinal, Utc::now()));
            elections.insert_one(&election, None).await?;
            Ok(Json(WriteResponse {
                record: election.into(),
                write: WriteReceipt::Confirmed,
            }))
        }
    }
}

/// Take the next dense election ordinal.
async fn next_ordinal(counters: &Coll<Counter>) -> Result<u32> {
    let ordinal = Counter::next(counters, ELECTION_ORDINAL_COUNTER).await?;
    u32::try_from(ordinal)
        .map_err(|_| Error::IntegrityFault("election ordinal counter overflowed".to_string()))
}

/// The ordinal joins the two stores; a mismatch means they have diverged and
/// nothing built on it can be trusted.
fn check_ordinal_alignment(ledger_index: u32, ordinal: u32) -> Result<()> {
    if ledger_index != ordinal {
        return Err(Error::IntegrityFault(format!(
            "ledger assigned election index {} but the ordinal counter produced {}",
            ledger_index, ordinal
        )));
    }
    Ok(())
}

/// Grant a single voting right.
#[post("/elections/<election_id>/rights", data = "<target>", format = "json")]
async fn grant_right(
    _token: AuthToken<Admin>,
    election_id: Id,
    target: Json<GrantTarget>,
    elections: Coll<Election>,
    rights: Coll<VotingRight>,
    ledger: &State<LedgerState>,
    mirrors: &State<MirrorWriters>,
    config: &State<Config>,
    db: &State<Database>,
) -> Result<Json<WriteResponse<GrantReport>>> {
    let election = common::election_by_id(&elections, &election_id).await?;
    if !election.is_open(Utc::now()) {
        return Err(Error::ElectionClosed);
    }
    let (report, write) = grant_one(
        &election,
        target.into_inner(),
        &rights,
        ledger.inner(),
        mirrors.inner(),
        config.inner(),
        db.inner(),
    )
    .await?;
    Ok(Json(WriteResponse { record: report, write }))
}

/// Grant rights to a batch of voters. Each grant is applied independently:
/// one failure is reported in that voter's row and never blocks the rest.
#[post("/elections/<election_id>/rights/batch", data = "<batch>", format = "json")]
async fn grant_rights_batch(
    _token: AuthToken<Admin>,
    election_id: Id,
    batch: Json<BatchGrantRequest>,
    elections: Coll<Election>,
    rights: Coll<VotingRight>,
    ledger: &State<LedgerState>,
    mirrors: &State<MirrorWriters>,
    config: &State<Config>,
    db: &State<Database>,
) -> Result<Json<Vec<GrantReport>>> {
    let election = common::election_by_id(&elections, &election_id).await?;
    if !election.is_open(Utc::now()) {
        return Err(Error::ElectionClosed);
    }

    let batch = batch.into_inner();
    let mut reports = Vec::with_capacity(batch.voters.len());
    for target in batch.voters {
        let voter_id = target.voter_id.clone();
        match grant_one(
            &election,
            target,
            &rights,
            ledger.inner(),
            mirrors.inner(),
            config.inner(),
            db.inner(),
        )
        .await
        {
            Ok((report, _)) => reports.push(report),
            Err(err) => {
                warn!("Grant for voter {} failed: {}", voter_id, err);
                reports.push(GrantReport {
                    voter_id,
                    status: GrantStatus::Failed,
                    detail: Some(err.to_string()),
                });
            }
        }
    }
    Ok(Json(reports))
}

/// List the rights granted for an election.
#[get("/elections/<election_id>/rights")]
async fn granted_rights(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    rights: Coll<VotingRight>,
) -> Result<Json<Vec<GrantedRight>>> {
    let _election = common::election_by_id(&elections, &election_id).await?;
    let granted: Vec<VotingRight> = rights
        .find(doc! { "election_id": election_id }, None)
        .await?
        .try_collect()
        .await?;
    Ok(Json(granted.into_iter().map(Into::into).collect()))
}

/// Grant one right. Granting is idempotent: an existing right reports
/// `AlreadyGranted` and changes nothing.
async fn grant_one(
    election: &Election,
    target: GrantTarget,
    rights: &Coll<VotingRight>,
    ledger: &LedgerState,
    mirrors: &MirrorWriters,
    config: &Config,
    db: &Database,
) -> Result<(GrantReport, WriteReceipt)> {
    if common::voting_right(rights, &election.id, &target.voter_id)
        .await?
        .is_some()
    {
        return Ok((
            GrantReport {
                voter_id: target.voter_id,
                status: GrantStatus::AlreadyGranted,
                detail: None,
            },
            WriteReceipt::Confirmed,
        ));
    }

    let right = VotingRight::new(election.id, target.voter_id.clone(), target.wallet);
    match ledger.get() {
        Some(chain) => {
            let wallet = right.wallet.as_deref().ok_or_else(|| {
                Error::Validation(format!(
                    "voter {} has no wallet on file; the grant cannot reach the ledger",
                    target.voter_id
                ))
            })?;
            let tx = chain
                .give_right_to_vote(election.ordinal, wallet, 1)
                .await?;
            mirrors
                .schedule(
                    chain.clone(),
                    db.clone(),
                    tx.clone(),
                    MirrorWrite::Right(right),
                    config.confirm_interval(),
                    config.confirm_attempts(),
                )
                .await;
            Ok((
                GrantReport {
                    voter_id: target.voter_id,
                    status: GrantStatus::Granted,
                    detail: None,
                },
                WriteReceipt::Pending { tx_id: tx },
            ))
        }
        None => {
            let status = match rights.insert_one(&right, None).await {
                Ok(_) => GrantStatus::Granted,
                // Lost a race with a concurrent grant for the same voter.
                Err(err) if is_duplicate_key_error(&err) => GrantStatus::AlreadyGranted,
                Err(err) => return Err(err.into()),
            };
            Ok((
                GrantReport {
                    voter_id: target.voter_id,
                    status,
                    detail: None,
                },
                WriteReceipt::Confirmed,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_ordinals_are_accepted() {
        assert!(check_ordinal_alignment(3, 3).is_ok());
        assert!(check_ordinal_alignment(0, 0).is_ok());
    }

    #[test]
    fn diverged_ordinals_are_an_integrity_fault() {
        let err = check_ordinal_alignment(4, 3).unwrap_err();
        assert_eq!(err.kind(), "integrity_fault");
    }
}
