use chrono::Utc;
use mongodb::{
    bson::{doc, Bson},
    options::FindOptions,
    Database,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::{Error, Result},
    ledger::{LedgerState, MirrorWrite, MirrorWriters},
    model::{
        api::{ElectionSummary, VoteDescription, VoteSpec, WriteReceipt, WriteResponse},
        auth::{AuthToken, Voter},
        db::{Election, Vote, VotingRight},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
};

use super::common;

pub fn routes() -> Vec<Route> {
    routes![cast_vote, my_vote, my_elections]
}

/// Cast a vote.
///
/// Preconditions are checked in a fixed order, so a request violating
/// several always gets the same rejection: the election must exist and be
/// open, the voter must hold a right, the voter must not have voted, and
/// the proposal index must name a candidate.
///
/// The precondition checks are racy on their own; the unique index on
/// `(election_id, voter_id)` is what actually guarantees at most one vote.
#[post("/elections/<election_id>/votes", data = "<spec>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    election_id: Id,
    spec: Json<VoteSpec>,
    elections: Coll<Election>,
    rights: Coll<VotingRight>,
    votes: Coll<Vote>,
    ledger: &State<LedgerState>,
    mirrors: &State<MirrorWriters>,
    config: &State<Config>,
    db: &State<Database>,
) -> Result<Json<WriteResponse<VoteDescription>>> {
    let election = common::election_by_id(&elections, &election_id).await?;
    if !election.is_open(Utc::now()) {
        return Err(Error::ElectionClosed);
    }
    let right = common::voting_right(&rights, &election_id, token.id())
        .await?
        .ok_or_else(|| {
            Error::NotAuthorized(format!(
                "voter {} holds no voting right for this election",
                token.id()
            ))
        })?;
    if common::recorded_vote(&votes, &election_id, token.id())
        .await?
        .is_some()
    {
        return Err(Error::AlreadyVoted);
    }
    let proposal = spec.proposal_index;
    if election.candidate(proposal).is_none() {
        return Err(Error::InvalidCandidate {
            proposal_index: proposal,
            candidate_count: election.candidate_count(),
        });
    }

    let vote = Vote::new(election_id, token.id().clone(), proposal);
    match ledger.get() {
        Some(chain) => {
            let wallet = right
                .wallet
                .as_deref()
                .or_else(|| token.wallet())
                .ok_or_else(|| {
                    Error::Validation("no wallet on file for this voter".to_string())
                })?
                .to_string();
            let tx = chain.vote(election.ordinal, &wallet, proposal).await?;
            let description = VoteDescription::from(vote.clone());
            mirrors
                .schedule(
                    chain.clone(),
                    db.inner().clone(),
                    tx.clone(),
                    MirrorWrite::Vote(vote),
                    config.confirm_interval(),
                    config.confirm_attempts(),
                )
                .await;
            Ok(Json(WriteResponse {
                record: description,
                write: WriteReceipt::Pending { tx_id: tx },
            }))
        }
        None => {
            match votes.insert_one(&vote, None).await {
                Ok(_) => {}
                // Lost a race with a concurrent vote by the same voter.
                Err(err) if is_duplicate_key_error(&err) => return Err(Error::AlreadyVoted),
                Err(err) => return Err(err.into()),
            }
            Ok(Json(WriteResponse {
                record: vote.into(),
                write: WriteReceipt::Confirmed,
            }))
        }
    }
}

/// The caller's own recorded vote in the given election.
#[get("/elections/<election_id>/votes/mine")]
async fn my_vote(
    token: AuthToken<Voter>,
    election_id: Id,
    elections: Coll<Election>,
    votes: Coll<Vote>,
) -> Result<Json<VoteDescription>> {
    let _election = common::election_by_id(&elections, &election_id).await?;
    let vote = common::recorded_vote(&votes, &election_id, token.id())
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "Vote by voter {} in election {}",
                token.id(),
                election_id
            ))
        })?;
    Ok(Json(vote.into()))
}

/// The elections the caller has been granted a right in.
#[get("/elections/mine")]
async fn my_elections(
    token: AuthToken<Voter>,
    rights: Coll<VotingRight>,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionSummary>>> {
    let granted: Vec<VotingRight> = rights
        .find(doc! { "voter_id": token.id() }, None)
        .await?
        .try_collect()
        .await?;
    let ids: Vec<Bson> = granted
        .iter()
        .map(|right| right.election_id.into())
        .collect();
    let options = FindOptions::builder().sort(doc! { "ordinal": 1 }).build();
    let mine: Vec<Election> = elections
        .find(doc! { "_id": { "$in": ids } }, options)
        .await?
        .try_collect()
        .await?;
    Ok(Json(mine.iter().map(ElectionSummary::from).collect()))
}
