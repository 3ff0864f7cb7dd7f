use chrono::Utc;
use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    ledger::LedgerState,
    model::{
        api::{ElectionDescription, ElectionResults, ElectionSummary, LedgerResults},
        common::Tally,
        db::{Election, Vote},
        mongodb::{Coll, Id},
    },
};

use super::common;

pub fn routes() -> Vec<Route> {
    routes![elections, election, results, ledger_results, time_left]
}

/// List all elections, in ordinal order.
#[get("/elections")]
async fn elections(elections: Coll<Election>) -> Result<Json<Vec<ElectionSummary>>> {
    let options = FindOptions::builder().sort(doc! { "ordinal": 1 }).build();
    let all: Vec<Election> = elections.find(None, options).await?.try_collect().await?;
    Ok(Json(all.iter().map(ElectionSummary::from).collect()))
}

/// Describe a single election, candidates included.
#[get("/elections/<election_id>")]
async fn election(
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let election = common::election_by_id(&elections, &election_id).await?;
    Ok(Json(election.into()))
}

/// Tally results, recomputed from the recorded votes on every request.
/// Results are visible while the election is still open.
#[get("/elections/<election_id>/results")]
async fn results(
    election_id: Id,
    elections: Coll<Election>,
    votes: Coll<Vote>,
) -> Result<Json<ElectionResults>> {
    let election = common::election_by_id(&elections, &election_id).await?;
    let recorded: Vec<Vote> = votes
        .find(doc! { "election_id": election_id }, None)
        .await?
        .try_collect()
        .await?;
    let tally = Tally::from_votes(
        election.candidate_count(),
        recorded.into_iter().map(|vote| vote.proposal_index),
    );
    Ok(Json(tally.into()))
}

/// Results as the on-chain ledger reports them, cross-checked against the
/// candidate list on record. The ledger is authoritative; any disagreement
/// is a data fault, not a result.
#[get("/elections/<election_id>/results/ledger")]
async fn ledger_results(
    election_id: Id,
    elections: Coll<Election>,
    ledger: &State<LedgerState>,
) -> Result<Json<LedgerResults>> {
    let election = common::election_by_id(&elections, &election_id).await?;
    let chain = ledger.require()?;

    let counts = chain.vote_counts(election.ordinal).await?;
    if counts.len() != election.candidate_count() {
        return Err(Error::IntegrityFault(format!(
            "ledger reports {} proposals for election {} but {} candidates are on record",
            counts.len(),
            election.ordinal,
            election.candidate_count()
        )));
    }

    let winner = chain.winner(election.ordinal).await?;
    if let (Some(proposal), Some(name)) = (winner.proposal, winner.name.as_deref()) {
        match election.candidate(proposal) {
            Some(candidate) if candidate.name == name => {}
            _ => {
                return Err(Error::IntegrityFault(format!(
                    "ledger winner '{}' (proposal {}) does not match the candidate on record",
                    name, proposal
                )))
            }
        }
    }

    Ok(Json(LedgerResults {
        counts,
        winning_proposal: winner.proposal,
        winner_name: winner.name,
    }))
}

/// Seconds of voting time remaining, zero once the election is closed.
/// Sourced from the ledger when one is configured, since its clock decides
/// whether a vote lands in time.
#[get("/elections/<election_id>/time-left")]
async fn time_left(
    election_id: Id,
    elections: Coll<Election>,
    ledger: &State<LedgerState>,
) -> Result<Json<u64>> {
    let election = common::election_by_id(&elections, &election_id).await?;
    match ledger.get() {
        Some(chain) => Ok(Json(chain.time_left(election.ordinal).await?)),
        None => Ok(Json(election.time_left(Utc::now()))),
    }
}
