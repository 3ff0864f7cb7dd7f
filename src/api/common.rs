//! Lookups shared between route modules.

use mongodb::bson::doc;

use crate::error::{Error, Result};
use crate::model::{
    common::VoterId,
    db::{Election, Vote, VotingRight},
    mongodb::{Coll, Id},
};

/// Find an election by its document ID.
pub async fn election_by_id(elections: &Coll<Election>, election_id: &Id) -> Result<Election> {
    elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Election with ID '{}'", election_id)))
}

/// The voter's right for the given election, if one has been granted.
pub async fn voting_right(
    rights: &Coll<VotingRight>,
    election_id: &Id,
    voter_id: &VoterId,
) -> Result<Option<VotingRight>> {
    let filter = doc! {
        "election_id": *election_id,
        "voter_id": voter_id,
    };
    Ok(rights.find_one(filter, None).await?)
}

/// The voter's recorded vote in the given election, if any.
pub async fn recorded_vote(
    votes: &Coll<Vote>,
    election_id: &Id,
    voter_id: &VoterId,
) -> Result<Option<Vote>> {
    let filter = doc! {
        "election_id": *election_id,
        "voter_id": voter_id,
    };
    Ok(votes.find_one(filter, None).await?)
}
