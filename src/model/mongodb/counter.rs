use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

/// The well-known counter that assigns dense election ordinals,
/// starting from zero.
pub const ELECTION_ORDINAL_COUNTER: &str = "election_ordinal";

/// A named counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub name: String,
    pub next: u64,
}

impl Counter {
    /// Atomically take the next value of the counter with the given name.
    pub async fn next(counters: &Coll<Counter>, name: &str) -> Result<u64> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": name }, update, options)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Counter '{}'", name)))?;
        Ok(counter.next)
    }
}

/// Ensure the election ordinal counter exists, without disturbing its value
/// if it already does.
pub async fn ensure_election_ordinal_counter_exists(
    counters: &Coll<Counter>,
) -> Result<()> {
    let filter = doc! { "_id": ELECTION_ORDINAL_COUNTER };
    let update = doc! {
        "$setOnInsert": { "next": 0i64 }
    };
    let options = UpdateOptions::builder().upsert(true).build();
    counters.update_one(filter, update, options).await?;
    Ok(())
}
