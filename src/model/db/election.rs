use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{ElectionOrdinal, ProposalIndex},
    mongodb::Id,
};

/// A view on just the election's top-level metadata.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionMetadata {
    /// Election title.
    pub title: String,
    /// When the election was created.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// Absolute voting deadline. Votes at or after this instant are rejected.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub deadline: DateTime<Utc>,
}

/// A candidate standing in an election, identified by its position in the
/// candidate list. That position is the proposal index used for tallying,
/// so the list is immutable once the election is published.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub vision: String,
    pub mission: String,
    /// Opaque URL from the file-storage collaborator.
    pub image_url: Option<String>,
}

/// Core election data, as stored in the database.
///
/// Candidates are embedded in the election document, so an election and its
/// candidates are written in a single atomic insert; there is no window in
/// which an election exists without its candidates.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Dense zero-based ordinal, identical to the ledger's election index.
    pub ordinal: ElectionOrdinal,
    /// Top-level metadata.
    #[serde(flatten)]
    pub metadata: ElectionMetadata,
    /// Ordered candidate list; position is the proposal index.
    pub candidates: Vec<Candidate>,
}

impl ElectionCore {
    /// Is the election still open for voting at the given instant?
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now < self.metadata.deadline
    }

    /// Seconds of voting time remaining, zero once closed.
    pub fn time_left(&self, now: DateTime<Utc>) -> u64 {
        let left = (self.metadata.deadline - now).num_seconds();
        u64::try_from(left).unwrap_or(0)
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Look up a candidate by proposal index.
    pub fn candidate(&self, proposal: ProposalIndex) -> Option<&Candidate> {
        self.candidates.get(proposal as usize)
    }
}

/// An election with its unique document ID.
///
/// The ID is generated before insertion so a ledger-mirrored election can be
/// described to the caller while its relational write is still pending.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    pub fn new(election: ElectionCore) -> Self {
        Self {
            id: Id::new(),
            election,
        }
    }
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    fn example(deadline: DateTime<Utc>) -> ElectionCore {
        ElectionCore {
            ordinal: 0,
            metadata: ElectionMetadata {
                title: "Student Council".to_string(),
                created_at: deadline - Duration::hours(1),
                deadline,
            },
            candidates: vec![
                Candidate {
                    name: "Alice".to_string(),
                    vision: "More quiet study space".to_string(),
                    mission: "Extend library hours".to_string(),
                    image_url: None,
                },
                Candidate {
                    name: "Bob".to_string(),
                    vision: "Cheaper canteen food".to_string(),
                    mission: "Renegotiate catering".to_string(),
                    image_url: None,
                },
            ],
        }
    }

    #[test]
    fn election_closes_exactly_at_deadline() {
        let deadline = Utc::now();
        let election = example(deadline);
        assert!(election.is_open(deadline - Duration::seconds(1)));
        assert!(!election.is_open(deadline));
        assert!(!election.is_open(deadline + Duration::seconds(1)));
    }

    #[test]
    fn time_left_saturates_at_zero() {
        let deadline = Utc::now();
        let election = example(deadline);
        assert_eq!(election.time_left(deadline - Duration::seconds(90)), 90);
        assert_eq!(election.time_left(deadline), 0);
        assert_eq!(election.time_left(deadline + Duration::hours(2)), 0);
    }

    #[test]
    fn candidate_lookup_respects_bounds() {
        let election = example(Utc::now());
        assert_eq!(election.candidate(0).unwrap().name, "Alice");
        assert_eq!(election.candidate(1).unwrap().name, "Bob");
        assert!(election.candidate(2).is_none());
    }
}
