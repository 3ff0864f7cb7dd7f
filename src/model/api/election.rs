use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::ElectionOrdinal,
    db::{Candidate, Election, ElectionCore, ElectionMetadata},
    mongodb::Id,
};

/// An election specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// Election title.
    pub title: String,
    /// Ordered candidates; their position here becomes the proposal index.
    pub candidates: Vec<CandidateSpec>,
    /// Voting window length in seconds, measured from creation.
    pub duration_secs: i64,
}

/// A candidate within an election specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub vision: String,
    #[serde(default)]
    pub mission: String,
    /// Opaque URL previously obtained from the file-storage service.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ElectionSpec {
    /// Reject malformed specs, naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("election title must not be empty".into()));
        }
        if self.candidates.is_empty() {
            return Err(Error::Validation(
                "an election needs at least one candidate".into(),
            ));
        }
        for (index, candidate) in self.candidates.iter().enumerate() {
            if candidate.name.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "candidate {} has an empty name",
                    index
                )));
            }
        }
        if self.duration_secs <= 0 {
            return Err(Error::Validation(
                "election duration must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The candidate names in proposal-index order, as sent to the ledger.
    pub fn candidate_names(&self) -> Vec<String> {
        self.candidates
            .iter()
            .map(|candidate| candidate.name.clone())
            .collect()
    }

    /// Convert this spec into a storable election with the given ordinal,
    /// with the deadline computed from `now`.
    pub fn into_election(self, ordinal: ElectionOrdinal, now: DateTime<Utc>) -> ElectionCore {
        ElectionCore {
            ordinal,
            metadata: ElectionMetadata {
                title: self.title,
                created_at: now,
                deadline: now + Duration::seconds(self.duration_secs),
            },
            candidates: self
                .candidates
                .into_iter()
                .map(|candidate| Candidate {
                    name: candidate.name,
                    vision: candidate.vision,
                    mission: candidate.mission,
                    image_url: candidate.image_url,
                })
                .collect(),
        }
    }
}

/// A single election in the election list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: Id,
    pub ordinal: ElectionOrdinal,
    pub title: String,
    pub deadline: DateTime<Utc>,
    pub candidate_count: usize,
}

impl From<&Election> for ElectionSummary {
    fn from(election: &Election) -> Self {
        Self {
            id: election.id,
            ordinal: election.ordinal,
            title: election.metadata.title.clone(),
            deadline: election.metadata.deadline,
            candidate_count: election.candidate_count(),
        }
    }
}

/// The full public description of an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: Id,
    pub ordinal: ElectionOrdinal,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Ordered by proposal index.
    pub candidates: Vec<CandidateDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub name: String,
    pub vision: String,
    pub mission: String,
    pub image_url: Option<String>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            ordinal: election.election.ordinal,
            title: election.election.metadata.title,
            created_at: election.election.metadata.created_at,
            deadline: election.election.metadata.deadline,
            candidates: election
                .election
                .candidates
                .into_iter()
                .map(|candidate| CandidateDescription {
                    name: candidate.name,
                    vision: candidate.vision,
                    mission: candidate.mission,
                    image_url: candidate.image_url,
                })
                .collect(),
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ElectionSpec {
        pub fn student_council() -> Self {
            Self {
                title: "Student Council".to_string(),
                candidates: vec![
                    CandidateSpec {
                        name: "Alice".to_string(),
                        vision: "A greener campus".to_string(),
                        mission: "Plant trees along the main walk".to_string(),
                        image_url: None,
                    },
                    CandidateSpec {
                        name: "Bob".to_string(),
                        vision: "Better sports facilities".to_string(),
                        mission: "Reopen the east gym".to_string(),
                        image_url: None,
                    },
                ],
                duration_secs: 3600,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_spec_passes() {
        assert!(ElectionSpec::student_council().validate().is_ok());
    }

    #[test]
    fn empty_title_is_rejected() {
        let mut spec = ElectionSpec::student_council();
        spec.title = "  ".to_string();
        let err = spec.validate().unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn missing_candidates_are_rejected() {
        let mut spec = ElectionSpec::student_council();
        spec.candidates.clear();
        assert_eq!(spec.validate().unwrap_err().kind(), "validation");
    }

    #[test]
    fn unnamed_candidate_is_rejected() {
        let mut spec = ElectionSpec::student_council();
        spec.candidates[1].name = String::new();
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("candidate 1"));
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        let mut spec = ElectionSpec::student_council();
        spec.duration_secs = 0;
        assert_eq!(spec.validate().unwrap_err().kind(), "validation");
        spec.duration_secs = -30;
        assert_eq!(spec.validate().unwrap_err().kind(), "validation");
    }

    #[test]
    fn deadline_is_now_plus_duration() {
        let now = Utc::now();
        let spec = ElectionSpec::student_council();
        let duration = spec.duration_secs;
        let election = spec.into_election(4, now);
        assert_eq!(election.ordinal, 4);
        assert_eq!(
            election.metadata.deadline,
            now + Duration::seconds(duration)
        );
        assert_eq!(election.candidate_count(), 2);
        assert_eq!(election.candidate(0).unwrap().name, "Alice");
    }
}
