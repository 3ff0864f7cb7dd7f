use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
    serde::json::Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::{LedgerError, Rejection};
use crate::model::common::ProposalIndex;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a request can fail. Rejections carry enough detail that the
/// caller can tell exactly which precondition was violated; nothing is
/// collapsed into a generic failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    /// The ledger gateway failed or timed out. Rejections and a missing
    /// ledger never land here; `From<LedgerError>` folds those into the
    /// domain variants.
    #[error(transparent)]
    Ledger(LedgerError),
    /// Malformed input, e.g. an empty title or non-positive duration.
    #[error("Invalid request: {0}")]
    Validation(String),
    /// The voter holds no voting right for this election.
    #[error("Not authorized: {0}")]
    NotAuthorized(String),
    /// A vote already exists for this (election, voter) pair.
    #[error("A vote has already been cast in this election")]
    AlreadyVoted,
    /// The election's deadline has passed.
    #[error("The election is closed")]
    ElectionClosed,
    /// The proposal index does not name a candidate of this election.
    #[error("No candidate with proposal index {proposal_index} (election has {candidate_count})")]
    InvalidCandidate {
        proposal_index: ProposalIndex,
        candidate_count: usize,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    /// The relational store and the ledger disagree on data they must share
    /// exactly, e.g. the election ordinal. This is a data fault, not a
    /// business outcome.
    #[error("Integrity fault: {0}")]
    IntegrityFault(String),
}

impl Error {
    /// The stable machine-readable kind reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Db(_) => "database",
            Self::Jwt(_) => "authentication",
            Self::Ledger(_) => "external_dependency",
            Self::Validation(_) => "validation",
            Self::NotAuthorized(_) => "not_authorized",
            Self::AlreadyVoted => "already_voted",
            Self::ElectionClosed => "election_closed",
            Self::InvalidCandidate { .. } => "invalid_candidate",
            Self::NotFound(_) => "not_found",
            Self::IntegrityFault(_) => "integrity_fault",
        }
    }

    fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::IntegrityFault(_) => Status::InternalServerError,
            Self::Ledger(_) => Status::BadGateway,
            Self::Validation(_) | Self::InvalidCandidate { .. } => Status::BadRequest,
            Self::NotAuthorized(_) => Status::Forbidden,
            Self::AlreadyVoted => Status::Conflict,
            Self::ElectionClosed => Status::Gone,
            Self::NotFound(_) => Status::NotFound,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
        }
    }
}

/// With a ledger configured the relational mirror lags until confirmation,
/// so the ledger can be the first place a precondition failure is detected.
/// Its rejections fold back into the same domain errors the relational path
/// reports; only genuine dependency failures stay `Ledger`.
impl From<LedgerError> for Error {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(Rejection::AlreadyVoted) => Self::AlreadyVoted,
            LedgerError::Rejected(Rejection::ElectionClosed) => Self::ElectionClosed,
            LedgerError::Rejected(Rejection::NoRight) => Self::NotAuthorized(
                "the ledger records no voting right for this voter".to_string(),
            ),
            LedgerError::Rejected(rejection) => {
                Self::Validation(format!("the ledger rejected the operation: {}", rejection))
            }
            LedgerError::NotConfigured => Self::NotFound("No ledger is configured".to_string()),
            other => Self::Ledger(other),
        }
    }
}

/// The JSON body attached to every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => warn!("{self}"),
        }
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::http::Status;

    #[test]
    fn ledger_rejections_surface_as_the_failed_precondition() {
        let err = Error::from(LedgerError::Rejected(Rejection::AlreadyVoted));
        assert_eq!(err.kind(), "already_voted");
        assert_eq!(err.status(), Status::Conflict);

        let err = Error::from(LedgerError::Rejected(Rejection::ElectionClosed));
        assert_eq!(err.kind(), "election_closed");
        assert_eq!(err.status(), Status::Gone);

        let err = Error::from(LedgerError::Rejected(Rejection::NoRight));
        assert_eq!(err.kind(), "not_authorized");
        assert_eq!(err.status(), Status::Forbidden);

        let err = Error::from(LedgerError::Rejected(Rejection::NoSuchProposal));
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.status(), Status::BadRequest);
    }

    #[test]
    fn unrecognized_ledger_rejections_are_still_client_errors() {
        let err = Error::from(LedgerError::Rejected(Rejection::Other(
            "contract paused".to_string(),
        )));
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("contract paused"));
    }

    #[test]
    fn missing_ledger_reads_are_not_found() {
        let err = Error::from(LedgerError::NotConfigured);
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.status(), Status::NotFound);
    }

    #[test]
    fn gateway_faults_stay_external() {
        let err = Error::from(LedgerError::Gateway("503: unavailable".to_string()));
        assert_eq!(err.kind(), "external_dependency");
        assert_eq!(err.status(), Status::BadGateway);
    }
}
