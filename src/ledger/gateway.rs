use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::model::common::{ElectionOrdinal, ProposalIndex};

use super::{CreatedElection, LedgerError, LedgerWinner, Rejection, TxId, TxStatus, VoteLedger};

/// A client for the chain-gateway service wrapping the deployed election
/// contract. The gateway holds the relayer key; this backend only ever
/// speaks JSON to it.
pub struct GatewayLedger {
    base_url: String,
    client: Client,
}

impl GatewayLedger {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode the JSON body, translating gateway failures
    /// into [`LedgerError`]s.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, LedgerError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let detail = response.text().await.unwrap_or_default();
        match status {
            // The gateway distinguishes contract reverts from its own faults.
            StatusCode::UNPROCESSABLE_ENTITY => Err(LedgerError::Rejected(parse_rejection(&detail))),
            _ => Err(LedgerError::Gateway(format!("{}: {}", status, detail))),
        }
    }
}

/// Decode a contract revert reported by the gateway. The gateway names the
/// violated precondition in a `reason` code; an unrecognized or non-JSON
/// body is carried through verbatim.
fn parse_rejection(body: &str) -> Rejection {
    #[derive(Deserialize)]
    struct RejectionBody {
        reason: Option<String>,
        detail: Option<String>,
    }
    let parsed: Option<RejectionBody> = rocket::serde::json::serde_json::from_str(body).ok();
    let parsed = match parsed {
        Some(parsed) => parsed,
        None => return Rejection::Other(body.to_string()),
    };
    match parsed.reason.as_deref() {
        Some("already_voted") => Rejection::AlreadyVoted,
        Some("election_closed") => Rejection::ElectionClosed,
        Some("no_right") => Rejection::NoRight,
        Some("no_such_proposal") => Rejection::NoSuchProposal,
        _ => Rejection::Other(parsed.detail.unwrap_or_else(|| body.to_string())),
    }
}

#[derive(Serialize)]
struct CreateElectionRequest<'a> {
    title: &'a str,
    candidates: &'a [String],
    duration_secs: i64,
}

#[derive(Serialize)]
struct GrantRequest<'a> {
    voter: &'a str,
    weight: u64,
}

#[derive(Serialize)]
struct VoteRequest<'a> {
    voter: &'a str,
    proposal_index: ProposalIndex,
}

#[derive(Deserialize)]
struct TxResponse {
    tx_id: TxId,
}

#[derive(Deserialize)]
struct CreatedResponse {
    election_index: ElectionOrdinal,
    tx_id: TxId,
}

#[derive(Deserialize)]
struct TimeLeftResponse {
    seconds: u64,
}

#[derive(Deserialize)]
struct CountsResponse {
    counts: Vec<u64>,
}

#[derive(Deserialize)]
struct WinnerResponse {
    proposal_index: Option<ProposalIndex>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct TxStatusResponse {
    status: TxStatus,
}

#[rocket::async_trait]
impl VoteLedger for GatewayLedger {
    async fn create_election(
        &self,
        title: &str,
        candidate_names: &[String],
        duration_secs: i64,
    ) -> Result<CreatedElection, LedgerError> {
        let body = CreateElectionRequest {
            title,
            candidates: candidate_names,
            duration_secs,
        };
        let created: CreatedResponse = self
            .send(self.client.post(self.url("/elections")).json(&body))
            .await?;
        Ok(CreatedElection {
            election_index: created.election_index,
            tx: created.tx_id,
        })
    }

    async fn give_right_to_vote(
        &self,
        election: ElectionOrdinal,
        voter: &str,
        weight: u64,
    ) -> Result<TxId, LedgerError> {
        let body = GrantRequest { voter, weight };
        let response: TxResponse = self
            .send(
                self.client
                    .post(self.url(&format!("/elections/{}/rights", election)))
                    .json(&body),
            )
            .await?;
        Ok(response.tx_id)
    }

    async fn vote(
        &self,
        election: ElectionOrdinal,
        voter: &str,
        proposal: ProposalIndex,
    ) -> Result<TxId, LedgerError> {
        let body = VoteRequest {
            voter,
            proposal_index: proposal,
        };
        let response: TxResponse = self
            .send(
                self.client
                    .post(self.url(&format!("/elections/{}/votes", election)))
                    .json(&body),
            )
            .await?;
        Ok(response.tx_id)
    }

    async fn time_left(&self, election: ElectionOrdinal) -> Result<u64, LedgerError> {
        let response: TimeLeftResponse = self
            .send(
                self.client
                    .get(self.url(&format!("/elections/{}/time-left", election))),
            )
            .await?;
        Ok(response.seconds)
    }

    async fn vote_counts(&self, election: ElectionOrdinal) -> Result<Vec<u64>, LedgerError> {
        let response: CountsResponse = self
            .send(
                self.client
                    .get(self.url(&format!("/elections/{}/counts", election))),
            )
            .await?;
        Ok(response.counts)
    }

    async fn winner(&self, election: ElectionOrdinal) -> Result<LedgerWinner, LedgerError> {
        let response: WinnerResponse = self
            .send(
                self.client
                    .get(self.url(&format!("/elections/{}/winner", election))),
            )
            .await?;
        Ok(LedgerWinner {
            proposal: response.proposal_index,
            name: response.name,
        })
    }

    async fn tx_status(&self, tx: &TxId) -> Result<TxStatus, LedgerError> {
        let response: TxStatusResponse = self
            .send(self.client.get(self.url(&format!("/txs/{}", tx))))
            .await?;
        Ok(response.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_reasons_are_decoded() {
        assert_eq!(
            parse_rejection(r#"{"reason": "already_voted"}"#),
            Rejection::AlreadyVoted
        );
        assert_eq!(
            parse_rejection(r#"{"reason": "election_closed", "detail": "deadline passed"}"#),
            Rejection::ElectionClosed
        );
        assert_eq!(parse_rejection(r#"{"reason": "no_right"}"#), Rejection::NoRight);
        assert_eq!(
            parse_rejection(r#"{"reason": "no_such_proposal"}"#),
            Rejection::NoSuchProposal
        );
    }

    #[test]
    fn unrecognized_rejections_carry_the_body() {
        assert_eq!(
            parse_rejection(r#"{"reason": "paused", "detail": "contract paused"}"#),
            Rejection::Other("contract paused".to_string())
        );
        assert_eq!(
            parse_rejection("execution reverted"),
            Rejection::Other("execution reverted".to_string())
        );
    }
}
