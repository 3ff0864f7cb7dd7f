use std::marker::PhantomData;

use jsonwebtoken::{errors::Error as JwtError, DecodingKey, TokenData, Validation};
use rocket::{
    http::Status,
    request::{self, FromRequest},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::model::common::VoterId;

use super::user::{ApprovalStatus, Role, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// The claims issued by the identity service. The backend only ever verifies
/// these; it never issues tokens or computes roles and approval itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The identity's opaque ID.
    pub sub: VoterId,
    pub role: Role,
    pub status: ApprovalStatus,
    /// The wallet address on file, needed for ledger writes on the
    /// identity's behalf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
}

/// A verified identity token admitted by the `U` marker's role rule.
pub struct AuthToken<U> {
    claims: Claims,
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// The identity's ID.
    pub fn id(&self) -> &VoterId {
        &self.claims.sub
    }

    /// The identity's wallet address, if one is on file.
    pub fn wallet(&self) -> Option<&str> {
        self.claims.wallet.as_deref()
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Verify a serialized JWT against the identity service's shared secret.
    /// Signature and expiry failures surface as errors; role and approval
    /// checks are left to the caller via [`AuthToken::admits`].
    pub fn from_jwt(token: &str, secret: &[u8]) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(secret),
            &Validation::default(),
        )
        .map(|data: TokenData<Claims>| Self {
            claims: data.claims,
            phantom: PhantomData,
        })
    }

    /// Is this identity approved at all?
    pub fn is_approved(&self) -> bool {
        self.claims.status == ApprovalStatus::Approved
    }

    /// Does this identity's role pass the `U` marker's rule?
    pub fn admits(&self) -> bool {
        U::permits(self.claims.role)
    }
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User,
{
    type Error = &'static str;

    /// Pull the identity token from the auth cookie or an
    /// `Authorization: Bearer` header and verify it.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        // Valid as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let raw = req
            .cookies()
            .get(AUTH_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .or_else(|| {
                req.headers()
                    .get_one("Authorization")
                    .and_then(|header| header.strip_prefix("Bearer "))
                    .map(str::to_string)
            });
        let raw = match raw {
            Some(raw) => raw,
            None => return request::Outcome::Forward(()),
        };

        let token = match Self::from_jwt(&raw, config.jwt_secret()) {
            Ok(token) => token,
            Err(_) => {
                return request::Outcome::Failure((Status::Unauthorized, "invalid token"));
            }
        };
        if !token.is_approved() {
            return request::Outcome::Failure((Status::Forbidden, "registration not approved"));
        }
        if token.admits() {
            request::Outcome::Success(token)
        } else {
            request::Outcome::Forward(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header};

    use crate::model::auth::{Admin, Voter};

    const SECRET: &[u8] = b"unit-test-secret";

    fn claims(role: Role, status: ApprovalStatus) -> Claims {
        Claims {
            sub: "voter-1".to_string(),
            role,
            status,
            wallet: Some("0xabc".to_string()),
            exp: (Utc::now().timestamp() + 3600) as u64,
        }
    }

    fn sign(claims: &Claims) -> String {
        jsonwebtoken::encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[test]
    fn admin_token_passes_admin_guard() {
        let jwt = sign(&claims(Role::Admin, ApprovalStatus::Approved));
        let token = AuthToken::<Admin>::from_jwt(&jwt, SECRET).unwrap();
        assert!(token.is_approved());
        assert!(token.admits());
    }

    #[test]
    fn user_token_fails_admin_guard_but_passes_voter_guard() {
        let jwt = sign(&claims(Role::User, ApprovalStatus::Approved));
        let as_admin = AuthToken::<Admin>::from_jwt(&jwt, SECRET).unwrap();
        assert!(!as_admin.admits());
        let as_voter = AuthToken::<Voter>::from_jwt(&jwt, SECRET).unwrap();
        assert!(as_voter.admits());
        assert_eq!(as_voter.id(), "voter-1");
        assert_eq!(as_voter.wallet(), Some("0xabc"));
    }

    #[test]
    fn unapproved_identity_is_detected() {
        let jwt = sign(&claims(Role::User, ApprovalStatus::Pending));
        let token = AuthToken::<Voter>::from_jwt(&jwt, SECRET).unwrap();
        assert!(!token.is_approved());
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut expired = claims(Role::User, ApprovalStatus::Approved);
        // Well past the default validation leeway.
        expired.exp = (Utc::now().timestamp() - 600) as u64;
        let jwt = sign(&expired);
        assert!(AuthToken::<Voter>::from_jwt(&jwt, SECRET).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let jwt = sign(&claims(Role::User, ApprovalStatus::Approved));
        assert!(AuthToken::<Voter>::from_jwt(&jwt, b"other-secret").is_err());
    }
}
