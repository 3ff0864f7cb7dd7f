//! Verification of identity tokens issued by the external identity service.

mod token;
mod user;

pub use token::{AuthToken, Claims, AUTH_TOKEN_COOKIE};
pub use user::{Admin, ApprovalStatus, Role, User, Voter};
