use serde::{Deserialize, Serialize};

/// Roles assigned by the identity service. The backend consumes these as
/// given facts and never computes them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Registration approval state, also owned by the identity service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A marker type describing which identities a guard admits.
pub trait User: Send + Sync {
    /// Does an identity with this role pass the guard?
    fn permits(role: Role) -> bool;
}

/// Admin-only endpoints.
pub struct Admin;

impl User for Admin {
    fn permits(role: Role) -> bool {
        role == Role::Admin
    }
}

/// Voter endpoints: any approved identity may hold voting rights,
/// admins included.
pub struct Voter;

impl User for Voter {
    fn permits(_role: Role) -> bool {
        true
    }
}
