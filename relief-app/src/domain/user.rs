use super::UserRole;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl UserRecord {
    pub fn new(id: String, email: String, role: UserRole) -> Self {
        Self {
            id,
            email,
            role,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Identity proven by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: String,
}

/// Authenticated caller together with their stored role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub uid: String,
    pub email: String,
    pub role: UserRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<UserRecord> for Actor {
    fn from(user: UserRecord) -> Self {
        Self {
            uid: user.id,
            email: user.email,
            role: user.role,
        }
    }
}
