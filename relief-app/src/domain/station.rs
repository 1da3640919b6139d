use super::UserRole;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerifiedBy {
    Admin,
    Official,
}

impl VerifiedBy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Official => "OFFICIAL",
        }
    }
}

impl FromStr for VerifiedBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "OFFICIAL" => Ok(Self::Official),
            other => Err(format!("unknown verifier: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub is_verified: bool,
    pub verified_by: VerifiedBy,
    pub verified_at: DateTime<Utc>,
}

/// Relationship a member email has to a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Volunteer,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Volunteer => "volunteer",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "volunteer" => Ok(Self::Volunteer),
            other => Err(format!("unknown member role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub upvotes: u64,
    pub downvotes: u64,
    pub verification: Option<Verification>,
    pub last_verified: Option<DateTime<Utc>>,
    pub managers: Vec<String>,
    pub volunteers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Station {
    pub fn new(name: String, address: Option<String>, now: DateTime<Utc>) -> Self {
        let now = now.trunc_subsecs(3);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            address,
            upvotes: 0,
            downvotes: 0,
            verification: None,
            last_verified: None,
            managers: Vec::new(),
            volunteers: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Bumps `last_updated`. Kept at millisecond precision so the value a
    /// client echoes back compares equal after a database round trip.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = now.trunc_subsecs(3);
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_managers(mut self, managers: Vec<String>) -> Self {
        self.managers = managers;
        self
    }

    pub fn with_volunteers(mut self, volunteers: Vec<String>) -> Self {
        self.volunteers = volunteers;
        self
    }

    /// Applies signed deltas, clamping each counter at zero.
    pub fn apply_vote_deltas(&mut self, upvote_delta: i64, downvote_delta: i64) {
        self.upvotes = self.upvotes.saturating_add_signed(upvote_delta);
        self.downvotes = self.downvotes.saturating_add_signed(downvote_delta);
    }

    /// Marks the station verified by `role`. No-op for roles that cannot verify.
    pub fn stamp_verification(&mut self, role: UserRole, now: DateTime<Utc>) -> bool {
        if !role.can_verify() {
            return false;
        }
        let verified_by = if role == UserRole::Admin {
            VerifiedBy::Admin
        } else {
            VerifiedBy::Official
        };
        self.verification = Some(Verification {
            is_verified: true,
            verified_by,
            verified_at: now,
        });
        self.last_verified = Some(now);
        true
    }

    pub fn is_verified(&self) -> bool {
        self.verification.as_ref().is_some_and(|v| v.is_verified)
    }

    pub fn members(&self, role: MemberRole) -> &[String] {
        match role {
            MemberRole::Owner => &self.managers,
            MemberRole::Volunteer => &self.volunteers,
        }
    }

    fn members_mut(&mut self, role: MemberRole) -> &mut Vec<String> {
        match role {
            MemberRole::Owner => &mut self.managers,
            MemberRole::Volunteer => &mut self.volunteers,
        }
    }

    pub fn is_manager(&self, email: &str) -> bool {
        self.managers.iter().any(|m| m == email)
    }

    /// Set-union insert. Returns false when the email was already listed.
    pub fn add_member(&mut self, role: MemberRole, email: &str) -> bool {
        let list = self.members_mut(role);
        if list.iter().any(|m| m == email) {
            return false;
        }
        list.push(email.to_string());
        true
    }

    /// Removes every occurrence of the email. Returns false when absent.
    pub fn remove_member(&mut self, role: MemberRole, email: &str) -> bool {
        let list = self.members_mut(role);
        let before = list.len();
        list.retain(|m| m != email);
        list.len() != before
    }
}

/// Input for creating a station.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStation {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// Member lists in the shape the station-users endpoint returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationMembers {
    pub owner_ids: Vec<String>,
    pub volunteer_ids: Vec<String>,
}

impl From<&Station> for StationMembers {
    fn from(station: &Station) -> Self {
        Self {
            owner_ids: station.managers.clone(),
            volunteer_ids: station.volunteers.clone(),
        }
    }
}

/// Edit of a station's details. `last_updated` is the value the editor
/// last saw; a mismatch means someone else changed the station meanwhile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub last_updated: DateTime<Utc>,
}
