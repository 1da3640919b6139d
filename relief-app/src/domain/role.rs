use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Global access level of a user.
///
/// Promotion ladder is `RESIDENT < VOLUNTEER < STATION_MANAGER < ADMIN`.
/// `GUEST` sits below the ladder and `DRIVER` shares the volunteer rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Guest,
    Resident,
    Volunteer,
    Driver,
    StationManager,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 6] = [
        UserRole::Guest,
        UserRole::Resident,
        UserRole::Volunteer,
        UserRole::Driver,
        UserRole::StationManager,
        UserRole::Admin,
    ];

    /// Roles a user may pick for themselves without an admin.
    pub const SELF_ASSIGNABLE: [UserRole; 3] =
        [UserRole::Resident, UserRole::Volunteer, UserRole::Driver];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "GUEST",
            Self::Resident => "RESIDENT",
            Self::Volunteer => "VOLUNTEER",
            Self::Driver => "DRIVER",
            Self::StationManager => "STATION_MANAGER",
            Self::Admin => "ADMIN",
        }
    }

    /// Position on the promotion ladder. Siblings share a rank.
    pub fn rank(self) -> u8 {
        match self {
            Self::Guest => 0,
            Self::Resident => 1,
            Self::Volunteer | Self::Driver => 2,
            Self::StationManager => 3,
            Self::Admin => 4,
        }
    }

    pub fn ranks_below(self, other: UserRole) -> bool {
        self.rank() < other.rank()
    }

    /// Magnitude of the counter delta a vote by this role produces.
    pub fn vote_weight(self) -> u64 {
        match self {
            Self::Admin => 100,
            Self::StationManager => 10,
            Self::Guest | Self::Resident | Self::Volunteer | Self::Driver => 1,
        }
    }

    /// Whether an upvote by this role stamps the station as verified.
    pub fn can_verify(self) -> bool {
        matches!(self, Self::StationManager | Self::Admin)
    }

    /// Role after being granted ownership of a station, if it changes.
    pub fn promoted_for_ownership(self) -> Option<UserRole> {
        self.ranks_below(Self::StationManager)
            .then_some(Self::StationManager)
    }

    /// Role after losing ownership of a station, if it changes.
    ///
    /// Admins are never touched. Demotion is a single step from manager to
    /// volunteer and only once no other station still lists the user.
    pub fn demoted_after_ownership_loss(self, manages_elsewhere: bool) -> Option<UserRole> {
        match self {
            Self::StationManager if !manages_elsewhere => Some(Self::Volunteer),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}
