use super::UserRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            other => Err(format!("unknown vote type: {other}")),
        }
    }
}

/// One user's standing vote on one station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub user_id: String,
    pub station_id: String,
    pub vote_type: VoteType,
    /// Role at the time the vote was first cast; fixes the vote's weight.
    pub user_role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl VoteRecord {
    pub fn new(
        user_id: impl Into<String>,
        station_id: impl Into<String>,
        vote_type: VoteType,
        user_role: UserRole,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            station_id: station_id.into(),
            vote_type,
            user_role,
            created_at: now,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    Create(VoteType),
    Update(VoteType),
    Delete,
}

/// Counter deltas and ledger change produced by one vote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    pub upvote_delta: i64,
    pub downvote_delta: i64,
    pub effect: LedgerEffect,
}

impl VoteTransition {
    /// `previous` is the standing vote and the role it was cast with.
    /// A standing vote is moved or retracted with its own weight; a new vote
    /// uses `role`.
    pub fn compute(
        previous: Option<(VoteType, UserRole)>,
        requested: VoteType,
        role: UserRole,
    ) -> Self {
        let weight = |r: UserRole| r.vote_weight() as i64;

        match (previous, requested) {
            (None, VoteType::Up) => Self {
                upvote_delta: weight(role),
                downvote_delta: 0,
                effect: LedgerEffect::Create(VoteType::Up),
            },
            (None, VoteType::Down) => Self {
                upvote_delta: 0,
                downvote_delta: weight(role),
                effect: LedgerEffect::Create(VoteType::Down),
            },
            (Some((VoteType::Up, cast_as)), VoteType::Up) => Self {
                upvote_delta: -weight(cast_as),
                downvote_delta: 0,
                effect: LedgerEffect::Delete,
            },
            (Some((VoteType::Down, cast_as)), VoteType::Down) => Self {
                upvote_delta: 0,
                downvote_delta: -weight(cast_as),
                effect: LedgerEffect::Delete,
            },
            (Some((VoteType::Down, cast_as)), VoteType::Up) => Self {
                upvote_delta: weight(cast_as),
                downvote_delta: -weight(cast_as),
                effect: LedgerEffect::Update(VoteType::Up),
            },
            (Some((VoteType::Up, cast_as)), VoteType::Down) => Self {
                upvote_delta: -weight(cast_as),
                downvote_delta: weight(cast_as),
                effect: LedgerEffect::Update(VoteType::Down),
            },
        }
    }

    /// Vote direction left standing after the transition.
    pub fn resulting_vote(&self) -> Option<VoteType> {
        match self.effect {
            LedgerEffect::Create(vote) | LedgerEffect::Update(vote) => Some(vote),
            LedgerEffect::Delete => None,
        }
    }
}

/// Request to cast, flip or retract a vote on a station.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub user_id: String,
    pub vote_type: VoteType,
    pub user_role: UserRole,
}

/// Station tally after a vote was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    pub upvotes: u64,
    pub downvotes: u64,
    pub vote_type: Option<VoteType>,
    pub is_verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_votes_create_records() {
        let up = VoteTransition::compute(None, VoteType::Up, UserRole::StationManager);
        assert_eq!((up.upvote_delta, up.downvote_delta), (10, 0));
        assert_eq!(up.effect, LedgerEffect::Create(VoteType::Up));

        let down = VoteTransition::compute(None, VoteType::Down, UserRole::Resident);
        assert_eq!((down.upvote_delta, down.downvote_delta), (0, 1));
        assert_eq!(down.effect, LedgerEffect::Create(VoteType::Down));
    }

    #[test]
    fn test_repeat_vote_retracts() {
        let t = VoteTransition::compute(
            Some((VoteType::Up, UserRole::Admin)),
            VoteType::Up,
            UserRole::Admin,
        );
        assert_eq!((t.upvote_delta, t.downvote_delta), (-100, 0));
        assert_eq!(t.effect, LedgerEffect::Delete);
        assert_eq!(t.resulting_vote(), None);

        let t = VoteTransition::compute(
            Some((VoteType::Down, UserRole::Resident)),
            VoteType::Down,
            UserRole::Resident,
        );
        assert_eq!((t.upvote_delta, t.downvote_delta), (0, -1));
    }

    #[test]
    fn test_flip_moves_weight_between_counters() {
        let t = VoteTransition::compute(
            Some((VoteType::Up, UserRole::StationManager)),
            VoteType::Down,
            UserRole::StationManager,
        );
        assert_eq!((t.upvote_delta, t.downvote_delta), (-10, 10));
        assert_eq!(t.resulting_vote(), Some(VoteType::Down));

        let t = VoteTransition::compute(
            Some((VoteType::Down, UserRole::Resident)),
            VoteType::Up,
            UserRole::Resident,
        );
        assert_eq!((t.upvote_delta, t.downvote_delta), (1, -1));
        assert_eq!(t.effect, LedgerEffect::Update(VoteType::Up));
    }

    #[test]
    fn test_standing_vote_keeps_its_cast_weight() {
        // Voted as resident, later promoted: the retraction removes 1, not 100.
        let t = VoteTransition::compute(
            Some((VoteType::Up, UserRole::Resident)),
            VoteType::Up,
            UserRole::Admin,
        );
        assert_eq!(t.upvote_delta, -1);
    }

    #[test]
    fn test_vote_type_wire_format() {
        assert_eq!(serde_json::to_string(&VoteType::Up).unwrap(), "\"UP\"");
        assert_eq!("DOWN".parse::<VoteType>().unwrap(), VoteType::Down);
        assert!("SIDEWAYS".parse::<VoteType>().is_err());
    }
}
