mod role;
mod station;
mod user;
mod vote;

pub use role::{UnknownRole, UserRole};
pub use station::{
    MemberRole, NewStation, Station, StationMembers, StationUpdate, Verification, VerifiedBy,
};
pub use user::{Actor, UserRecord, VerifiedIdentity};
pub use vote::{LedgerEffect, VoteRecord, VoteRequest, VoteResult, VoteTransition, VoteType};
