pub mod station;
pub mod station_member;
pub mod user;
pub mod vote;

pub use station::Entity as Station;
pub use station_member::Entity as StationMember;
pub use user::Entity as User;
pub use vote::Entity as Vote;
