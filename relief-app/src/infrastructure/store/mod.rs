//! Persistence seam for stations, votes and user roles.
//!
//! Mutations that must be atomic go through a [`StoreTx`]: everything read
//! from it is locked against other transactions until it is committed or
//! dropped, and dropping without [`StoreTx::commit`] discards every staged
//! write.

mod memory;

pub use memory::MemoryStore;

use crate::domain::{MemberRole, Station, UserRecord, UserRole, VoteRecord};
use relief_errors::AppResult;

#[async_trait::async_trait]
pub trait StationStore: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    /// Starts an atomic read-modify-write unit.
    async fn begin(&self) -> AppResult<Self::Tx>;

    async fn insert_station(&self, station: &Station) -> AppResult<()>;

    async fn find_station(&self, id: &str) -> AppResult<Option<Station>>;

    async fn list_stations(&self) -> AppResult<Vec<Station>>;

    async fn find_vote(&self, user_id: &str, station_id: &str) -> AppResult<Option<VoteRecord>>;

    async fn votes_by_user(&self, user_id: &str) -> AppResult<Vec<VoteRecord>>;

    async fn find_user(&self, user_id: &str) -> AppResult<Option<UserRecord>>;

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserRecord>>;

    /// Returns the stored user, creating it with `initial_role` if missing.
    /// An existing record keeps its role; only the email is refreshed.
    async fn upsert_user(
        &self,
        user_id: &str,
        email: &str,
        initial_role: UserRole,
    ) -> AppResult<UserRecord>;

    /// Overwrites a user's role. Returns false when the user is unknown.
    async fn set_user_role(&self, user_id: &str, role: UserRole) -> AppResult<bool>;
}

#[async_trait::async_trait]
pub trait StoreTx: Send {
    async fn station_for_update(&mut self, id: &str) -> AppResult<Option<Station>>;

    /// Persists counters, verification and both member lists.
    async fn save_station(&mut self, station: &Station) -> AppResult<()>;

    /// Removes the station together with its member rows and votes.
    /// Returns false when no such station exists.
    async fn delete_station(&mut self, id: &str) -> AppResult<bool>;

    async fn vote_for_update(
        &mut self,
        user_id: &str,
        station_id: &str,
    ) -> AppResult<Option<VoteRecord>>;

    async fn put_vote(&mut self, vote: &VoteRecord) -> AppResult<()>;

    async fn delete_vote(&mut self, user_id: &str, station_id: &str) -> AppResult<()>;

    async fn user_role(&mut self, user_id: &str) -> AppResult<Option<UserRole>>;

    /// Sets the role, creating a bare record for users not seen before.
    async fn put_user_role(&mut self, user_id: &str, email: &str, role: UserRole)
        -> AppResult<()>;

    /// Ids of every station listing `email` under `role`.
    async fn stations_with_member(&mut self, email: &str, role: MemberRole)
        -> AppResult<Vec<String>>;

    async fn commit(self) -> AppResult<()>;
}
