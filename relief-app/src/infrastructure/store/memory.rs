use super::{StationStore, StoreTx};
use crate::domain::{MemberRole, Station, UserRecord, UserRole, VoteRecord};
use relief_errors::AppResult;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type VoteKey = (String, String);

#[derive(Debug, Default)]
struct MemoryState {
    stations: HashMap<String, Station>,
    votes: HashMap<VoteKey, VoteRecord>,
    users: HashMap<String, UserRecord>,
}

/// Process-local store. A transaction holds the only lock on the state,
/// so transactions are fully serialized.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Writes go straight into the locked state; each one records the row it
/// replaced so an uncommitted transaction can be rolled back on drop.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    undo: Vec<Undo>,
}

enum Undo {
    Station(String, Option<Station>),
    Vote(VoteKey, Option<VoteRecord>),
    User(String, Option<UserRecord>),
}

fn restore<K: Eq + Hash, V>(rows: &mut HashMap<K, V>, key: K, previous: Option<V>) {
    match previous {
        Some(row) => {
            rows.insert(key, row);
        }
        None => {
            rows.remove(&key);
        }
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        let state = &mut *self.guard;
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Station(id, previous) => restore(&mut state.stations, id, previous),
                Undo::Vote(key, previous) => restore(&mut state.votes, key, previous),
                Undo::User(id, previous) => restore(&mut state.users, id, previous),
            }
        }
    }
}

fn vote_key(user_id: &str, station_id: &str) -> VoteKey {
    (user_id.to_string(), station_id.to_string())
}

#[async_trait::async_trait]
impl StationStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        Ok(MemoryTx {
            guard,
            undo: Vec::new(),
        })
    }

    async fn insert_station(&self, station: &Station) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.stations.insert(station.id.clone(), station.clone());
        Ok(())
    }

    async fn find_station(&self, id: &str) -> AppResult<Option<Station>> {
        Ok(self.state.lock().await.stations.get(id).cloned())
    }

    async fn list_stations(&self) -> AppResult<Vec<Station>> {
        let state = self.state.lock().await;
        let mut stations: Vec<Station> = state.stations.values().cloned().collect();
        stations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(stations)
    }

    async fn find_vote(&self, user_id: &str, station_id: &str) -> AppResult<Option<VoteRecord>> {
        let state = self.state.lock().await;
        Ok(state.votes.get(&vote_key(user_id, station_id)).cloned())
    }

    async fn votes_by_user(&self, user_id: &str) -> AppResult<Vec<VoteRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .values()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_user(&self, user_id: &str) -> AppResult<Option<UserRecord>> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn upsert_user(
        &self,
        user_id: &str,
        email: &str,
        initial_role: UserRole,
    ) -> AppResult<UserRecord> {
        let mut state = self.state.lock().await;
        let now = chrono::Utc::now();
        let user = state
            .users
            .entry(user_id.to_string())
            .and_modify(|u| {
                if u.email != email {
                    u.email = email.to_string();
                    u.updated_at = Some(now);
                }
            })
            .or_insert_with(|| UserRecord {
                created_at: Some(now),
                updated_at: Some(now),
                ..UserRecord::new(user_id.to_string(), email.to_string(), initial_role)
            });
        Ok(user.clone())
    }

    async fn set_user_role(&self, user_id: &str, role: UserRole) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.users.get_mut(user_id) {
            Some(user) => {
                user.role = role;
                user.updated_at = Some(chrono::Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait::async_trait]
impl StoreTx for MemoryTx {
    async fn station_for_update(&mut self, id: &str) -> AppResult<Option<Station>> {
        Ok(self.guard.stations.get(id).cloned())
    }

    async fn save_station(&mut self, station: &Station) -> AppResult<()> {
        let previous = self
            .guard
            .stations
            .insert(station.id.clone(), station.clone());
        self.undo.push(Undo::Station(station.id.clone(), previous));
        Ok(())
    }

    async fn delete_station(&mut self, id: &str) -> AppResult<bool> {
        let Some(previous) = self.guard.stations.remove(id) else {
            return Ok(false);
        };
        self.undo.push(Undo::Station(id.to_string(), Some(previous)));

        let keys: Vec<VoteKey> = self
            .guard
            .votes
            .keys()
            .filter(|(_, station_id)| station_id == id)
            .cloned()
            .collect();
        for key in keys {
            let previous = self.guard.votes.remove(&key);
            self.undo.push(Undo::Vote(key, previous));
        }
        Ok(true)
    }

    async fn vote_for_update(
        &mut self,
        user_id: &str,
        station_id: &str,
    ) -> AppResult<Option<VoteRecord>> {
        Ok(self.guard.votes.get(&vote_key(user_id, station_id)).cloned())
    }

    async fn put_vote(&mut self, vote: &VoteRecord) -> AppResult<()> {
        let key = vote_key(&vote.user_id, &vote.station_id);
        let previous = self.guard.votes.insert(key.clone(), vote.clone());
        self.undo.push(Undo::Vote(key, previous));
        Ok(())
    }

    async fn delete_vote(&mut self, user_id: &str, station_id: &str) -> AppResult<()> {
        let key = vote_key(user_id, station_id);
        if let Some(previous) = self.guard.votes.remove(&key) {
            self.undo.push(Undo::Vote(key, Some(previous)));
        }
        Ok(())
    }

    async fn user_role(&mut self, user_id: &str) -> AppResult<Option<UserRole>> {
        Ok(self.guard.users.get(user_id).map(|u| u.role))
    }

    async fn put_user_role(
        &mut self,
        user_id: &str,
        email: &str,
        role: UserRole,
    ) -> AppResult<()> {
        let now = chrono::Utc::now();
        let previous = self.guard.users.get(user_id).cloned();
        let updated = match &previous {
            Some(user) => UserRecord {
                role,
                updated_at: Some(now),
                ..user.clone()
            },
            None => UserRecord {
                created_at: Some(now),
                updated_at: Some(now),
                ..UserRecord::new(user_id.to_string(), email.to_string(), role)
            },
        };
        self.guard.users.insert(user_id.to_string(), updated);
        self.undo.push(Undo::User(user_id.to_string(), previous));
        Ok(())
    }

    async fn stations_with_member(
        &mut self,
        email: &str,
        role: MemberRole,
    ) -> AppResult<Vec<String>> {
        Ok(self
            .guard
            .stations
            .values()
            .filter(|s| s.members(role).iter().any(|m| m == email))
            .map(|s| s.id.clone())
            .collect())
    }

    async fn commit(mut self) -> AppResult<()> {
        self.undo.clear();
        Ok(())
    }
}
