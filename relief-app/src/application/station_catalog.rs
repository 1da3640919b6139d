use super::{ensure_can_manage, ensure_manager_role};
use crate::domain::{Actor, NewStation, Station, StationMembers, StationUpdate, VoteType};
use crate::infrastructure::security::InputValidator;
use crate::infrastructure::store::{StationStore, StoreTx};
use relief_errors::{AppError, AppResult};
use std::collections::BTreeMap;

/// Station lifecycle and reads, plus a user's own vote history.
pub struct StationCatalog<S> {
    store: S,
}

impl<S: StationStore> StationCatalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn create(&self, actor: &Actor, input: NewStation) -> AppResult<Station> {
        ensure_manager_role(actor)?;
        let name = InputValidator::validate_station_name(&input.name)?;
        let address = input.address.as_deref().and_then(clean_address);

        let station = Station::new(name, address, chrono::Utc::now());
        self.store.insert_station(&station).await?;
        tracing::info!(station_id = %station.id, creator = %actor.email, "Station created");
        Ok(station)
    }

    /// Edits name and address. Fails with `Conflict` when the station changed
    /// after the editor read it.
    pub async fn update(
        &self,
        actor: &Actor,
        id: &str,
        changes: StationUpdate,
    ) -> AppResult<Station> {
        let name = changes
            .name
            .as_deref()
            .map(InputValidator::validate_station_name)
            .transpose()?;

        let mut tx = self.store.begin().await?;
        let mut station = tx
            .station_for_update(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("station {id}")))?;
        ensure_can_manage(actor, &station)?;

        if station.last_updated != changes.last_updated {
            return Err(AppError::Conflict(format!(
                "station {id} has been updated by someone else"
            )));
        }

        if let Some(name) = name {
            station.name = name;
        }
        if let Some(address) = changes.address.as_deref() {
            station.address = clean_address(address);
        }
        station.touch(chrono::Utc::now());
        tx.save_station(&station).await?;
        tx.commit().await?;

        tracing::info!(station_id = id, editor = %actor.email, "Station updated");
        Ok(station)
    }

    /// Deletes the station with its members and votes. Members keep their
    /// global roles.
    pub async fn delete(&self, actor: &Actor, id: &str) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let station = tx
            .station_for_update(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("station {id}")))?;
        ensure_can_manage(actor, &station)?;

        tx.delete_station(id).await?;
        tx.commit().await?;

        tracing::info!(station_id = id, actor = %actor.email, "Station deleted");
        Ok(())
    }

    pub async fn list(&self) -> AppResult<Vec<Station>> {
        self.store.list_stations().await
    }

    pub async fn get(&self, id: &str) -> AppResult<Station> {
        self.store
            .find_station(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("station {id}")))
    }

    pub async fn members(&self, id: &str) -> AppResult<StationMembers> {
        self.get(id).await.map(|s| StationMembers::from(&s))
    }

    /// A user may only read their own votes.
    pub async fn vote_of(
        &self,
        actor: &Actor,
        user_id: &str,
        station_id: &str,
    ) -> AppResult<Option<VoteType>> {
        ensure_self(actor, user_id)?;
        Ok(self
            .store
            .find_vote(user_id, station_id)
            .await?
            .map(|v| v.vote_type))
    }

    pub async fn votes_of(
        &self,
        actor: &Actor,
        user_id: &str,
    ) -> AppResult<BTreeMap<String, VoteType>> {
        ensure_self(actor, user_id)?;
        Ok(self
            .store
            .votes_by_user(user_id)
            .await?
            .into_iter()
            .map(|v| (v.station_id, v.vote_type))
            .collect())
    }
}

fn clean_address(address: &str) -> Option<String> {
    let address = address.trim();
    (!address.is_empty()).then(|| address.to_string())
}

fn ensure_self(actor: &Actor, user_id: &str) -> AppResult<()> {
    if actor.uid != user_id {
        return Err(AppError::Forbidden("can only read your own votes".to_string()));
    }
    Ok(())
}
