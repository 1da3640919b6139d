use super::ensure_can_manage;
use crate::domain::{Actor, MemberRole, Station, UserRole};
use crate::infrastructure::auth::IdentityProvider;
use crate::infrastructure::store::{StationStore, StoreTx};
use relief_errors::{AppError, AppResult};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipChange {
    /// Whether the member list actually changed.
    pub changed: bool,
    /// Target's global role after the change, when it was rewritten.
    pub new_role: Option<UserRole>,
}

/// Adds and removes station owners/volunteers, keeping the target's global
/// role in step with their management responsibilities.
pub struct ManageMembers<S> {
    store: S,
    identity: Arc<dyn IdentityProvider>,
}

fn forbidden(msg: &str) -> AppError {
    AppError::Forbidden(msg.to_string())
}

fn station_not_found(station_id: &str) -> AppError {
    AppError::NotFound(format!("station {station_id}"))
}

fn ensure_can_add(actor: &Actor, station: &Station, role: MemberRole) -> AppResult<()> {
    ensure_can_manage(actor, station)?;
    if role == MemberRole::Owner && !actor.is_admin() {
        return Err(forbidden("station managers cannot add other managers"));
    }
    Ok(())
}

fn ensure_can_remove(
    actor: &Actor,
    station: &Station,
    email: &str,
    role: MemberRole,
) -> AppResult<()> {
    ensure_can_manage(actor, station)?;
    if role == MemberRole::Owner && !actor.is_admin() {
        if email != actor.email {
            return Err(forbidden("station managers cannot remove other managers"));
        }
        if station.managers.len() <= 1 {
            return Err(forbidden("cannot remove the last manager of a station"));
        }
    }
    Ok(())
}

impl<S: StationStore> ManageMembers<S> {
    pub fn new(store: S, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    async fn resolve(&self, email: &str) -> AppResult<String> {
        self.identity
            .resolve_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {email}")))
    }

    async fn current_station(&self, station_id: &str) -> AppResult<Station> {
        self.store
            .find_station(station_id)
            .await?
            .ok_or_else(|| station_not_found(station_id))
    }

    pub async fn add_member(
        &self,
        station_id: &str,
        actor: &Actor,
        email: &str,
        role: MemberRole,
    ) -> AppResult<MembershipChange> {
        // Permission is settled before the target is looked up, so callers
        // without it cannot tell registered emails from unknown ones.
        ensure_can_add(actor, &self.current_station(station_id).await?, role)?;
        let target_uid = self.resolve(email).await?;

        let mut tx = self.store.begin().await?;
        let mut station = tx
            .station_for_update(station_id)
            .await?
            .ok_or_else(|| station_not_found(station_id))?;
        ensure_can_add(actor, &station, role)?;

        let changed = station.add_member(role, email);
        if changed {
            station.touch(chrono::Utc::now());
            tx.save_station(&station).await?;
        }

        let mut new_role = None;
        if role == MemberRole::Owner {
            let current = tx.user_role(&target_uid).await?.unwrap_or(UserRole::Resident);
            if let Some(promoted) = current.promoted_for_ownership() {
                tx.put_user_role(&target_uid, email, promoted).await?;
                new_role = Some(promoted);
            }
        }

        tx.commit().await?;

        if let Some(role) = new_role {
            tracing::info!(station_id, target = %email, %role, "Promoted new station owner");
        }
        tracing::info!(station_id, actor = %actor.email, target = %email, %role, changed, "Member added");

        Ok(MembershipChange { changed, new_role })
    }

    pub async fn remove_member(
        &self,
        station_id: &str,
        actor: &Actor,
        email: &str,
        role: MemberRole,
    ) -> AppResult<MembershipChange> {
        ensure_can_remove(actor, &self.current_station(station_id).await?, email, role)?;
        let target_uid = self.resolve(email).await?;

        let mut tx = self.store.begin().await?;
        let mut station = tx
            .station_for_update(station_id)
            .await?
            .ok_or_else(|| station_not_found(station_id))?;
        // The member lists may have moved since the unlocked read.
        ensure_can_remove(actor, &station, email, role)?;

        let changed = station.remove_member(role, email);
        if changed {
            station.touch(chrono::Utc::now());
            tx.save_station(&station).await?;
        }

        let mut new_role = None;
        if role == MemberRole::Owner {
            if let Some(current) = tx.user_role(&target_uid).await? {
                // Admins are never demoted, so skip the membership scan.
                if current != UserRole::Admin {
                    let manages_elsewhere = tx
                        .stations_with_member(email, MemberRole::Owner)
                        .await?
                        .iter()
                        .any(|id| id != station_id);
                    if let Some(demoted) = current.demoted_after_ownership_loss(manages_elsewhere) {
                        tx.put_user_role(&target_uid, email, demoted).await?;
                        new_role = Some(demoted);
                    }
                }
            }
        }

        tx.commit().await?;

        if let Some(role) = new_role {
            tracing::info!(station_id, target = %email, %role, "Demoted former station owner");
        }
        tracing::info!(station_id, actor = %actor.email, target = %email, %role, changed, "Member removed");

        Ok(MembershipChange { changed, new_role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::auth::StaticIdentity;
    use crate::infrastructure::store::MemoryStore;
    use chrono::Utc;
    use relief_errors::ErrorKind;

    const ADMIN: &str = "admin@relief.org";
    const LEAD: &str = "lead@relief.org";
    const HELPER: &str = "helper@relief.org";

    fn identity() -> Arc<dyn IdentityProvider> {
        Arc::new(
            StaticIdentity::new()
                .with_user("t-admin", "uid-admin", ADMIN)
                .with_user("t-lead", "uid-lead", LEAD)
                .with_user("t-helper", "uid-helper", HELPER),
        )
    }

    fn admin() -> Actor {
        Actor {
            uid: "uid-admin".into(),
            email: ADMIN.into(),
            role: UserRole::Admin,
        }
    }

    fn lead() -> Actor {
        Actor {
            uid: "uid-lead".into(),
            email: LEAD.into(),
            role: UserRole::StationManager,
        }
    }

    async fn setup() -> (MemoryStore, ManageMembers<MemoryStore>) {
        let store = MemoryStore::new();
        for (id, managers) in [("a", vec![LEAD.to_string()]), ("b", vec![])] {
            let station = Station::new(format!("Station {id}"), None, Utc::now())
                .with_id(id)
                .with_managers(managers);
            store.insert_station(&station).await.unwrap();
        }
        store.upsert_user("uid-admin", ADMIN, UserRole::Admin).await.unwrap();
        store
            .upsert_user("uid-lead", LEAD, UserRole::StationManager)
            .await
            .unwrap();
        store
            .upsert_user("uid-helper", HELPER, UserRole::Resident)
            .await
            .unwrap();
        (store.clone(), ManageMembers::new(store, identity()))
    }

    async fn role_of(store: &MemoryStore, uid: &str) -> UserRole {
        store.find_user(uid).await.unwrap().unwrap().role
    }

    #[tokio::test]
    async fn test_admin_adds_owner_and_promotes() {
        let (store, members) = setup().await;
        let change = members
            .add_member("a", &admin(), HELPER, MemberRole::Owner)
            .await
            .unwrap();
        assert!(change.changed);
        assert_eq!(change.new_role, Some(UserRole::StationManager));
        assert_eq!(role_of(&store, "uid-helper").await, UserRole::StationManager);

        let station = store.find_station("a").await.unwrap().unwrap();
        assert_eq!(station.managers, vec![LEAD.to_string(), HELPER.to_string()]);
    }

    #[tokio::test]
    async fn test_adding_admin_as_owner_keeps_admin() {
        let (store, members) = setup().await;
        let change = members
            .add_member("b", &admin(), ADMIN, MemberRole::Owner)
            .await
            .unwrap();
        assert_eq!(change.new_role, None);
        assert_eq!(role_of(&store, "uid-admin").await, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let (store, members) = setup().await;
        members
            .add_member("a", &lead(), HELPER, MemberRole::Volunteer)
            .await
            .unwrap();
        let change = members
            .add_member("a", &lead(), HELPER, MemberRole::Volunteer)
            .await
            .unwrap();
        assert!(!change.changed);
        let station = store.find_station("a").await.unwrap().unwrap();
        assert_eq!(station.volunteers, vec![HELPER.to_string()]);
        // Volunteer membership leaves the global role alone.
        assert_eq!(role_of(&store, "uid-helper").await, UserRole::Resident);
    }

    #[tokio::test]
    async fn test_manager_cannot_add_owner() {
        let (store, members) = setup().await;
        let err = members
            .add_member("a", &lead(), HELPER, MemberRole::Owner)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(store.find_station("a").await.unwrap().unwrap().managers.len(), 1);
        assert_eq!(role_of(&store, "uid-helper").await, UserRole::Resident);
    }

    #[tokio::test]
    async fn test_manager_of_other_station_is_forbidden() {
        let (_, members) = setup().await;
        let err = members
            .add_member("b", &lead(), HELPER, MemberRole::Volunteer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_volunteer_actor_is_forbidden() {
        let (_, members) = setup().await;
        let actor = Actor {
            uid: "uid-helper".into(),
            email: HELPER.into(),
            role: UserRole::Volunteer,
        };
        let err = members
            .add_member("a", &actor, LEAD, MemberRole::Volunteer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_unknown_user_and_station_are_not_found() {
        let (_, members) = setup().await;
        let err = members
            .add_member("a", &admin(), "ghost@relief.org", MemberRole::Volunteer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = members
            .remove_member("zzz", &admin(), HELPER, MemberRole::Volunteer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_unauthorized_caller_cannot_learn_which_emails_exist() {
        let (store, members) = setup().await;
        let resident = Actor {
            uid: "uid-helper".into(),
            email: HELPER.into(),
            role: UserRole::Resident,
        };

        for email in [LEAD, "ghost@relief.org"] {
            let err = members
                .add_member("a", &resident, email, MemberRole::Volunteer)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden, "add {email}");

            let err = members
                .remove_member("a", &resident, email, MemberRole::Owner)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden, "remove {email}");
        }

        // A manager of a different station gets the same answer.
        for email in [HELPER, "ghost@relief.org"] {
            let err = members
                .add_member("b", &lead(), email, MemberRole::Volunteer)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden, "add {email}");
        }

        let station = store.find_station("a").await.unwrap().unwrap();
        assert_eq!(station.managers, vec![LEAD.to_string()]);
        assert!(station.volunteers.is_empty());
    }

    #[tokio::test]
    async fn test_manager_owner_checks_precede_email_lookup() {
        let (_, members) = setup().await;
        let err = members
            .add_member("a", &lead(), "ghost@relief.org", MemberRole::Owner)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = members
            .remove_member("a", &lead(), "ghost@relief.org", MemberRole::Owner)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_removal_demotes_single_station_manager() {
        let (store, members) = setup().await;
        let change = members
            .remove_member("a", &admin(), LEAD, MemberRole::Owner)
            .await
            .unwrap();
        assert_eq!(change.new_role, Some(UserRole::Volunteer));
        assert_eq!(role_of(&store, "uid-lead").await, UserRole::Volunteer);
        assert!(store.find_station("a").await.unwrap().unwrap().managers.is_empty());
    }

    #[tokio::test]
    async fn test_multi_station_manager_keeps_role() {
        let (store, members) = setup().await;
        members
            .add_member("b", &admin(), LEAD, MemberRole::Owner)
            .await
            .unwrap();
        let change = members
            .remove_member("a", &admin(), LEAD, MemberRole::Owner)
            .await
            .unwrap();
        assert_eq!(change.new_role, None);
        assert_eq!(role_of(&store, "uid-lead").await, UserRole::StationManager);
    }

    #[tokio::test]
    async fn test_admin_never_demoted() {
        let (store, members) = setup().await;
        members
            .add_member("a", &admin(), ADMIN, MemberRole::Owner)
            .await
            .unwrap();
        members
            .remove_member("a", &admin(), ADMIN, MemberRole::Owner)
            .await
            .unwrap();
        assert_eq!(role_of(&store, "uid-admin").await, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_last_manager_cannot_remove_self() {
        let (store, members) = setup().await;
        let err = members
            .remove_member("a", &lead(), LEAD, MemberRole::Owner)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let station = store.find_station("a").await.unwrap().unwrap();
        assert_eq!(station.managers, vec![LEAD.to_string()]);
        assert_eq!(role_of(&store, "uid-lead").await, UserRole::StationManager);
    }

    #[tokio::test]
    async fn test_manager_may_step_down_when_not_last() {
        let (store, members) = setup().await;
        members
            .add_member("a", &admin(), HELPER, MemberRole::Owner)
            .await
            .unwrap();
        let change = members
            .remove_member("a", &lead(), LEAD, MemberRole::Owner)
            .await
            .unwrap();
        assert!(change.changed);
        assert_eq!(role_of(&store, "uid-lead").await, UserRole::Volunteer);
    }

    #[tokio::test]
    async fn test_manager_cannot_remove_other_owner() {
        let (_, members) = setup().await;
        members
            .add_member("a", &admin(), HELPER, MemberRole::Owner)
            .await
            .unwrap();
        let err = members
            .remove_member("a", &lead(), HELPER, MemberRole::Owner)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_manager_removes_volunteer() {
        let (store, members) = setup().await;
        members
            .add_member("a", &lead(), HELPER, MemberRole::Volunteer)
            .await
            .unwrap();
        let change = members
            .remove_member("a", &lead(), HELPER, MemberRole::Volunteer)
            .await
            .unwrap();
        assert!(change.changed);
        assert!(store.find_station("a").await.unwrap().unwrap().volunteers.is_empty());
    }
}
