use crate::domain::{Actor, UserRole, VerifiedIdentity};
use crate::infrastructure::store::StationStore;
use relief_errors::{AppError, AppResult};
use std::collections::HashSet;

/// Role lookups and the explicit (non-derived) role changes.
pub struct RoleManagement<S> {
    store: S,
    bootstrap_admins: HashSet<String>,
}

impl<S: StationStore> RoleManagement<S> {
    pub fn new(store: S, bootstrap_admins: impl IntoIterator<Item = String>) -> Self {
        Self {
            store,
            bootstrap_admins: bootstrap_admins.into_iter().collect(),
        }
    }

    /// Loads the caller's record, registering first-time users.
    pub async fn authenticate(&self, identity: VerifiedIdentity) -> AppResult<Actor> {
        let initial = if self.bootstrap_admins.contains(&identity.email) {
            UserRole::Admin
        } else {
            UserRole::Resident
        };
        let user = self
            .store
            .upsert_user(&identity.uid, &identity.email, initial)
            .await?;
        Ok(Actor::from(user))
    }

    pub async fn role_of(&self, actor: &Actor, user_id: &str) -> AppResult<UserRole> {
        if actor.uid != user_id && !actor.is_admin() {
            return Err(AppError::Forbidden("cannot read another user's role".to_string()));
        }
        self.store
            .find_user(user_id)
            .await?
            .map(|u| u.role)
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
    }

    pub async fn set_role(&self, actor: &Actor, user_id: &str, role: UserRole) -> AppResult<()> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden("only admins can set roles".to_string()));
        }
        if !self.store.set_user_role(user_id, role).await? {
            return Err(AppError::NotFound(format!("user {user_id}")));
        }
        tracing::info!(admin = %actor.email, user_id, %role, "Role set by admin");
        Ok(())
    }

    pub async fn self_update(&self, actor: &Actor, role: UserRole) -> AppResult<UserRole> {
        if !UserRole::SELF_ASSIGNABLE.contains(&role) {
            return Err(AppError::Validation(format!(
                "{role} cannot be self-assigned"
            )));
        }
        if actor.is_admin() {
            return Err(AppError::Forbidden(
                "admins cannot change their own role".to_string(),
            ));
        }
        if !self.store.set_user_role(&actor.uid, role).await? {
            return Err(AppError::NotFound(format!("user {}", actor.uid)));
        }
        tracing::info!(uid = %actor.uid, from = %actor.role, to = %role, "Role self-updated");
        Ok(role)
    }
}
