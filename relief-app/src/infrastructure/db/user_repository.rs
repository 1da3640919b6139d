use super::db_err;
use super::entities::{user, User};
use crate::domain::{UserRecord, UserRole};
use relief_errors::{AppError, AppResult};
use sea_orm::{entity::*, query::*, ConnectionTrait};

pub struct UserRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> UserRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<UserRecord>> {
        User::find_by_id(id.to_string())
            .one(self.db)
            .await
            .map_err(db_err)?
            .map(to_domain)
            .transpose()
    }

    pub async fn find_for_update(&self, id: &str) -> AppResult<Option<UserRecord>> {
        User::find_by_id(id.to_string())
            .lock_exclusive()
            .one(self.db)
            .await
            .map_err(db_err)?
            .map(to_domain)
            .transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        User::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db)
            .await
            .map_err(db_err)?
            .map(to_domain)
            .transpose()
    }

    pub async fn upsert(&self, id: &str, email: &str, initial_role: UserRole) -> AppResult<UserRecord> {
        let existing = User::find_by_id(id.to_string())
            .one(self.db)
            .await
            .map_err(db_err)?;

        let model = if let Some(existing) = existing {
            if existing.email == email {
                existing
            } else {
                let mut active: user::ActiveModel = existing.into();
                active.email = Set(email.to_string());
                active.updated_at = Set(Some(chrono::Utc::now()));
                active.update(self.db).await.map_err(db_err)?
            }
        } else {
            let active = user::ActiveModel {
                id: Set(id.to_string()),
                email: Set(email.to_string()),
                role: Set(initial_role.as_str().to_string()),
                created_at: Set(Some(chrono::Utc::now())),
                updated_at: Set(Some(chrono::Utc::now())),
            };
            active.insert(self.db).await.map_err(db_err)?
        };
        to_domain(model)
    }

    /// Returns false when no user with this id exists.
    pub async fn update_role(&self, id: &str, role: UserRole) -> AppResult<bool> {
        let Some(existing) = User::find_by_id(id.to_string())
            .one(self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(false);
        };
        let mut active: user::ActiveModel = existing.into();
        active.role = Set(role.as_str().to_string());
        active.updated_at = Set(Some(chrono::Utc::now()));
        active.update(self.db).await.map_err(db_err)?;
        Ok(true)
    }

    pub async fn insert(&self, id: &str, email: &str, role: UserRole) -> AppResult<()> {
        let active = user::ActiveModel {
            id: Set(id.to_string()),
            email: Set(email.to_string()),
            role: Set(role.as_str().to_string()),
            created_at: Set(Some(chrono::Utc::now())),
            updated_at: Set(Some(chrono::Utc::now())),
        };
        active.insert(self.db).await.map_err(db_err)?;
        Ok(())
    }
}

fn to_domain(row: user::Model) -> AppResult<UserRecord> {
    let role = row
        .role
        .parse::<UserRole>()
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(UserRecord {
        id: row.id,
        email: row.email,
        role,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
