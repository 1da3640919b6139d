pub mod entities;
mod station_repository;
mod user_repository;
mod vote_repository;

pub use station_repository::StationRepository;
pub use user_repository::UserRepository;
pub use vote_repository::VoteRepository;

use crate::domain::{MemberRole, Station, UserRecord, UserRole, VoteRecord};
use crate::infrastructure::store::{StationStore, StoreTx};
use relief_errors::{AppError, AppResult};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbErr,
    Statement, TransactionTrait,
};
use std::time::Duration;

pub(crate) fn db_err(err: DbErr) -> AppError {
    AppError::Database(err.to_string())
}

pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    Database::connect(opt).await
}

pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    let migration = include_str!("../../../../migrations/001_initial.sql");

    for statement in migration.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        db.execute(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            statement.to_string(),
        ))
        .await?;
    }

    tracing::info!("Database migrations applied");
    Ok(())
}

/// PostgreSQL-backed store. Transactional reads take row locks
/// (`SELECT ... FOR UPDATE`) so conflicting votes and membership changes
/// queue behind each other.
#[derive(Clone)]
pub struct SeaOrmStore {
    db: std::sync::Arc<DatabaseConnection>,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db: std::sync::Arc::new(db) }
    }
}

pub struct SeaOrmTx {
    txn: DatabaseTransaction,
}

#[async_trait::async_trait]
impl StationStore for SeaOrmStore {
    type Tx = SeaOrmTx;

    async fn begin(&self) -> AppResult<SeaOrmTx> {
        let txn = self.db.begin().await.map_err(db_err)?;
        Ok(SeaOrmTx { txn })
    }

    async fn insert_station(&self, station: &Station) -> AppResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;
        StationRepository::new(&txn).insert(station).await?;
        txn.commit().await.map_err(db_err)
    }

    async fn find_station(&self, id: &str) -> AppResult<Option<Station>> {
        StationRepository::new(&*self.db).find_by_id(id).await
    }

    async fn list_stations(&self) -> AppResult<Vec<Station>> {
        StationRepository::new(&*self.db).list().await
    }

    async fn find_vote(&self, user_id: &str, station_id: &str) -> AppResult<Option<VoteRecord>> {
        VoteRepository::new(&*self.db).find(user_id, station_id).await
    }

    async fn votes_by_user(&self, user_id: &str) -> AppResult<Vec<VoteRecord>> {
        VoteRepository::new(&*self.db).by_user(user_id).await
    }

    async fn find_user(&self, user_id: &str) -> AppResult<Option<UserRecord>> {
        UserRepository::new(&*self.db).find_by_id(user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        UserRepository::new(&*self.db).find_by_email(email).await
    }

    async fn upsert_user(
        &self,
        user_id: &str,
        email: &str,
        initial_role: UserRole,
    ) -> AppResult<UserRecord> {
        UserRepository::new(&*self.db)
            .upsert(user_id, email, initial_role)
            .await
    }

    async fn set_user_role(&self, user_id: &str, role: UserRole) -> AppResult<bool> {
        UserRepository::new(&*self.db).update_role(user_id, role).await
    }
}

#[async_trait::async_trait]
impl StoreTx for SeaOrmTx {
    async fn station_for_update(&mut self, id: &str) -> AppResult<Option<Station>> {
        StationRepository::new(&self.txn).find_for_update(id).await
    }

    async fn save_station(&mut self, station: &Station) -> AppResult<()> {
        StationRepository::new(&self.txn).save(station).await
    }

    async fn delete_station(&mut self, id: &str) -> AppResult<bool> {
        StationRepository::new(&self.txn).delete(id).await
    }

    async fn vote_for_update(
        &mut self,
        user_id: &str,
        station_id: &str,
    ) -> AppResult<Option<VoteRecord>> {
        VoteRepository::new(&self.txn)
            .find_for_update(user_id, station_id)
            .await
    }

    async fn put_vote(&mut self, vote: &VoteRecord) -> AppResult<()> {
        VoteRepository::new(&self.txn).upsert(vote).await
    }

    async fn delete_vote(&mut self, user_id: &str, station_id: &str) -> AppResult<()> {
        VoteRepository::new(&self.txn).delete(user_id, station_id).await
    }

    async fn user_role(&mut self, user_id: &str) -> AppResult<Option<UserRole>> {
        Ok(UserRepository::new(&self.txn)
            .find_for_update(user_id)
            .await?
            .map(|u| u.role))
    }

    async fn put_user_role(
        &mut self,
        user_id: &str,
        email: &str,
        role: UserRole,
    ) -> AppResult<()> {
        let users = UserRepository::new(&self.txn);
        if !users.update_role(user_id, role).await? {
            users.insert(user_id, email, role).await?;
        }
        Ok(())
    }

    async fn stations_with_member(
        &mut self,
        email: &str,
        role: MemberRole,
    ) -> AppResult<Vec<String>> {
        StationRepository::new(&self.txn)
            .station_ids_with_member(email, role)
            .await
    }

    async fn commit(self) -> AppResult<()> {
        self.txn.commit().await.map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn user_row(role: &str) -> entities::user::Model {
        entities::user::Model {
            id: "u1".to_string(),
            email: "a@relief.org".to_string(),
            role: role.to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    fn executed_sql(db: DatabaseConnection) -> Vec<String> {
        db.into_transaction_log()
            .iter()
            .flat_map(|t| t.statements().iter().map(|s| s.sql.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_put_user_role_inserts_unknown_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<entities::user::Model>::new()])
            .append_query_results([[user_row("STATION_MANAGER")]])
            .into_connection();

        let mut tx = SeaOrmTx {
            txn: db.begin().await.unwrap(),
        };
        tx.put_user_role("u1", "a@relief.org", UserRole::StationManager)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let sql = executed_sql(db);
        assert!(sql.iter().any(|s| s.starts_with("INSERT INTO \"users\"")), "{sql:?}");
        assert!(!sql.iter().any(|s| s.starts_with("UPDATE")), "{sql:?}");
    }

    #[tokio::test]
    async fn test_put_user_role_updates_existing_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_row("RESIDENT")]])
            .append_query_results([[user_row("STATION_MANAGER")]])
            .into_connection();

        let mut tx = SeaOrmTx {
            txn: db.begin().await.unwrap(),
        };
        tx.put_user_role("u1", "a@relief.org", UserRole::StationManager)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let sql = executed_sql(db);
        assert!(sql.iter().any(|s| s.starts_with("UPDATE \"users\"")), "{sql:?}");
        assert!(!sql.iter().any(|s| s.starts_with("INSERT")), "{sql:?}");
    }
}
