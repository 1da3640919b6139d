use super::db_err;
use super::entities::{vote, Vote};
use crate::domain::{UserRole, VoteRecord, VoteType};
use relief_errors::{AppError, AppResult};
use sea_orm::sea_query::OnConflict;
use sea_orm::{entity::*, query::*, ConnectionTrait};

pub struct VoteRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> VoteRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn find(&self, user_id: &str, station_id: &str) -> AppResult<Option<VoteRecord>> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::StationId.eq(station_id))
            .one(self.db)
            .await
            .map_err(db_err)?
            .map(to_domain)
            .transpose()
    }

    pub async fn find_for_update(
        &self,
        user_id: &str,
        station_id: &str,
    ) -> AppResult<Option<VoteRecord>> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::StationId.eq(station_id))
            .lock_exclusive()
            .one(self.db)
            .await
            .map_err(db_err)?
            .map(to_domain)
            .transpose()
    }

    pub async fn by_user(&self, user_id: &str) -> AppResult<Vec<VoteRecord>> {
        Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .order_by_asc(vote::Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    /// Inserts the record or overwrites direction and timestamps of the
    /// existing one.
    pub async fn upsert(&self, record: &VoteRecord) -> AppResult<()> {
        let active = vote::ActiveModel {
            user_id: Set(record.user_id.clone()),
            station_id: Set(record.station_id.clone()),
            vote_type: Set(record.vote_type.as_str().to_string()),
            user_role: Set(record.user_role.as_str().to_string()),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        };
        Vote::insert(active)
            .on_conflict(
                OnConflict::columns([vote::Column::UserId, vote::Column::StationId])
                    .update_columns([vote::Column::VoteType, vote::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn delete(&self, user_id: &str, station_id: &str) -> AppResult<()> {
        Vote::delete_many()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::StationId.eq(station_id))
            .exec(self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn to_domain(row: vote::Model) -> AppResult<VoteRecord> {
    Ok(VoteRecord {
        vote_type: row.vote_type.parse::<VoteType>().map_err(AppError::Database)?,
        user_role: row
            .user_role
            .parse::<UserRole>()
            .map_err(|e| AppError::Database(e.to_string()))?,
        user_id: row.user_id,
        station_id: row.station_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn row(vote_type: &str, user_role: &str) -> vote::Model {
        vote::Model {
            user_id: "u1".to_string(),
            station_id: "s1".to_string(),
            vote_type: vote_type.to_string(),
            user_role: user_role.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_decodes_stored_vote() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row("DOWN", "STATION_MANAGER")]])
            .into_connection();

        let vote = VoteRepository::new(&db).find("u1", "s1").await.unwrap().unwrap();
        assert_eq!(vote.vote_type, VoteType::Down);
        assert_eq!(vote.user_role, UserRole::StationManager);
        assert_eq!(vote.station_id, "s1");
    }

    #[tokio::test]
    async fn test_unknown_codes_are_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row("SIDEWAYS", "RESIDENT")]])
            .append_query_results([[row("UP", "MAYOR")]])
            .into_connection();

        let repo = VoteRepository::new(&db);
        let err = repo.find("u1", "s1").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)), "{err:?}");
        let err = repo.by_user("u1").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_on_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let record = to_domain(row("UP", "ADMIN")).unwrap();
        VoteRepository::new(&db).upsert(&record).await.unwrap();

        let log = db.into_transaction_log();
        let sql = &log[0].statements()[0].sql;
        assert!(sql.starts_with("INSERT INTO \"votes\""), "{sql}");
        assert!(sql.contains("ON CONFLICT"), "{sql}");
        assert!(sql.contains("DO UPDATE"), "{sql}");
    }
}
