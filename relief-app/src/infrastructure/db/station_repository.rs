use super::db_err;
use super::entities::{station, station_member, Station as StationEntity, StationMember};
use crate::domain::{MemberRole, Station, Verification, VerifiedBy};
use relief_errors::{AppError, AppResult};
use sea_orm::{entity::*, query::*, ConnectionTrait};
use std::collections::HashMap;

pub struct StationRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> StationRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn insert(&self, station: &Station) -> AppResult<()> {
        let active = station::ActiveModel {
            id: Set(station.id.clone()),
            name: Set(station.name.clone()),
            address: Set(station.address.clone()),
            upvotes: Set(counter_to_db(station.upvotes)),
            downvotes: Set(counter_to_db(station.downvotes)),
            is_verified: Set(station.is_verified()),
            verified_by: Set(station
                .verification
                .as_ref()
                .map(|v| v.verified_by.as_str().to_string())),
            verified_at: Set(station.verification.as_ref().map(|v| v.verified_at)),
            last_verified: Set(station.last_verified),
            created_at: Set(station.created_at),
            last_updated: Set(station.last_updated),
        };
        active.insert(self.db).await.map_err(db_err)?;
        self.replace_members(station).await
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Station>> {
        let row = StationEntity::find_by_id(id.to_string())
            .one(self.db)
            .await
            .map_err(db_err)?;
        self.hydrate(row).await
    }

    /// Same as `find_by_id` but takes a row lock until the transaction ends.
    pub async fn find_for_update(&self, id: &str) -> AppResult<Option<Station>> {
        let row = StationEntity::find_by_id(id.to_string())
            .lock_exclusive()
            .one(self.db)
            .await
            .map_err(db_err)?;
        self.hydrate(row).await
    }

    pub async fn list(&self) -> AppResult<Vec<Station>> {
        let rows = StationEntity::find()
            .order_by_asc(station::Column::CreatedAt)
            .order_by_asc(station::Column::Id)
            .all(self.db)
            .await
            .map_err(db_err)?;

        let members = StationMember::find()
            .order_by_asc(station_member::Column::Position)
            .all(self.db)
            .await
            .map_err(db_err)?;

        let mut by_station: HashMap<String, Vec<station_member::Model>> = HashMap::new();
        for member in members {
            by_station
                .entry(member.station_id.clone())
                .or_default()
                .push(member);
        }

        rows.into_iter()
            .map(|row| {
                let members = by_station.remove(&row.id).unwrap_or_default();
                to_domain(row, members)
            })
            .collect()
    }

    /// Writes counters, verification and member lists.
    pub async fn save(&self, station: &Station) -> AppResult<()> {
        let active = station::ActiveModel {
            id: Unchanged(station.id.clone()),
            name: Set(station.name.clone()),
            address: Set(station.address.clone()),
            upvotes: Set(counter_to_db(station.upvotes)),
            downvotes: Set(counter_to_db(station.downvotes)),
            is_verified: Set(station.is_verified()),
            verified_by: Set(station
                .verification
                .as_ref()
                .map(|v| v.verified_by.as_str().to_string())),
            verified_at: Set(station.verification.as_ref().map(|v| v.verified_at)),
            last_verified: Set(station.last_verified),
            created_at: Unchanged(station.created_at),
            last_updated: Set(station.last_updated),
        };
        active.update(self.db).await.map_err(db_err)?;
        self.replace_members(station).await
    }

    /// Member rows and votes go with the station through `ON DELETE CASCADE`.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = StationEntity::delete_by_id(id.to_string())
            .exec(self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    pub async fn station_ids_with_member(
        &self,
        email: &str,
        role: MemberRole,
    ) -> AppResult<Vec<String>> {
        let rows = StationMember::find()
            .filter(station_member::Column::Email.eq(email))
            .filter(station_member::Column::MemberRole.eq(role.as_str()))
            .all(self.db)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(|m| m.station_id).collect())
    }

    async fn replace_members(&self, station: &Station) -> AppResult<()> {
        StationMember::delete_many()
            .filter(station_member::Column::StationId.eq(station.id.as_str()))
            .exec(self.db)
            .await
            .map_err(db_err)?;

        let rows: Vec<station_member::ActiveModel> = [MemberRole::Owner, MemberRole::Volunteer]
            .into_iter()
            .flat_map(|role| {
                station
                    .members(role)
                    .iter()
                    .enumerate()
                    .map(move |(position, email)| station_member::ActiveModel {
                        station_id: Set(station.id.clone()),
                        member_role: Set(role.as_str().to_string()),
                        email: Set(email.clone()),
                        position: Set(position as i32),
                    })
            })
            .collect();

        if rows.is_empty() {
            return Ok(());
        }

        StationMember::insert_many(rows)
            .exec_without_returning(self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn hydrate(&self, row: Option<station::Model>) -> AppResult<Option<Station>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let members = StationMember::find()
            .filter(station_member::Column::StationId.eq(row.id.as_str()))
            .order_by_asc(station_member::Column::Position)
            .all(self.db)
            .await
            .map_err(db_err)?;
        to_domain(row, members).map(Some)
    }
}

fn counter_to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn counter_from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn to_domain(row: station::Model, members: Vec<station_member::Model>) -> AppResult<Station> {
    let verification = match (row.verified_by.as_deref(), row.verified_at) {
        (Some(by), Some(at)) => Some(Verification {
            is_verified: row.is_verified,
            verified_by: by.parse::<VerifiedBy>().map_err(AppError::Database)?,
            verified_at: at,
        }),
        _ => None,
    };

    let mut managers = Vec::new();
    let mut volunteers = Vec::new();
    for member in members {
        match member.member_role.parse::<MemberRole>() {
            Ok(MemberRole::Owner) => managers.push(member.email),
            Ok(MemberRole::Volunteer) => volunteers.push(member.email),
            Err(e) => return Err(AppError::Database(e)),
        }
    }

    Ok(Station {
        id: row.id,
        name: row.name,
        address: row.address,
        upvotes: counter_from_db(row.upvotes),
        downvotes: counter_from_db(row.downvotes),
        verification,
        last_verified: row.last_verified,
        managers,
        volunteers,
        created_at: row.created_at,
        last_updated: row.last_updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap()
    }

    fn station_row(id: &str) -> station::Model {
        station::Model {
            id: id.to_string(),
            name: "Harbor Depot".to_string(),
            address: Some("3 Pier St".to_string()),
            upvotes: 101,
            downvotes: 1,
            is_verified: true,
            verified_by: Some("ADMIN".to_string()),
            verified_at: Some(at()),
            last_verified: Some(at()),
            created_at: at(),
            last_updated: at(),
        }
    }

    fn member(station_id: &str, role: &str, email: &str, position: i32) -> station_member::Model {
        station_member::Model {
            station_id: station_id.to_string(),
            member_role: role.to_string(),
            email: email.to_string(),
            position,
        }
    }

    fn executed_sql(db: sea_orm::DatabaseConnection) -> Vec<String> {
        db.into_transaction_log()
            .iter()
            .flat_map(|t| t.statements().iter().map(|s| s.sql.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_find_hydrates_members_and_verification() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[station_row("s1")]])
            .append_query_results([[
                member("s1", "owner", "lead@relief.org", 0),
                member("s1", "volunteer", "helper@relief.org", 0),
                member("s1", "owner", "second@relief.org", 1),
            ]])
            .into_connection();

        let station = StationRepository::new(&db)
            .find_for_update("s1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!((station.upvotes, station.downvotes), (101, 1));
        assert_eq!(
            station.managers,
            vec!["lead@relief.org".to_string(), "second@relief.org".to_string()]
        );
        assert_eq!(station.volunteers, vec!["helper@relief.org".to_string()]);
        let verification = station.verification.unwrap();
        assert!(verification.is_verified);
        assert_eq!(verification.verified_by, VerifiedBy::Admin);
        assert_eq!(verification.verified_at, at());

        let sql = executed_sql(db);
        assert!(sql[0].contains("FOR UPDATE"), "{}", sql[0]);
    }

    #[tokio::test]
    async fn test_missing_station_skips_member_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<station::Model>::new()])
            .into_connection();

        assert!(StationRepository::new(&db)
            .find_by_id("nope")
            .await
            .unwrap()
            .is_none());
        assert_eq!(executed_sql(db).len(), 1);
    }

    #[tokio::test]
    async fn test_unverified_row_has_no_verification() {
        let row = station::Model {
            is_verified: false,
            verified_by: None,
            verified_at: None,
            last_verified: None,
            ..station_row("s1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row]])
            .append_query_results([Vec::<station_member::Model>::new()])
            .into_connection();

        let station = StationRepository::new(&db)
            .find_by_id("s1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(station.verification, None);
        assert!(!station.is_verified());
    }

    #[tokio::test]
    async fn test_corrupt_rows_are_rejected() {
        let bad_verifier = station::Model {
            verified_by: Some("MAYOR".to_string()),
            ..station_row("s1")
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[bad_verifier]])
            .append_query_results([Vec::<station_member::Model>::new()])
            .into_connection();
        let err = StationRepository::new(&db).find_by_id("s1").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)), "{err:?}");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[station_row("s1")]])
            .append_query_results([[member("s1", "captain", "x@relief.org", 0)]])
            .into_connection();
        let err = StationRepository::new(&db).find_by_id("s1").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_list_groups_members_by_station() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[station_row("s1"), station_row("s2")]])
            .append_query_results([[
                member("s2", "owner", "b@relief.org", 0),
                member("s1", "owner", "a@relief.org", 0),
                member("s2", "volunteer", "c@relief.org", 0),
            ]])
            .into_connection();

        let stations = StationRepository::new(&db).list().await.unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].managers, vec!["a@relief.org".to_string()]);
        assert!(stations[0].volunteers.is_empty());
        assert_eq!(stations[1].managers, vec!["b@relief.org".to_string()]);
        assert_eq!(stations[1].volunteers, vec!["c@relief.org".to_string()]);
    }

    #[tokio::test]
    async fn test_save_rewrites_member_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[station_row("s1")]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();

        let mut station = to_domain(station_row("s1"), Vec::new()).unwrap();
        station.managers = vec!["lead@relief.org".to_string()];
        StationRepository::new(&db).save(&station).await.unwrap();

        let sql = executed_sql(db);
        assert_eq!(sql.len(), 3);
        assert!(sql[0].starts_with("UPDATE \"stations\""), "{}", sql[0]);
        assert!(sql[1].starts_with("DELETE FROM \"station_members\""), "{}", sql[1]);
        assert!(sql[2].starts_with("INSERT INTO \"station_members\""), "{}", sql[2]);
    }

    #[tokio::test]
    async fn test_delete_reports_whether_a_row_went() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();

        let repo = StationRepository::new(&db);
        assert!(repo.delete("s1").await.unwrap());
        assert!(!repo.delete("s1").await.unwrap());
    }

    #[test]
    fn test_counter_conversion_saturates() {
        assert_eq!(counter_to_db(u64::MAX), i64::MAX);
        assert_eq!(counter_to_db(42), 42);
        assert_eq!(counter_from_db(-3), 0);
        assert_eq!(counter_from_db(7), 7);
    }
}
