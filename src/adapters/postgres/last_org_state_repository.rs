//! PostgreSQL implementation of LastOrgStateRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, parse_subject};
use crate::domain::foundation::{DomainError, ErrorCode, OrgId, SubjectId, Timestamp};
use crate::domain::org::{LastOrgState, RemovedBy};
use crate::ports::LastOrgStateRepository;

pub struct PostgresLastOrgStateRepository {
    pool: PgPool,
}

impl PostgresLastOrgStateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LastOrgStateRow {
    subject_id: String,
    last_org_id: Uuid,
    left_at: DateTime<Utc>,
    removed_by: String,
    removed_by_actor: Option<String>,
}

impl TryFrom<LastOrgStateRow> for LastOrgState {
    type Error = DomainError;

    fn try_from(row: LastOrgStateRow) -> Result<Self, Self::Error> {
        let removed_by = parse_removed_by(&row.removed_by, row.removed_by_actor)?;

        Ok(LastOrgState {
            subject: parse_subject(row.subject_id)?,
            last_org_id: OrgId::from_uuid(row.last_org_id),
            left_at: Timestamp::from_datetime(row.left_at),
            removed_by,
        })
    }
}

fn parse_removed_by(kind: &str, actor: Option<String>) -> Result<RemovedBy, DomainError> {
    match (kind, actor) {
        ("role_sync", _) => Ok(RemovedBy::RoleSync),
        ("stale_cleanup", _) => Ok(RemovedBy::StaleCleanup),
        ("administrator", Some(actor)) => Ok(RemovedBy::Administrator(parse_subject(actor)?)),
        (other, _) => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid removed_by value: {}", other),
        )),
    }
}

/// Column pair `(removed_by, removed_by_actor)` for a `RemovedBy`.
fn removed_by_columns(removed_by: &RemovedBy) -> (&'static str, Option<&str>) {
    match removed_by {
        RemovedBy::RoleSync => ("role_sync", None),
        RemovedBy::StaleCleanup => ("stale_cleanup", None),
        RemovedBy::Administrator(actor) => ("administrator", Some(actor.as_str())),
    }
}

#[async_trait]
impl LastOrgStateRepository for PostgresLastOrgStateRepository {
    async fn find(&self, subject: &SubjectId) -> Result<Option<LastOrgState>, DomainError> {
        let row: Option<LastOrgStateRow> = sqlx::query_as(
            r#"
            SELECT subject_id, last_org_id, left_at, removed_by, removed_by_actor
            FROM last_org_states
            WHERE subject_id = $1
            "#,
        )
        .bind(subject.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find last org state", e))?;

        row.map(LastOrgState::try_from).transpose()
    }

    async fn upsert(&self, state: &LastOrgState) -> Result<(), DomainError> {
        let (removed_by, actor) = removed_by_columns(&state.removed_by);

        sqlx::query(
            r#"
            INSERT INTO last_org_states (subject_id, last_org_id, left_at, removed_by, removed_by_actor)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (subject_id) DO UPDATE SET
                last_org_id = EXCLUDED.last_org_id,
                left_at = EXCLUDED.left_at,
                removed_by = EXCLUDED.removed_by,
                removed_by_actor = EXCLUDED.removed_by_actor
            "#,
        )
        .bind(state.subject.as_str())
        .bind(state.last_org_id.as_uuid())
        .bind(state.left_at.as_datetime())
        .bind(removed_by)
        .bind(actor)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("save last org state", e))?;

        Ok(())
    }

    async fn delete(&self, subject: &SubjectId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM last_org_states WHERE subject_id = $1")
            .bind(subject.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete last org state", e))?;

        Ok(result.rows_affected() > 0)
    }
}
