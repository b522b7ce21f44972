//! PostgreSQL implementation of CooldownRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, parse_subject};
use crate::domain::cooldown::{Cooldown, CooldownKind};
use crate::domain::foundation::{DomainError, ErrorCode, OrgId, SubjectId, Timestamp};
use crate::ports::CooldownRepository;

/// Primary key is `(subject_id, kind)`.
pub struct PostgresCooldownRepository {
    pool: PgPool,
}

impl PostgresCooldownRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CooldownRow {
    subject_id: String,
    kind: String,
    expires_at: DateTime<Utc>,
    origin_org_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CooldownRow> for Cooldown {
    type Error = DomainError;

    fn try_from(row: CooldownRow) -> Result<Self, Self::Error> {
        let kind = CooldownKind::new(row.kind).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid cooldown kind: {}", e))
        })?;

        Ok(Cooldown {
            subject: parse_subject(row.subject_id)?,
            kind,
            expires_at: Timestamp::from_datetime(row.expires_at),
            origin_org: row.origin_org_id.map(OrgId::from_uuid),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl CooldownRepository for PostgresCooldownRepository {
    async fn find(
        &self,
        subject: &SubjectId,
        kind: &CooldownKind,
    ) -> Result<Option<Cooldown>, DomainError> {
        let row: Option<CooldownRow> = sqlx::query_as(
            r#"
            SELECT subject_id, kind, expires_at, origin_org_id, created_at
            FROM cooldowns
            WHERE subject_id = $1 AND kind = $2
            "#,
        )
        .bind(subject.as_str())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find cooldown", e))?;

        row.map(Cooldown::try_from).transpose()
    }

    async fn list_for_subject(&self, subject: &SubjectId) -> Result<Vec<Cooldown>, DomainError> {
        let rows: Vec<CooldownRow> = sqlx::query_as(
            r#"
            SELECT subject_id, kind, expires_at, origin_org_id, created_at
            FROM cooldowns
            WHERE subject_id = $1
            ORDER BY kind
            "#,
        )
        .bind(subject.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list cooldowns", e))?;

        rows.into_iter().map(Cooldown::try_from).collect()
    }

    async fn find_expired(&self, now: Timestamp) -> Result<Vec<Cooldown>, DomainError> {
        let rows: Vec<CooldownRow> = sqlx::query_as(
            r#"
            SELECT subject_id, kind, expires_at, origin_org_id, created_at
            FROM cooldowns
            WHERE expires_at <= $1
            ORDER BY expires_at
            "#,
        )
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find expired cooldowns", e))?;

        rows.into_iter().map(Cooldown::try_from).collect()
    }

    async fn upsert(&self, cooldown: &Cooldown) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO cooldowns (subject_id, kind, expires_at, origin_org_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (subject_id, kind) DO UPDATE SET
                expires_at = EXCLUDED.expires_at,
                origin_org_id = EXCLUDED.origin_org_id,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(cooldown.subject.as_str())
        .bind(cooldown.kind.as_str())
        .bind(cooldown.expires_at.as_datetime())
        .bind(cooldown.origin_org.map(|o| *o.as_uuid()))
        .bind(cooldown.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("save cooldown", e))?;

        Ok(())
    }

    async fn delete(&self, subject: &SubjectId, kind: &CooldownKind) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM cooldowns WHERE subject_id = $1 AND kind = $2")
            .bind(subject.as_str())
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete cooldown", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_if_expires_at(
        &self,
        subject: &SubjectId,
        kind: &CooldownKind,
        expires_at: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "DELETE FROM cooldowns WHERE subject_id = $1 AND kind = $2 AND expires_at = $3",
        )
        .bind(subject.as_str())
        .bind(kind.as_str())
        .bind(expires_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("delete cooldown", e))?;

        Ok(result.rows_affected() > 0)
    }
}
