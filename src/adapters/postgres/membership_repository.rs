//! PostgreSQL implementation of MembershipRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, parse_subject};
use crate::domain::foundation::{DomainError, ErrorCode, OrgId, SubjectId, Timestamp};
use crate::domain::org::{Membership, OrgRank};
use crate::ports::MembershipRepository;

/// PostgreSQL implementation of the MembershipRepository port.
///
/// `subject_id` is the primary key, so `upsert` is a single
/// `INSERT .. ON CONFLICT DO UPDATE`.
pub struct PostgresMembershipRepository {
    pool: PgPool,
}

impl PostgresMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a membership.
#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    subject_id: String,
    org_id: Uuid,
    rank: String,
    since: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = DomainError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let rank: OrgRank = row.rank.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid rank value: {}", e))
        })?;

        Ok(Membership {
            subject: parse_subject(row.subject_id)?,
            org_id: OrgId::from_uuid(row.org_id),
            rank,
            since: Timestamp::from_datetime(row.since),
        })
    }
}

#[async_trait]
impl MembershipRepository for PostgresMembershipRepository {
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<Membership>, DomainError> {
        let row: Option<MembershipRow> = sqlx::query_as(
            r#"
            SELECT subject_id, org_id, rank, since
            FROM memberships
            WHERE subject_id = $1
            "#,
        )
        .bind(subject.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find membership", e))?;

        row.map(Membership::try_from).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Membership>, DomainError> {
        let rows: Vec<MembershipRow> = sqlx::query_as(
            r#"
            SELECT subject_id, org_id, rank, since
            FROM memberships
            ORDER BY subject_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list memberships", e))?;

        rows.into_iter().map(Membership::try_from).collect()
    }

    async fn upsert(&self, membership: &Membership) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO memberships (subject_id, org_id, rank, since)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (subject_id) DO UPDATE SET
                org_id = EXCLUDED.org_id,
                rank = EXCLUDED.rank,
                since = EXCLUDED.since
            "#,
        )
        .bind(membership.subject.as_str())
        .bind(membership.org_id.as_uuid())
        .bind(membership.rank.as_str())
        .bind(membership.since.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("save membership", e))?;

        Ok(())
    }

    async fn delete(&self, subject: &SubjectId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM memberships WHERE subject_id = $1")
            .bind(subject.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete membership", e))?;

        Ok(result.rows_affected() > 0)
    }
}
