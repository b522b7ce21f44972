//! PostgreSQL implementation of OrgRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, parse_role};
use crate::domain::foundation::{DomainError, ErrorCode, OrgId};
use crate::domain::org::{Org, OrgKind};
use crate::ports::OrgRepository;

pub struct PostgresOrgRepository {
    pool: PgPool,
}

impl PostgresOrgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrgRow {
    id: Uuid,
    name: String,
    kind: String,
    base_role: String,
    leader_role: Option<String>,
    co_leader_role: Option<String>,
    active: bool,
}

impl TryFrom<OrgRow> for Org {
    type Error = DomainError;

    fn try_from(row: OrgRow) -> Result<Self, Self::Error> {
        let kind: OrgKind = row.kind.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid org kind: {}", e))
        })?;

        Ok(Org {
            id: OrgId::from_uuid(row.id),
            name: row.name,
            kind,
            base_role: parse_role(row.base_role)?,
            leader_role: row.leader_role.map(parse_role).transpose()?,
            co_leader_role: row.co_leader_role.map(parse_role).transpose()?,
            active: row.active,
        })
    }
}

#[async_trait]
impl OrgRepository for PostgresOrgRepository {
    async fn find(&self, id: &OrgId) -> Result<Option<Org>, DomainError> {
        let row: Option<OrgRow> = sqlx::query_as(
            r#"
            SELECT id, name, kind, base_role, leader_role, co_leader_role, active
            FROM orgs
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find org", e))?;

        row.map(Org::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<Org>, DomainError> {
        let rows: Vec<OrgRow> = sqlx::query_as(
            r#"
            SELECT id, name, kind, base_role, leader_role, co_leader_role, active
            FROM orgs
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list orgs", e))?;

        rows.into_iter().map(Org::try_from).collect()
    }

    async fn upsert(&self, org: &Org) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO orgs (id, name, kind, base_role, leader_role, co_leader_role, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                kind = EXCLUDED.kind,
                base_role = EXCLUDED.base_role,
                leader_role = EXCLUDED.leader_role,
                co_leader_role = EXCLUDED.co_leader_role,
                active = EXCLUDED.active
            "#,
        )
        .bind(org.id.as_uuid())
        .bind(&org.name)
        .bind(org.kind.as_str())
        .bind(org.base_role.as_str())
        .bind(org.leader_role.as_ref().map(|r| r.as_str()))
        .bind(org.co_leader_role.as_ref().map(|r| r.as_str()))
        .bind(org.active)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("orgs_base_role_key") {
                    return DomainError::validation(
                        "base_role",
                        format!("role {} is already the base role of another org", org.base_role),
                    );
                }
            }
            db_error("save org", e)
        })?;

        Ok(())
    }

    async fn delete(&self, id: &OrgId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM orgs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete org", e))?;

        Ok(result.rows_affected() > 0)
    }
}
