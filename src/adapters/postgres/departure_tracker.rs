//! PostgreSQL-backed departure tracker.
//!
//! Reads `subject_departures`, which the presence collaborator writes
//! whenever it sees a subject leave.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::db_error;
use crate::domain::foundation::{DomainError, SubjectId, Timestamp};
use crate::ports::DepartureTracker;

pub struct PostgresDepartureTracker {
    pool: PgPool,
}

impl PostgresDepartureTracker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DepartureTracker for PostgresDepartureTracker {
    async fn last_departure(&self, subject: &SubjectId) -> Result<Option<Timestamp>, DomainError> {
        let departed_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT departed_at FROM subject_departures WHERE subject_id = $1",
        )
        .bind(subject.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find departure", e))?;

        Ok(departed_at.map(Timestamp::from_datetime))
    }
}
