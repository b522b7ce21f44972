//! Stale membership cleanup.
//!
//! A membership whose subject is no longer on the roster is kept until the
//! subject has been gone for the retention window, then cleared and
//! archived. Departure times come from the `DepartureTracker`; a subject
//! with no recorded departure is never cleaned up.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{DomainError, OrgId, SubjectId, Timestamp};
use crate::domain::org::{LastOrgState, RemovedBy};
use crate::ports::{DepartureTracker, LastOrgStateRepository, MembershipRepository};

pub const DEFAULT_STALE_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleRemoval {
    pub subject: SubjectId,
    pub org_id: OrgId,
    pub departed_at: Timestamp,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StaleCleanupReport {
    pub removed: Vec<StaleRemoval>,
    pub failures: Vec<String>,
}

pub struct StaleMembershipCleaner {
    memberships: Arc<dyn MembershipRepository>,
    last_org: Arc<dyn LastOrgStateRepository>,
    departures: Arc<dyn DepartureTracker>,
    retention: Duration,
}

impl StaleMembershipCleaner {
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        last_org: Arc<dyn LastOrgStateRepository>,
        departures: Arc<dyn DepartureTracker>,
        retention: Duration,
    ) -> Self {
        Self {
            memberships,
            last_org,
            departures,
            retention,
        }
    }

    /// Clear memberships of subjects absent from `present` for longer than
    /// the retention window.
    pub async fn cleanup(
        &self,
        present: &HashSet<SubjectId>,
        now: Timestamp,
    ) -> Result<StaleCleanupReport, DomainError> {
        let mut report = StaleCleanupReport::default();
        let cutoff = now.minus_minutes((self.retention.as_secs() / 60) as i64);

        for membership in self.memberships.list_all().await? {
            if present.contains(&membership.subject) {
                continue;
            }
            let subject = membership.subject.clone();

            let departed_at = match self.departures.last_departure(&subject).await {
                Ok(Some(at)) => at,
                Ok(None) => continue,
                Err(e) => {
                    report.failures.push(format!("{}: departure lookup failed: {}", subject, e));
                    continue;
                }
            };
            if departed_at.is_after(&cutoff) {
                continue;
            }

            if let Err(e) = self.memberships.delete(&subject).await {
                report.failures.push(format!("{}: stale cleanup failed: {}", subject, e));
                continue;
            }
            let archived = LastOrgState::from_membership(&membership, departed_at, RemovedBy::StaleCleanup);
            if let Err(e) = self.last_org.upsert(&archived).await {
                tracing::warn!(subject = %subject, error = %e, "failed to archive last org");
            }

            tracing::info!(subject = %subject, org = %membership.org_id, departed_at = %departed_at, "stale membership cleared");
            report.removed.push(StaleRemoval {
                subject,
                org_id: membership.org_id,
                departed_at,
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryDepartureTracker, InMemoryStore};
    use crate::domain::org::{Membership, OrgRank};

    fn subject(id: &str) -> SubjectId {
        SubjectId::new(id).unwrap()
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        departures: Arc<InMemoryDepartureTracker>,
        cleaner: StaleMembershipCleaner,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let departures = Arc::new(InMemoryDepartureTracker::new());
        let cleaner = StaleMembershipCleaner::new(
            store.clone(),
            store.clone(),
            departures.clone(),
            Duration::from_secs(60 * 60),
        );
        Fixture {
            store,
            departures,
            cleaner,
        }
    }

    async fn seed(store: &InMemoryStore, id: &str) -> OrgId {
        let org = OrgId::new();
        let m = Membership::new(subject(id), org, OrgRank::Member, Timestamp::now().minus_minutes(600));
        MembershipRepository::upsert(store, &m).await.unwrap();
        org
    }

    #[tokio::test]
    async fn departed_past_retention_is_cleared_and_archived() {
        let f = fixture();
        let org = seed(&f.store, "1").await;
        let now = Timestamp::now();
        let departed = now.minus_minutes(90);
        f.departures.record_departure(subject("1"), departed);

        let report = f.cleaner.cleanup(&HashSet::new(), now).await.unwrap();

        assert_eq!(report.removed.len(), 1);
        assert_eq!(f.store.membership_count(), 0);
        let archived = LastOrgStateRepository::find(f.store.as_ref(), &subject("1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(archived.last_org_id, org);
        assert_eq!(archived.left_at, departed);
        assert_eq!(archived.removed_by, RemovedBy::StaleCleanup);
    }

    #[tokio::test]
    async fn recent_departure_is_kept() {
        let f = fixture();
        seed(&f.store, "1").await;
        let now = Timestamp::now();
        f.departures.record_departure(subject("1"), now.minus_minutes(10));

        let report = f.cleaner.cleanup(&HashSet::new(), now).await.unwrap();

        assert!(report.removed.is_empty());
        assert_eq!(f.store.membership_count(), 1);
    }

    #[tokio::test]
    async fn unknown_departure_is_never_cleaned() {
        let f = fixture();
        seed(&f.store, "1").await;

        let report = f.cleaner.cleanup(&HashSet::new(), Timestamp::now()).await.unwrap();

        assert!(report.removed.is_empty());
        assert_eq!(f.store.membership_count(), 1);
    }

    #[tokio::test]
    async fn present_subjects_are_skipped() {
        let f = fixture();
        seed(&f.store, "1").await;
        let now = Timestamp::now();
        f.departures.record_departure(subject("1"), now.minus_minutes(600));

        let present = HashSet::from([subject("1")]);
        let report = f.cleaner.cleanup(&present, now).await.unwrap();

        assert!(report.removed.is_empty());
    }
}
