//! Roster-caching decorator for any `RolePlatform`.
//!
//! Full-roster fetches are expensive, so the roster is kept for a short
//! window. Concurrent misses share one upstream fetch, and successful
//! mutations made through this decorator are patched into the cached
//! roster so the next tick does not see its own repairs as drift.
//!
//! Single-member reads always go upstream (the executor's precondition
//! check must see the live state) and refresh the cached entry on the way.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::domain::foundation::{RoleId, SubjectId};
use crate::domain::roles::RoleAction;
use crate::ports::{PlatformError, RoleInfo, RolePlatform, RosterEntry};

struct CachedRoster {
    fetched_at: Instant,
    entries: Vec<RosterEntry>,
}

pub struct CachingRolePlatform {
    inner: Arc<dyn RolePlatform>,
    ttl: Duration,
    roster: Mutex<Option<CachedRoster>>,
}

impl CachingRolePlatform {
    pub fn new(inner: Arc<dyn RolePlatform>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            roster: Mutex::new(None),
        }
    }

    /// Drop the cached roster so the next fetch goes upstream.
    pub async fn invalidate(&self) {
        *self.roster.lock().await = None;
    }

    async fn patch<F>(&self, subject: &SubjectId, update: F)
    where
        F: FnOnce(&mut Vec<RosterEntry>, Option<usize>),
    {
        let mut cache = self.roster.lock().await;
        if let Some(cached) = cache.as_mut() {
            let idx = cached.entries.iter().position(|e| &e.subject == subject);
            update(&mut cached.entries, idx);
        }
    }
}

#[async_trait]
impl RolePlatform for CachingRolePlatform {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, PlatformError> {
        // Holding the lock across the upstream call makes concurrent misses
        // wait for, and then reuse, the first caller's fetch.
        let mut cache = self.roster.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                tracing::trace!(members = cached.entries.len(), "roster served from cache");
                return Ok(cached.entries.clone());
            }
        }

        let entries = self.inner.fetch_roster().await?;
        *cache = Some(CachedRoster {
            fetched_at: Instant::now(),
            entries: entries.clone(),
        });
        Ok(entries)
    }

    async fn fetch_member(&self, subject: &SubjectId) -> Result<Option<RosterEntry>, PlatformError> {
        let member = self.inner.fetch_member(subject).await?;
        let fresh = member.clone();
        self.patch(subject, move |entries, idx| match (idx, fresh) {
            (Some(i), Some(entry)) => entries[i] = entry,
            (Some(i), None) => {
                entries.swap_remove(i);
            }
            (None, Some(entry)) => entries.push(entry),
            (None, None) => {}
        })
        .await;
        Ok(member)
    }

    async fn fetch_role(&self, role: &RoleId) -> Result<Option<RoleInfo>, PlatformError> {
        self.inner.fetch_role(role).await
    }

    async fn authority_position(&self) -> Result<i64, PlatformError> {
        self.inner.authority_position().await
    }

    async fn mutate_role(
        &self,
        subject: &SubjectId,
        role: &RoleId,
        action: RoleAction,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.inner.mutate_role(subject, role, action, reason).await?;
        self.patch(subject, |entries, idx| {
            if let Some(i) = idx {
                match action {
                    RoleAction::Add => entries[i].roles.insert(role.clone()),
                    RoleAction::Remove => entries[i].roles.remove(role),
                };
            }
        })
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::platform::InMemoryRolePlatform;

    fn subject() -> SubjectId {
        SubjectId::new("1").unwrap()
    }

    fn role() -> RoleId {
        RoleId::new("r").unwrap()
    }

    fn setup(ttl: Duration) -> (Arc<InMemoryRolePlatform>, CachingRolePlatform) {
        let inner = Arc::new(InMemoryRolePlatform::new(10));
        inner.add_member(subject(), vec![]);
        let caching = CachingRolePlatform::new(inner.clone(), ttl);
        (inner, caching)
    }

    #[tokio::test]
    async fn roster_is_cached_within_ttl() {
        let (inner, caching) = setup(Duration::from_secs(30));

        caching.fetch_roster().await.unwrap();
        caching.fetch_roster().await.unwrap();

        assert_eq!(inner.roster_fetch_count(), 1);
    }

    #[tokio::test]
    async fn expired_roster_is_refetched() {
        let (inner, caching) = setup(Duration::from_millis(10));

        caching.fetch_roster().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        caching.fetch_roster().await.unwrap();

        assert_eq!(inner.roster_fetch_count(), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let (inner, caching) = setup(Duration::from_secs(30));

        let (a, b, c) = tokio::join!(
            caching.fetch_roster(),
            caching.fetch_roster(),
            caching.fetch_roster()
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(inner.roster_fetch_count(), 1);
    }

    #[tokio::test]
    async fn mutations_write_through_to_cached_roster() {
        let (inner, caching) = setup(Duration::from_secs(30));
        caching.fetch_roster().await.unwrap();

        caching
            .mutate_role(&subject(), &role(), RoleAction::Add, "test")
            .await
            .unwrap();

        let roster = caching.fetch_roster().await.unwrap();
        assert!(roster[0].has_role(&role()));
        assert_eq!(inner.roster_fetch_count(), 1);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_cache_untouched() {
        let (inner, caching) = setup(Duration::from_secs(30));
        caching.fetch_roster().await.unwrap();
        inner.fail_next_mutations(vec![PlatformError::permission_denied("403")]);

        let result = caching
            .mutate_role(&subject(), &role(), RoleAction::Add, "test")
            .await;

        assert!(result.is_err());
        let roster = caching.fetch_roster().await.unwrap();
        assert!(!roster[0].has_role(&role()));
    }

    #[tokio::test]
    async fn member_reads_refresh_cached_entry() {
        let (inner, caching) = setup(Duration::from_secs(30));
        caching.fetch_roster().await.unwrap();
        inner.grant(&subject(), role());

        let member = caching.fetch_member(&subject()).await.unwrap().unwrap();
        assert!(member.has_role(&role()));

        let roster = caching.fetch_roster().await.unwrap();
        assert!(roster[0].has_role(&role()));
    }
}
