//! In-memory implementation of every store port.
//!
//! One `InMemoryStore` backs orgs, memberships, cooldowns and last-org
//! history so tests can share a single handle across collaborators.
//!
//! # Security Note
//!
//! This adapter is for **testing only**. It uses `.expect()` on lock
//! operations which will panic if locks are poisoned.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::domain::cooldown::{Cooldown, CooldownKind};
use crate::domain::foundation::{DomainError, OrgId, SubjectId, Timestamp};
use crate::domain::org::{LastOrgState, Membership, Org};
use crate::ports::{
    CooldownRepository, LastOrgStateRepository, MembershipRepository, OrgRepository,
};

#[derive(Default)]
pub struct InMemoryStore {
    orgs: RwLock<HashMap<OrgId, Org>>,
    memberships: RwLock<HashMap<SubjectId, Membership>>,
    cooldowns: RwLock<HashMap<(SubjectId, CooldownKind), Cooldown>>,
    last_org: RwLock<HashMap<SubjectId, LastOrgState>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Make every subsequent write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn membership_count(&self) -> usize {
        self.memberships.read().expect("memberships lock poisoned").len()
    }

    pub fn cooldown_count(&self) -> usize {
        self.cooldowns.read().expect("cooldowns lock poisoned").len()
    }

    fn check_writable(&self) -> Result<(), DomainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::database("store is read-only"));
        }
        Ok(())
    }
}

#[async_trait]
impl OrgRepository for InMemoryStore {
    async fn find(&self, id: &OrgId) -> Result<Option<Org>, DomainError> {
        Ok(self.orgs.read().expect("orgs lock poisoned").get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Org>, DomainError> {
        let mut orgs: Vec<Org> = self
            .orgs
            .read()
            .expect("orgs lock poisoned")
            .values()
            .cloned()
            .collect();
        orgs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(orgs)
    }

    async fn upsert(&self, org: &Org) -> Result<(), DomainError> {
        self.check_writable()?;
        self.orgs
            .write()
            .expect("orgs lock poisoned")
            .insert(org.id, org.clone());
        Ok(())
    }

    async fn delete(&self, id: &OrgId) -> Result<bool, DomainError> {
        self.check_writable()?;
        Ok(self.orgs.write().expect("orgs lock poisoned").remove(id).is_some())
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStore {
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<Membership>, DomainError> {
        Ok(self
            .memberships
            .read()
            .expect("memberships lock poisoned")
            .get(subject)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Membership>, DomainError> {
        Ok(self
            .memberships
            .read()
            .expect("memberships lock poisoned")
            .values()
            .cloned()
            .collect())
    }

    async fn upsert(&self, membership: &Membership) -> Result<(), DomainError> {
        self.check_writable()?;
        self.memberships
            .write()
            .expect("memberships lock poisoned")
            .insert(membership.subject.clone(), membership.clone());
        Ok(())
    }

    async fn delete(&self, subject: &SubjectId) -> Result<bool, DomainError> {
        self.check_writable()?;
        Ok(self
            .memberships
            .write()
            .expect("memberships lock poisoned")
            .remove(subject)
            .is_some())
    }
}

#[async_trait]
impl CooldownRepository for InMemoryStore {
    async fn find(
        &self,
        subject: &SubjectId,
        kind: &CooldownKind,
    ) -> Result<Option<Cooldown>, DomainError> {
        Ok(self
            .cooldowns
            .read()
            .expect("cooldowns lock poisoned")
            .get(&(subject.clone(), kind.clone()))
            .cloned())
    }

    async fn list_for_subject(&self, subject: &SubjectId) -> Result<Vec<Cooldown>, DomainError> {
        Ok(self
            .cooldowns
            .read()
            .expect("cooldowns lock poisoned")
            .values()
            .filter(|cd| &cd.subject == subject)
            .cloned()
            .collect())
    }

    async fn find_expired(&self, now: Timestamp) -> Result<Vec<Cooldown>, DomainError> {
        let mut expired: Vec<Cooldown> = self
            .cooldowns
            .read()
            .expect("cooldowns lock poisoned")
            .values()
            .filter(|cd| cd.is_expired(now))
            .cloned()
            .collect();
        expired.sort_by_key(|cd| cd.expires_at);
        Ok(expired)
    }

    async fn upsert(&self, cooldown: &Cooldown) -> Result<(), DomainError> {
        self.check_writable()?;
        self.cooldowns
            .write()
            .expect("cooldowns lock poisoned")
            .insert((cooldown.subject.clone(), cooldown.kind.clone()), cooldown.clone());
        Ok(())
    }

    async fn delete(&self, subject: &SubjectId, kind: &CooldownKind) -> Result<bool, DomainError> {
        self.check_writable()?;
        Ok(self
            .cooldowns
            .write()
            .expect("cooldowns lock poisoned")
            .remove(&(subject.clone(), kind.clone()))
            .is_some())
    }

    async fn delete_if_expires_at(
        &self,
        subject: &SubjectId,
        kind: &CooldownKind,
        expires_at: Timestamp,
    ) -> Result<bool, DomainError> {
        self.check_writable()?;
        let mut cooldowns = self.cooldowns.write().expect("cooldowns lock poisoned");
        let key = (subject.clone(), kind.clone());
        match cooldowns.get(&key) {
            Some(cd) if cd.expires_at == expires_at => {
                cooldowns.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl LastOrgStateRepository for InMemoryStore {
    async fn find(&self, subject: &SubjectId) -> Result<Option<LastOrgState>, DomainError> {
        Ok(self
            .last_org
            .read()
            .expect("last org lock poisoned")
            .get(subject)
            .cloned())
    }

    async fn upsert(&self, state: &LastOrgState) -> Result<(), DomainError> {
        self.check_writable()?;
        self.last_org
            .write()
            .expect("last org lock poisoned")
            .insert(state.subject.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, subject: &SubjectId) -> Result<bool, DomainError> {
        self.check_writable()?;
        Ok(self
            .last_org
            .write()
            .expect("last org lock poisoned")
            .remove(subject)
            .is_some())
    }
}
