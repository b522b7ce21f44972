//! In-memory directory platform for testing.
//!
//! Holds a roster and role table in memory and lets tests script failures,
//! slow mutations and out-of-band edits, then inspect every mutation that
//! reached it.
//!
//! # Security Note
//!
//! This adapter is for **testing only**. It uses `.expect()` on lock
//! operations which will panic if locks are poisoned.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::foundation::{RoleId, SubjectId};
use crate::domain::roles::RoleAction;
use crate::ports::{PlatformError, RoleInfo, RolePlatform, RosterEntry};

/// One mutation that completed successfully against the platform.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub subject: SubjectId,
    pub role: RoleId,
    pub action: RoleAction,
    pub reason: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Scriptable in-memory platform.
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned.
pub struct InMemoryRolePlatform {
    authority: i64,
    roles: Mutex<HashMap<RoleId, RoleInfo>>,
    members: Mutex<HashMap<SubjectId, HashSet<RoleId>>>,
    failures: Mutex<VecDeque<PlatformError>>,
    roster_failure: Mutex<Option<PlatformError>>,
    mutation_delay: Mutex<Duration>,
    attempts: Mutex<Vec<Instant>>,
    log: Mutex<Vec<MutationRecord>>,
    roster_fetches: AtomicUsize,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl InMemoryRolePlatform {
    /// Creates an empty platform whose own highest role sits at `authority`.
    pub fn new(authority: i64) -> Self {
        Self {
            authority,
            roles: Mutex::new(HashMap::new()),
            members: Mutex::new(HashMap::new()),
            failures: Mutex::new(VecDeque::new()),
            roster_failure: Mutex::new(None),
            mutation_delay: Mutex::new(Duration::ZERO),
            attempts: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            roster_fetches: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }

    // === Setup ===

    pub fn define_role(&self, role: RoleId, position: i64) {
        let info = RoleInfo {
            id: role.clone(),
            name: role.as_str().to_string(),
            position,
        };
        self.roles.lock().expect("roles lock poisoned").insert(role, info);
    }

    pub fn add_member(&self, subject: SubjectId, roles: Vec<RoleId>) {
        self.members
            .lock()
            .expect("members lock poisoned")
            .insert(subject, roles.into_iter().collect());
    }

    /// Takes the subject off the roster entirely.
    pub fn remove_member(&self, subject: &SubjectId) {
        self.members.lock().expect("members lock poisoned").remove(subject);
    }

    /// Grants a role outside the executor, as a human would.
    pub fn grant(&self, subject: &SubjectId, role: RoleId) {
        if let Some(roles) = self.members.lock().expect("members lock poisoned").get_mut(subject) {
            roles.insert(role);
        }
    }

    /// Revokes a role outside the executor, as a human would.
    pub fn revoke(&self, subject: &SubjectId, role: &RoleId) {
        if let Some(roles) = self.members.lock().expect("members lock poisoned").get_mut(subject) {
            roles.remove(role);
        }
    }

    /// The next `errors.len()` mutation attempts fail with these errors, in order.
    pub fn fail_next_mutations(&self, errors: Vec<PlatformError>) {
        self.failures.lock().expect("failures lock poisoned").extend(errors);
    }

    /// Fail every roster fetch with `error` until cleared with `None`.
    pub fn fail_roster(&self, error: Option<PlatformError>) {
        *self.roster_failure.lock().expect("roster failure lock poisoned") = error;
    }

    pub fn set_mutation_delay(&self, delay: Duration) {
        *self.mutation_delay.lock().expect("delay lock poisoned") = delay;
    }

    // === Test Helpers ===

    pub fn holds(&self, subject: &SubjectId, role: &RoleId) -> bool {
        self.members
            .lock()
            .expect("members lock poisoned")
            .get(subject)
            .map_or(false, |roles| roles.contains(role))
    }

    /// Successful mutations.
    pub fn mutation_count(&self) -> usize {
        self.log.lock().expect("log lock poisoned").len()
    }

    /// Every mutation attempt, failed or not.
    pub fn mutation_attempts(&self) -> usize {
        self.attempts.lock().expect("attempts lock poisoned").len()
    }

    pub fn mutation_attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().expect("attempts lock poisoned").clone()
    }

    pub fn mutation_log(&self) -> Vec<MutationRecord> {
        self.log.lock().expect("log lock poisoned").clone()
    }

    pub fn roster_fetch_count(&self) -> usize {
        self.roster_fetches.load(Ordering::SeqCst)
    }

    /// Highest number of mutations observed running at the same time.
    pub fn max_concurrent_mutations(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    fn entry(&self, subject: &SubjectId, roles: &HashSet<RoleId>) -> RosterEntry {
        RosterEntry::new(subject.clone(), roles.iter().cloned())
    }
}

#[async_trait]
impl RolePlatform for InMemoryRolePlatform {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, PlatformError> {
        self.roster_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.roster_failure.lock().expect("roster failure lock poisoned").clone() {
            return Err(err);
        }
        let members = self.members.lock().expect("members lock poisoned");
        Ok(members
            .iter()
            .map(|(subject, roles)| self.entry(subject, roles))
            .collect())
    }

    async fn fetch_member(&self, subject: &SubjectId) -> Result<Option<RosterEntry>, PlatformError> {
        let members = self.members.lock().expect("members lock poisoned");
        Ok(members.get(subject).map(|roles| self.entry(subject, roles)))
    }

    async fn fetch_role(&self, role: &RoleId) -> Result<Option<RoleInfo>, PlatformError> {
        Ok(self.roles.lock().expect("roles lock poisoned").get(role).cloned())
    }

    async fn authority_position(&self) -> Result<i64, PlatformError> {
        Ok(self.authority)
    }

    async fn mutate_role(
        &self,
        subject: &SubjectId,
        role: &RoleId,
        action: RoleAction,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let started = Instant::now();
        self.attempts.lock().expect("attempts lock poisoned").push(started);

        let running = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(running, Ordering::SeqCst);

        let delay = *self.mutation_delay.lock().expect("delay lock poisoned");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.failures.lock().expect("failures lock poisoned").pop_front();
        let outcome = match scripted {
            Some(err) => Err(err),
            None => {
                let mut members = self.members.lock().expect("members lock poisoned");
                match members.get_mut(subject) {
                    Some(roles) => {
                        match action {
                            RoleAction::Add => roles.insert(role.clone()),
                            RoleAction::Remove => roles.remove(role),
                        };
                        Ok(())
                    }
                    None => Err(PlatformError::other(format!("unknown member {}", subject))),
                }
            }
        };

        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        if outcome.is_ok() {
            self.log.lock().expect("log lock poisoned").push(MutationRecord {
                subject: subject.clone(),
                role: role.clone(),
                action,
                reason: reason.to_string(),
                started,
                finished: Instant::now(),
            });
        }
        outcome
    }
}
