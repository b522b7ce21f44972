//! RoleOperationExecutor: the only writer of external role state.
//!
//! Every role mutation in the process is submitted here. The executor
//!
//! 1. collapses concurrent identical (subject, role, action) requests into
//!    one external call whose result every caller receives,
//! 2. runs operations for the same subject strictly in submission order
//!    (a per-subject FIFO chain), whatever role they target,
//! 3. bounds total simultaneous external calls with a runtime-adjustable
//!    limiter shared by all subjects; an operation waiting out a backoff
//!    holds no slot,
//! 4. skips work the platform state already satisfies and refuses work the
//!    platform would reject (unknown role, role above our authority),
//! 5. owns retry policy for rate-limited and transient failures.
//!
//! Submitted operations run on their own task. Dropping the future returned
//! by [`RoleOperationExecutor::submit`] discards the result but never
//! cancels the side effect.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

use super::limiter::{ConcurrencyLimiter, DEFAULT_CONCURRENCY};
use super::retry::RetryPolicy;
use crate::domain::foundation::SubjectId;
use crate::domain::roles::{
    FailureCause, OperationKey, OperationResult, PreconditionFailure, RoleOperation,
};
use crate::ports::{PlatformError, PlatformErrorKind, RolePlatform};

type SharedResult = Shared<BoxFuture<'static, OperationResult>>;

/// Configuration for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Global cap on simultaneous operations; clamped to `[1, 10]`.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Cheap to clone; all clones share one queue, chain map and limiter.
#[derive(Clone)]
pub struct RoleOperationExecutor {
    inner: Arc<ExecutorInner>,
}

struct InFlight {
    seq: u64,
    result: SharedResult,
}

struct ChainTail {
    seq: u64,
    done: oneshot::Receiver<()>,
}

struct ExecutorInner {
    platform: Arc<dyn RolePlatform>,
    limiter: Arc<ConcurrencyLimiter>,
    retry: RetryPolicy,
    in_flight: Mutex<HashMap<OperationKey, InFlight>>,
    chains: Mutex<HashMap<SubjectId, ChainTail>>,
    next_seq: AtomicU64,
}

impl RoleOperationExecutor {
    pub fn new(platform: Arc<dyn RolePlatform>, config: ExecutorConfig) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                platform,
                limiter: Arc::new(ConcurrencyLimiter::new(config.concurrency)),
                retry: config.retry,
                in_flight: Mutex::new(HashMap::new()),
                chains: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Submit an operation and wait for its final result.
    pub async fn submit(&self, op: RoleOperation) -> OperationResult {
        let (result, joined) = self.enqueue(op);
        let result = result.await;
        if joined {
            result.as_deduped()
        } else {
            result
        }
    }

    /// Change the global concurrency bound at runtime.
    ///
    /// Returns the clamped value. Raising admits queued work immediately;
    /// lowering never preempts operations already running.
    pub fn set_concurrency(&self, requested: usize) -> usize {
        let applied = self.inner.limiter.set_limit(requested);
        tracing::info!(requested, applied, "operation concurrency updated");
        applied
    }

    pub fn concurrency(&self) -> usize {
        self.inner.limiter.limit()
    }

    /// Operations currently holding a concurrency slot.
    pub fn in_flight(&self) -> usize {
        self.inner.limiter.in_flight()
    }

    /// Operations submitted and not yet finished, queued or running.
    pub fn pending(&self) -> usize {
        lock(&self.inner.in_flight).len()
    }

    fn enqueue(&self, op: RoleOperation) -> (SharedResult, bool) {
        let key = op.dedup_key();
        let mut in_flight = lock(&self.inner.in_flight);

        if let Some(existing) = in_flight.get(&key) {
            // Joining is only safe while nothing else for this subject was
            // queued behind the existing operation; otherwise the join would
            // reorder this request ahead of that later work.
            let is_tail = lock(&self.inner.chains)
                .get(&op.subject)
                .map_or(false, |tail| tail.seq == existing.seq);
            if is_tail {
                tracing::debug!(subject = %op.subject, role = %op.role, action = %op.action, "joined in-flight operation");
                return (existing.result.clone(), true);
            }
        }

        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = oneshot::channel();
        let previous = lock(&self.inner.chains)
            .insert(op.subject.clone(), ChainTail { seq, done: done_rx })
            .map(|tail| tail.done);

        let inner = Arc::clone(&self.inner);
        let guard = CompletionGuard {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            subject: op.subject.clone(),
            seq,
            done: Some(done_tx),
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            if let Some(previous) = previous {
                // An Err means the predecessor's task died; it is finished either way.
                let _ = previous.await;
            }
            inner.execute(&op).await
        });

        let result = async move {
            handle.await.unwrap_or_else(|e| {
                OperationResult::failed(
                    FailureCause::Unknown,
                    format!("operation task failed: {}", e),
                )
            })
        }
        .boxed()
        .shared();

        in_flight.insert(
            key,
            InFlight {
                seq,
                result: result.clone(),
            },
        );
        (result, false)
    }
}

impl ExecutorInner {
    async fn execute(&self, op: &RoleOperation) -> OperationResult {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let outcome = {
                let _permit = self.limiter.acquire().await;
                self.attempt(op).await
            };
            let error = match outcome {
                Ok(result) => {
                    log_result(op, &result, attempt);
                    return result;
                }
                Err(error) => error,
            };

            match self.retry.delay_for(&error, attempt) {
                Some(delay) => {
                    tracing::debug!(
                        subject = %op.subject,
                        role = %op.role,
                        action = %op.action,
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying role operation after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    let result = self.give_up(error, attempt);
                    log_result(op, &result, attempt);
                    return result;
                }
            }
        }
    }

    /// One pass of precondition checks plus the mutation itself.
    ///
    /// `Ok` carries a final result; `Err` is a platform failure for the
    /// retry policy to judge.
    async fn attempt(&self, op: &RoleOperation) -> Result<OperationResult, PlatformError> {
        let member = self.platform.fetch_member(&op.subject).await?;
        let holds = member.as_ref().map_or(false, |m| m.has_role(&op.role));
        if op.action.is_satisfied_by(holds) {
            return Ok(OperationResult::skipped(format!(
                "role {} already {}",
                op.role,
                if holds { "present" } else { "absent" }
            )));
        }
        if member.is_none() {
            return Ok(precondition_failed(
                PreconditionFailure::SubjectNotFound,
                format!("subject {} is not on the roster", op.subject),
            ));
        }

        let Some(role) = self.platform.fetch_role(&op.role).await? else {
            return Ok(precondition_failed(
                PreconditionFailure::RoleNotFound,
                format!("role {} does not exist", op.role),
            ));
        };
        let authority = self.platform.authority_position().await?;
        if authority <= role.position {
            return Ok(precondition_failed(
                PreconditionFailure::HierarchyBlocked,
                format!(
                    "role {} (position {}) is not below our highest role (position {})",
                    role.name, role.position, authority
                ),
            ));
        }

        self.platform
            .mutate_role(&op.subject, &op.role, op.action, &op.reason)
            .await?;
        Ok(OperationResult::applied())
    }

    fn give_up(&self, error: PlatformError, attempt: u32) -> OperationResult {
        let cause = match error.kind {
            PlatformErrorKind::PermissionDenied => FailureCause::PermissionDenied,
            PlatformErrorKind::RateLimited => FailureCause::RateLimited,
            PlatformErrorKind::Transient => FailureCause::Transient,
            PlatformErrorKind::Other => FailureCause::Unknown,
        };
        let reason = if error.is_retryable() {
            format!("retries exhausted after {} attempts: {}", attempt, error.message)
        } else {
            error.message
        };
        OperationResult::failed(cause, reason)
    }

    fn finish(&self, key: &OperationKey, subject: &SubjectId, seq: u64) {
        {
            let mut in_flight = lock(&self.in_flight);
            if in_flight.get(key).map_or(false, |entry| entry.seq == seq) {
                in_flight.remove(key);
            }
        }
        let mut chains = lock(&self.chains);
        if chains.get(subject).map_or(false, |tail| tail.seq == seq) {
            chains.remove(subject);
        }
    }
}

/// Releases the operation's bookkeeping and unblocks the next operation in
/// the subject's chain, including when the task panics.
struct CompletionGuard {
    inner: Arc<ExecutorInner>,
    key: OperationKey,
    subject: SubjectId,
    seq: u64,
    done: Option<oneshot::Sender<()>>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.inner.finish(&self.key, &self.subject, self.seq);
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

fn precondition_failed(failure: PreconditionFailure, reason: String) -> OperationResult {
    OperationResult::failed(FailureCause::PreconditionFailed(failure), reason)
}

fn log_result(op: &RoleOperation, result: &OperationResult, attempts: u32) {
    if result.mutated() {
        tracing::info!(subject = %op.subject, role = %op.role, action = %op.action, attempts, reason = %op.reason, "role operation applied");
    } else if result.ok {
        tracing::debug!(subject = %op.subject, role = %op.role, action = %op.action, "role operation skipped");
    } else {
        tracing::warn!(
            subject = %op.subject,
            role = %op.role,
            action = %op.action,
            attempts,
            failure = %result.describe_failure(),
            "role operation failed"
        );
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::platform::InMemoryRolePlatform;
    use crate::domain::foundation::RoleId;
    use crate::domain::roles::RoleAction;
    use std::time::{Duration, Instant};

    fn subject(id: &str) -> SubjectId {
        SubjectId::new(id).unwrap()
    }

    fn role(id: &str) -> RoleId {
        RoleId::new(id).unwrap()
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::default()
            .with_rate_limit_floor(Duration::ZERO)
            .with_transient_base(Duration::from_millis(1))
            .with_jitter(Duration::ZERO)
    }

    fn executor_for(platform: &Arc<InMemoryRolePlatform>, concurrency: usize) -> RoleOperationExecutor {
        RoleOperationExecutor::new(
            platform.clone(),
            ExecutorConfig::default()
                .with_concurrency(concurrency)
                .with_retry(fast_retry()),
        )
    }

    fn platform_with_roles(roles: &[&str]) -> Arc<InMemoryRolePlatform> {
        let platform = InMemoryRolePlatform::new(100);
        for (i, r) in roles.iter().enumerate() {
            platform.define_role(role(r), i as i64 + 1);
        }
        Arc::new(platform)
    }

    #[tokio::test]
    async fn add_applies_and_second_add_is_skipped() {
        let platform = platform_with_roles(&["cd"]);
        platform.add_member(subject("1"), vec![]);
        let executor = executor_for(&platform, 3);

        let first = executor
            .submit(RoleOperation::add(subject("1"), role("cd"), "test"))
            .await;
        assert!(first.mutated());
        assert!(platform.holds(&subject("1"), &role("cd")));

        let second = executor
            .submit(RoleOperation::add(subject("1"), role("cd"), "test"))
            .await;
        assert!(second.ok && second.skipped);
        assert_eq!(platform.mutation_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_identical_requests_collapse() {
        let platform = platform_with_roles(&["cd"]);
        platform.add_member(subject("1"), vec![]);
        platform.set_mutation_delay(Duration::from_millis(40));
        let executor = executor_for(&platform, 3);

        let a = executor.submit(RoleOperation::add(subject("1"), role("cd"), "a"));
        let b = executor.submit(RoleOperation::add(subject("1"), role("cd"), "b"));
        let (ra, rb) = tokio::join!(a, b);

        assert!(ra.ok && rb.ok);
        assert_eq!(platform.mutation_count(), 1);
        assert!(ra.deduped != rb.deduped);
        assert_eq!(executor.pending(), 0);
    }

    #[tokio::test]
    async fn unknown_role_fails_fast_without_retry() {
        let platform = platform_with_roles(&[]);
        platform.add_member(subject("1"), vec![]);
        let executor = executor_for(&platform, 3);

        let result = executor
            .submit(RoleOperation::add(subject("1"), role("ghost"), "test"))
            .await;

        assert!(!result.ok);
        assert_eq!(
            result.cause,
            Some(FailureCause::PreconditionFailed(PreconditionFailure::RoleNotFound))
        );
        assert_eq!(platform.mutation_count(), 0);
    }

    #[tokio::test]
    async fn role_above_authority_is_blocked() {
        let platform = Arc::new(InMemoryRolePlatform::new(5));
        platform.define_role(role("admin"), 9);
        platform.add_member(subject("1"), vec![]);
        let executor = executor_for(&platform, 3);

        let result = executor
            .submit(RoleOperation::add(subject("1"), role("admin"), "test"))
            .await;

        assert_eq!(
            result.cause,
            Some(FailureCause::PreconditionFailed(PreconditionFailure::HierarchyBlocked))
        );
    }

    #[tokio::test]
    async fn removing_from_absent_subject_is_skipped() {
        let platform = platform_with_roles(&["cd"]);
        let executor = executor_for(&platform, 3);

        let result = executor
            .submit(RoleOperation::remove(subject("gone"), role("cd"), "test"))
            .await;
        assert!(result.ok && result.skipped);

        let add = executor
            .submit(RoleOperation::add(subject("gone"), role("cd"), "test"))
            .await;
        assert_eq!(
            add.cause,
            Some(FailureCause::PreconditionFailed(PreconditionFailure::SubjectNotFound))
        );
    }

    #[tokio::test]
    async fn permission_denied_is_not_retried() {
        let platform = platform_with_roles(&["cd"]);
        platform.add_member(subject("1"), vec![]);
        platform.fail_next_mutations(vec![PlatformError::permission_denied("missing permission")]);
        let executor = executor_for(&platform, 3);

        let result = executor
            .submit(RoleOperation::add(subject("1"), role("cd"), "test"))
            .await;

        assert_eq!(result.cause, Some(FailureCause::PermissionDenied));
        assert_eq!(platform.mutation_attempts(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let platform = platform_with_roles(&["cd"]);
        platform.add_member(subject("1"), vec![]);
        platform.fail_next_mutations(vec![
            PlatformError::transient("502"),
            PlatformError::transient("503"),
        ]);
        let executor = executor_for(&platform, 3);

        let result = executor
            .submit(RoleOperation::add(subject("1"), role("cd"), "test"))
            .await;

        assert!(result.mutated());
        assert_eq!(platform.mutation_attempts(), 3);
    }

    #[tokio::test]
    async fn retry_budget_is_six_attempts() {
        let platform = platform_with_roles(&["cd"]);
        platform.add_member(subject("1"), vec![]);
        platform.fail_next_mutations(vec![PlatformError::transient("down"); 10]);
        let executor = executor_for(&platform, 3);

        let result = executor
            .submit(RoleOperation::add(subject("1"), role("cd"), "test"))
            .await;

        assert_eq!(result.cause, Some(FailureCause::Transient));
        assert!(result.reason.unwrap().contains("6 attempts"));
        assert_eq!(platform.mutation_attempts(), 6);
    }

    #[tokio::test]
    async fn rate_limit_waits_for_hint() {
        let platform = platform_with_roles(&["cd"]);
        platform.add_member(subject("1"), vec![]);
        platform.fail_next_mutations(vec![PlatformError::rate_limited(
            Some(Duration::from_millis(80)),
            "429",
        )]);
        let executor = executor_for(&platform, 3);

        let started = Instant::now();
        let result = executor
            .submit(RoleOperation::add(subject("1"), role("cd"), "test"))
            .await;

        assert!(result.mutated());
        let attempts = platform.mutation_attempt_times();
        assert_eq!(attempts.len(), 2);
        assert!(attempts[1].duration_since(attempts[0]) >= Duration::from_millis(80));
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn backoff_does_not_hold_a_concurrency_slot() {
        let platform = platform_with_roles(&["cd"]);
        platform.add_member(subject("1"), vec![]);
        platform.add_member(subject("2"), vec![]);
        platform.fail_next_mutations(vec![PlatformError::rate_limited(
            Some(Duration::from_millis(150)),
            "429",
        )]);
        let executor = executor_for(&platform, 1);

        let throttled = executor.submit(RoleOperation::add(subject("1"), role("cd"), "throttled"));
        let unrelated = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            executor
                .submit(RoleOperation::add(subject("2"), role("cd"), "unrelated"))
                .await
        };
        let (r1, r2) = tokio::join!(throttled, unrelated);

        assert!(r1.mutated() && r2.mutated());
        let log = platform.mutation_log();
        let order: Vec<&str> = log.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(order, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn same_subject_operations_run_in_submission_order() {
        let platform = platform_with_roles(&["a", "b"]);
        platform.add_member(subject("1"), vec![]);
        platform.set_mutation_delay(Duration::from_millis(30));
        let executor = executor_for(&platform, 5);

        let first = executor.submit(RoleOperation::add(subject("1"), role("a"), "first"));
        let second = executor.submit(RoleOperation::add(subject("1"), role("b"), "second"));
        let (r1, r2) = tokio::join!(first, second);
        assert!(r1.mutated() && r2.mutated());

        let log = platform.mutation_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, role("a"));
        assert_eq!(log[1].role, role("b"));
        assert!(log[0].finished <= log[1].started);
    }

    #[tokio::test]
    async fn join_does_not_reorder_past_queued_work() {
        let platform = platform_with_roles(&["a"]);
        platform.add_member(subject("1"), vec![]);
        platform.set_mutation_delay(Duration::from_millis(30));
        let executor = executor_for(&platform, 3);

        let add = executor.submit(RoleOperation::add(subject("1"), role("a"), "1"));
        let remove = executor.submit(RoleOperation::remove(subject("1"), role("a"), "2"));
        let re_add = executor.submit(RoleOperation::add(subject("1"), role("a"), "3"));
        let (r1, r2, r3) = tokio::join!(add, remove, re_add);

        assert!(r1.mutated() && r2.mutated() && r3.mutated());
        assert!(!r3.deduped);
        assert!(platform.holds(&subject("1"), &role("a")));
        let actions: Vec<RoleAction> = platform.mutation_log().iter().map(|m| m.action).collect();
        assert_eq!(actions, vec![RoleAction::Add, RoleAction::Remove, RoleAction::Add]);
    }

    #[tokio::test]
    async fn concurrency_bound_holds_across_subjects() {
        let platform = platform_with_roles(&["cd"]);
        for i in 0..8 {
            platform.add_member(subject(&i.to_string()), vec![]);
        }
        platform.set_mutation_delay(Duration::from_millis(25));
        let executor = executor_for(&platform, 2);

        let ops = (0..8).map(|i| {
            executor.submit(RoleOperation::add(subject(&i.to_string()), role("cd"), "bulk"))
        });
        let results = futures::future::join_all(ops).await;

        assert!(results.iter().all(|r| r.mutated()));
        assert_eq!(platform.max_concurrent_mutations(), 2);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_cancel_side_effect() {
        let platform = platform_with_roles(&["cd"]);
        platform.add_member(subject("1"), vec![]);
        platform.set_mutation_delay(Duration::from_millis(20));
        let executor = executor_for(&platform, 3);

        let fut = executor.submit(RoleOperation::add(subject("1"), role("cd"), "fire and forget"));
        // Poll once so the operation is enqueued, then drop the caller.
        let _ = tokio::time::timeout(Duration::from_millis(1), fut).await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(platform.holds(&subject("1"), &role("cd")));
    }

    #[tokio::test]
    async fn set_concurrency_clamps() {
        let platform = platform_with_roles(&[]);
        let executor = executor_for(&platform, 3);
        assert_eq!(executor.concurrency(), 3);
        assert_eq!(executor.set_concurrency(0), 1);
        assert_eq!(executor.set_concurrency(25), 10);
        assert_eq!(executor.concurrency(), 10);
    }
}
