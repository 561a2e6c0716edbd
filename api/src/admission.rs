// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Per-endpoint, per-identity token buckets kept in a shared store.
//!
//! The refill/consume step runs atomically inside the store (a Lua script
//! on Redis, a mutex in memory) so that every service instance observes the
//! same bucket. The controller only adds the clock, a bounded round-trip and
//! the failure policy.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::clock::Clock;
use crate::constants::{DEFAULT_BUCKET_IDLE_TTL, DEFAULT_STORE_TIMEOUT, RATE_LIMIT_KEY_PREFIX};
use crate::errors::StoreError;

/// Static limit attached to one protected endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointLimit {
    pub name: &'static str,
    pub capacity: u32,
    /// tokens per second
    pub refill_rate: f64,
}

impl EndpointLimit {
    /// A bucket of `requests` tokens that refills completely once a minute.
    pub const fn per_minute(name: &'static str, requests: u32) -> Self {
        Self {
            name,
            capacity: requests,
            refill_rate: requests as f64 / 60.0,
        }
    }

    pub fn bucket_key(&self, identity_id: &Uuid) -> String {
        format!("{RATE_LIMIT_KEY_PREFIX}:{}:{identity_id}", self.name)
    }

    /// Time until a bucket holding `tokens` regains a whole token.
    pub fn retry_after(&self, tokens: f64) -> Duration {
        let deficit = (1.0 - tokens).max(0.0);
        Duration::try_from_secs_f64(deficit / self.refill_rate).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    pub tokens: f64,
    /// last refill, seconds since the Unix epoch
    pub ts: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketOutcome {
    pub admitted: bool,
    /// tokens left after the step
    pub tokens: f64,
}

/// One refill-then-consume step.
///
/// Returns the outcome and, when admitted, the state to persist. A rejected
/// step persists nothing, so the next attempt refills from the previous
/// timestamp.
pub fn step(
    current: Option<BucketState>,
    limit: &EndpointLimit,
    now: f64,
) -> (BucketOutcome, Option<BucketState>) {
    let capacity = f64::from(limit.capacity);
    let state = current.unwrap_or(BucketState {
        tokens: capacity,
        ts: now,
    });

    let elapsed = (now - state.ts).max(0.0);
    let tokens = capacity.min(state.tokens + elapsed * limit.refill_rate);

    if tokens < 1.0 {
        return (
            BucketOutcome {
                admitted: false,
                tokens,
            },
            None,
        );
    }

    let tokens = tokens - 1.0;
    (
        BucketOutcome {
            admitted: true,
            tokens,
        },
        Some(BucketState { tokens, ts: now }),
    )
}

/// Shared bucket storage. `take` must apply [`step`] atomically per key.
#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn take(
        &self,
        key: &str,
        limit: &EndpointLimit,
        now: f64,
        idle_ttl: Duration,
    ) -> Result<BucketOutcome, StoreError>;
}

/// What to do when the bucket store cannot answer in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Admit the request and log a warning.
    Open,
    /// Reject with 503.
    #[default]
    Closed,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Open => write!(f, "open"),
            FailurePolicy::Closed => write!(f, "closed"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AdmissionError {
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },
    #[error("admission store unavailable: {0}")]
    StoreUnavailable(StoreError),
}

#[derive(Debug, Clone, Copy)]
pub struct AdmissionSettings {
    pub store_timeout: Duration,
    pub idle_ttl: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            idle_ttl: DEFAULT_BUCKET_IDLE_TTL,
            failure_policy: FailurePolicy::Closed,
        }
    }
}

pub struct AdmissionController {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
    settings: AdmissionSettings,
}

impl AdmissionController {
    pub fn new(
        store: Arc<dyn BucketStore>,
        clock: Arc<dyn Clock>,
        settings: AdmissionSettings,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// Consumes one token from the `(endpoint, identity)` bucket.
    #[tracing::instrument(skip(self, limit), fields(endpoint = limit.name))]
    pub async fn check(
        &self,
        limit: &EndpointLimit,
        identity_id: Uuid,
    ) -> Result<(), AdmissionError> {
        let key = limit.bucket_key(&identity_id);
        let now = self.clock.now().timestamp_micros() as f64 / 1_000_000.0;

        let result = tokio::time::timeout(
            self.settings.store_timeout,
            self.store.take(&key, limit, now, self.settings.idle_ttl),
        )
        .await
        .unwrap_or(Err(StoreError::Timeout));

        match result {
            Ok(outcome) if outcome.admitted => Ok(()),
            Ok(outcome) => {
                tracing::debug!("[api] rejected {} ({:.3} tokens)", key, outcome.tokens);
                Err(AdmissionError::RateLimitExceeded {
                    retry_after: limit.retry_after(outcome.tokens),
                })
            }
            Err(error) => match self.settings.failure_policy {
                FailurePolicy::Open => {
                    tracing::warn!("[api] admitting {} without a bucket: {}", key, error);
                    Ok(())
                }
                FailurePolicy::Closed => Err(AdmissionError::StoreUnavailable(error)),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::buckets::MemoryBucketStore;
    use crate::clock::ManualClock;
    use crate::constants::{SYMPTOM_CHECK_LIMIT, SYMPTOM_HISTORY_LIMIT};

    struct FailingStore;

    #[async_trait]
    impl BucketStore for FailingStore {
        async fn take(
            &self,
            _key: &str,
            _limit: &EndpointLimit,
            _now: f64,
            _idle_ttl: Duration,
        ) -> Result<BucketOutcome, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    struct HangingStore;

    #[async_trait]
    impl BucketStore for HangingStore {
        async fn take(
            &self,
            _key: &str,
            _limit: &EndpointLimit,
            _now: f64,
            _idle_ttl: Duration,
        ) -> Result<BucketOutcome, StoreError> {
            std::future::pending().await
        }
    }

    fn controller(
        store: Arc<dyn BucketStore>,
        clock: Arc<ManualClock>,
        failure_policy: FailurePolicy,
    ) -> AdmissionController {
        let settings = AdmissionSettings {
            failure_policy,
            ..AdmissionSettings::default()
        };
        AdmissionController::new(store, clock, settings)
    }

    #[test]
    fn test_per_minute_limits() {
        assert_eq!(SYMPTOM_CHECK_LIMIT.capacity, 5);
        assert!((SYMPTOM_CHECK_LIMIT.refill_rate - 1.0 / 12.0).abs() < 1e-12);
        assert!((SYMPTOM_HISTORY_LIMIT.refill_rate - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_bucket_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            SYMPTOM_CHECK_LIMIT.bucket_key(&id),
            "rate_limit:post_symptom_check:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_step_starts_full_and_never_exceeds_capacity() {
        let (outcome, state) = step(None, &SYMPTOM_CHECK_LIMIT, 100.0);
        assert!(outcome.admitted);
        assert_eq!(outcome.tokens, 4.0);

        // an hour of idle time refills to capacity, not beyond
        let (outcome, _) = step(state, &SYMPTOM_CHECK_LIMIT, 3_700.0);
        assert_eq!(outcome.tokens, 4.0);
    }

    #[test]
    fn test_step_clamps_clock_skew() {
        let current = Some(BucketState {
            tokens: 0.5,
            ts: 1_000.0,
        });
        let (outcome, state) = step(current, &SYMPTOM_CHECK_LIMIT, 990.0);
        assert!(!outcome.admitted);
        assert_eq!(outcome.tokens, 0.5);
        assert_eq!(state, None);
    }

    #[test]
    fn test_retry_after_hint() {
        assert_eq!(
            SYMPTOM_CHECK_LIMIT.retry_after(0.0),
            Duration::from_secs(12)
        );
        assert_eq!(SYMPTOM_CHECK_LIMIT.retry_after(1.0), Duration::ZERO);
        let zero = EndpointLimit {
            name: "frozen",
            capacity: 1,
            refill_rate: 0.0,
        };
        assert_eq!(zero.retry_after(0.0), Duration::MAX);
    }

    #[tokio::test]
    async fn test_bucket_monotonicity() {
        let clock = Arc::new(ManualClock::default());
        let admission = controller(
            Arc::new(MemoryBucketStore::new()),
            clock.clone(),
            FailurePolicy::Closed,
        );
        let id = Uuid::new_v4();

        for _ in 0..5 {
            admission.check(&SYMPTOM_CHECK_LIMIT, id).await.unwrap();
        }
        let rejected = admission.check(&SYMPTOM_CHECK_LIMIT, id).await;
        assert!(matches!(
            rejected,
            Err(AdmissionError::RateLimitExceeded { .. })
        ));

        clock.advance(Duration::from_secs(12));
        admission.check(&SYMPTOM_CHECK_LIMIT, id).await.unwrap();
        assert!(admission.check(&SYMPTOM_CHECK_LIMIT, id).await.is_err());
    }

    #[tokio::test]
    async fn test_rejection_does_not_reset_refill() {
        let clock = Arc::new(ManualClock::default());
        let admission = controller(
            Arc::new(MemoryBucketStore::new()),
            clock.clone(),
            FailurePolicy::Closed,
        );
        let id = Uuid::new_v4();

        for _ in 0..5 {
            admission.check(&SYMPTOM_CHECK_LIMIT, id).await.unwrap();
        }
        // repeated rejections inside the window must not push the refill out
        for _ in 0..3 {
            clock.advance(Duration::from_secs(3));
            assert!(admission.check(&SYMPTOM_CHECK_LIMIT, id).await.is_err());
        }
        clock.advance(Duration::from_secs(3));
        admission.check(&SYMPTOM_CHECK_LIMIT, id).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checks_admit_exactly_capacity() {
        let clock = Arc::new(ManualClock::default());
        let admission = Arc::new(controller(
            Arc::new(MemoryBucketStore::new()),
            clock,
            FailurePolicy::Closed,
        ));
        let id = Uuid::new_v4();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let admission = admission.clone();
                tokio::spawn(async move { admission.check(&SYMPTOM_HISTORY_LIMIT, id).await })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }

    #[tokio::test]
    async fn test_identities_are_isolated() {
        let clock = Arc::new(ManualClock::default());
        let admission = controller(
            Arc::new(MemoryBucketStore::new()),
            clock,
            FailurePolicy::Closed,
        );
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        for _ in 0..5 {
            admission.check(&SYMPTOM_CHECK_LIMIT, alice).await.unwrap();
        }
        assert!(admission.check(&SYMPTOM_CHECK_LIMIT, alice).await.is_err());
        admission.check(&SYMPTOM_CHECK_LIMIT, bob).await.unwrap();
        // other endpoints keep their own bucket
        admission.check(&SYMPTOM_HISTORY_LIMIT, alice).await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_closed_on_store_error() {
        let clock = Arc::new(ManualClock::default());
        let admission = controller(Arc::new(FailingStore), clock, FailurePolicy::Closed);
        let result = admission.check(&SYMPTOM_CHECK_LIMIT, Uuid::new_v4()).await;
        assert!(matches!(result, Err(AdmissionError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_fail_open_on_store_error() {
        let clock = Arc::new(ManualClock::default());
        let admission = controller(Arc::new(FailingStore), clock, FailurePolicy::Open);
        for _ in 0..20 {
            admission
                .check(&SYMPTOM_CHECK_LIMIT, Uuid::new_v4())
                .await
                .unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_store_times_out() {
        let clock = Arc::new(ManualClock::default());
        let admission = controller(Arc::new(HangingStore), clock, FailurePolicy::Closed);
        let result = admission.check(&SYMPTOM_CHECK_LIMIT, Uuid::new_v4()).await;
        assert_eq!(
            result,
            Err(AdmissionError::StoreUnavailable(StoreError::Timeout))
        );
    }
}
