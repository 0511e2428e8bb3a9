//! Fixed-window rate limiting keyed by client identity.
//!
//! State lives in process memory: it is lost on restart and not shared
//! between instances, so limits are approximate under horizontal scaling.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::RateLimitConfig;
use crate::core::{AppError, Result};

/// Minimum time between two sweeps of expired buckets
pub const SWEEP_INTERVAL_MS: i64 = 60_000;

/// Millisecond time source
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Rate-limiting identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    /// Prefers the hashed credential, then the first `X-Forwarded-For` hop,
    /// then the socket peer.
    pub fn derive(
        fingerprint: Option<&str>,
        forwarded_for: Option<&str>,
        peer_addr: Option<&str>,
    ) -> Self {
        if let Some(hash) = fingerprint {
            return ClientKey(format!("key:{}", hash));
        }

        let forwarded = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match forwarded.or(peer_addr) {
            Some(addr) => ClientKey(format!("ip:{}", addr)),
            None => ClientKey("anonymous".to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBucket {
    pub count: i64,
    pub expires_at_ms: i64,
}

impl RateLimitBucket {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Storage backend for buckets
pub trait RateLimitStore: Send + Sync {
    fn get(&self, key: &ClientKey) -> Option<RateLimitBucket>;

    fn set(&self, key: &ClientKey, bucket: RateLimitBucket);

    /// Drops expired buckets and returns how many were removed
    fn sweep(&self, now_ms: i64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// HashMap-backed store for a single process
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    buckets: Mutex<HashMap<ClientKey, RateLimitBucket>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn get(&self, key: &ClientKey) -> Option<RateLimitBucket> {
        let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.get(key).copied()
    }

    fn set(&self, key: &ClientKey, bucket: RateLimitBucket) {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.insert(key.clone(), bucket);
    }

    fn sweep(&self, now_ms: i64) -> usize {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_expired(now_ms));
        before - buckets.len()
    }

    fn len(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Rate limiting decision returned by [`FixedWindowLimiter::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Exceeded { retry_after_ms: i64 },
}

impl RateLimitDecision {
    /// Whole seconds for `Retry-After`, rounded up, never below one
    pub fn retry_after_secs(&self) -> Option<u64> {
        match *self {
            RateLimitDecision::Allowed => None,
            RateLimitDecision::Exceeded { retry_after_ms } => {
                let secs = (retry_after_ms.max(0) as u64).div_ceil(1000);
                Some(secs.max(1))
            }
        }
    }
}

impl fmt::Display for RateLimitDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitDecision::Allowed => write!(f, "allowed"),
            RateLimitDecision::Exceeded { retry_after_ms } => {
                write!(f, "exceeded (retry after {} ms)", retry_after_ms)
            }
        }
    }
}

/// Fixed-window counter per [`ClientKey`]
pub struct FixedWindowLimiter {
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    /// Time of the last sweep. Held for the whole check so the read and
    /// write of a bucket cannot interleave across worker threads.
    last_sweep_ms: Mutex<i64>,
}

impl FixedWindowLimiter {
    /// In-memory limiter on the wall clock
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_store(
            config,
            Arc::new(InMemoryRateLimitStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_store(
        config: RateLimitConfig,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            config,
            store,
            clock,
            last_sweep_ms: Mutex::new(now),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.max_requests > 0
    }

    pub fn check(&self, key: &ClientKey) -> RateLimitDecision {
        if !self.is_enabled() {
            return RateLimitDecision::Allowed;
        }

        let mut last_sweep = self
            .last_sweep_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now_ms();

        if now - *last_sweep > SWEEP_INTERVAL_MS {
            let removed = self.store.sweep(now);
            *last_sweep = now;
            tracing::debug!(
                removed,
                remaining = self.store.len(),
                "Swept expired rate-limit buckets"
            );
        }

        match self.store.get(key) {
            Some(bucket) if !bucket.is_expired(now) => {
                if bucket.count < self.config.max_requests {
                    self.store.set(
                        key,
                        RateLimitBucket {
                            count: bucket.count + 1,
                            ..bucket
                        },
                    );
                    RateLimitDecision::Allowed
                } else {
                    let remaining = bucket.expires_at_ms - now;
                    let retry_after_ms = if remaining > 0 {
                        remaining
                    } else {
                        self.config.window_ms
                    };
                    RateLimitDecision::Exceeded { retry_after_ms }
                }
            }
            _ => {
                self.store.set(
                    key,
                    RateLimitBucket {
                        count: 1,
                        expires_at_ms: now + self.config.window_ms,
                    },
                );
                RateLimitDecision::Allowed
            }
        }
    }

    /// Like [`check`](Self::check) but as a `Result` for the request pipeline
    pub fn enforce(&self, key: &ClientKey) -> Result<()> {
        let decision = self.check(key);
        match decision.retry_after_secs() {
            None => Ok(()),
            Some(retry_after_secs) => {
                tracing::warn!(client = %key, %decision, "Rate limit exceeded");
                Err(AppError::RateLimited { retry_after_secs })
            }
        }
    }
}
