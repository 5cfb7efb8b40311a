//! Fixed-window rate limiting
//!
//! Each limiter owns a concurrent map from client key to the current window
//! record. A check creates or resets the record, increments it, and compares
//! against the ceiling, all under the entry's shard lock, so two racing
//! requests from one client can never both see the last free slot.
//!
//! Windows are fixed, not sliding: a client may burst up to twice the
//! ceiling across a window boundary.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use relay_types::clock::unix_millis;
use relay_types::ids::ClientKey;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{RateLimitConfig, RateLimitPolicies};

/// Per-client counter for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClientWindowRecord {
    count: u32,
    /// Window end, Unix milliseconds.
    reset_at_ms: i64,
}

impl ClientWindowRecord {
    fn fresh(now_ms: i64, window_ms: u64) -> Self {
        Self {
            count: 0,
            reset_at_ms: now_ms.saturating_add(window_ms as i64),
        }
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.reset_at_ms
    }
}

/// Result of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Window end, Unix milliseconds.
    pub reset_at_ms: i64,
    /// Seconds until the window resets; zero when allowed.
    pub retry_after_secs: u64,
}

/// One fixed-window policy and its client table.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    name: &'static str,
    config: RateLimitConfig,
    records: DashMap<ClientKey, ClientWindowRecord>,
}

impl FixedWindowLimiter {
    pub fn new(name: &'static str, config: RateLimitConfig) -> Self {
        Self {
            name,
            config,
            records: DashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn check(&self, key: &ClientKey) -> RateLimitDecision {
        self.check_at(key, unix_millis())
    }

    pub fn check_at(&self, key: &ClientKey, now_ms: i64) -> RateLimitDecision {
        check_window(&self.records, key, &self.config, now_ms)
    }

    /// Give back one slot after a successful request.
    ///
    /// Only applies to the window the slot was taken from and never goes
    /// below zero. Call at most once per admitted request.
    pub fn release(&self, key: &ClientKey, decision: &RateLimitDecision) {
        if !decision.allowed {
            return;
        }
        if let Some(mut record) = self.records.get_mut(key) {
            if record.reset_at_ms == decision.reset_at_ms && record.count > 0 {
                record.count -= 1;
            }
        }
    }

    /// Drop every record whose window has ended. Returns how many went.
    pub fn sweep_at(&self, now_ms: i64) -> usize {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let keep = !record.is_expired(now_ms);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(unix_millis())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.records.len()
    }
}

/// Fixed-window check against an explicit policy.
fn check_window(
    records: &DashMap<ClientKey, ClientWindowRecord>,
    key: &ClientKey,
    config: &RateLimitConfig,
    now_ms: i64,
) -> RateLimitDecision {
    let mut record = records
        .entry(key.clone())
        .or_insert_with(|| ClientWindowRecord::fresh(now_ms, config.window_ms));
    if record.is_expired(now_ms) {
        *record = ClientWindowRecord::fresh(now_ms, config.window_ms);
    }
    record.count = record.count.saturating_add(1);

    let max = config.max_requests;
    if record.count > max {
        let wait_ms = record.reset_at_ms.saturating_sub(now_ms).max(1) as u64;
        RateLimitDecision {
            allowed: false,
            limit: max,
            remaining: 0,
            reset_at_ms: record.reset_at_ms,
            retry_after_secs: wait_ms.div_ceil(1000),
        }
    } else {
        RateLimitDecision {
            allowed: true,
            limit: max,
            remaining: max - record.count,
            reset_at_ms: record.reset_at_ms,
            retry_after_secs: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Limiter set and sweeper
// ---------------------------------------------------------------------------

/// The gateway's four independent limiters.
#[derive(Debug, Clone)]
pub struct RateLimiters {
    /// Authentication-grade policy. Configured and swept; no current route
    /// takes it.
    pub strict: Arc<FixedWindowLimiter>,
    pub standard: Arc<FixedWindowLimiter>,
    pub lenient: Arc<FixedWindowLimiter>,
    pub webhook: Arc<FixedWindowLimiter>,
}

impl RateLimiters {
    pub fn new(policies: &RateLimitPolicies) -> Self {
        Self {
            strict: Arc::new(FixedWindowLimiter::new("strict", policies.strict.clone())),
            standard: Arc::new(FixedWindowLimiter::new("standard", policies.standard.clone())),
            lenient: Arc::new(FixedWindowLimiter::new("lenient", policies.lenient.clone())),
            webhook: Arc::new(FixedWindowLimiter::new("webhook", policies.webhook.clone())),
        }
    }

    pub fn all(&self) -> [Arc<FixedWindowLimiter>; 4] {
        [
            Arc::clone(&self.strict),
            Arc::clone(&self.standard),
            Arc::clone(&self.lenient),
            Arc::clone(&self.webhook),
        ]
    }

    /// Start a background task that sweeps every limiter on `interval`.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweepHandle {
        let limiters = self.all();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let now_ms = unix_millis();
                        for limiter in &limiters {
                            let removed = limiter.sweep_at(now_ms);
                            if removed > 0 {
                                debug!(
                                    limiter = limiter.name(),
                                    removed,
                                    remaining = limiter.tracked_clients(),
                                    "Swept expired rate limit windows"
                                );
                            }
                        }
                    }
                }
            }
            info!("Rate limit sweeper stopped");
        });

        SweepHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Handle to a running sweeper.
#[derive(Debug)]
pub struct SweepHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal the sweeper and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
