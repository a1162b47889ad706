//! Optional cooldown for the remote path.
//!
//! After `failure_threshold` consecutive remote failures the remote path is
//! skipped until `cooldown` has elapsed. A success resets the counter. Without
//! a policy the remote path is attempted on every call.
//!
//! State is lock-free: a stale read costs at most one extra remote attempt.

use carelink_core::config::CooldownPolicy;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::time::Instant;

pub struct RemoteHealth {
    policy: Option<CooldownPolicy>,
    /// Reference point for `cooldown_started_nanos`.
    epoch: Instant,
    /// Consecutive remote failures. Reset to 0 on success.
    failures: AtomicU32,
    /// Nanoseconds since `epoch` when the cooldown started. 0 means none.
    cooldown_started_nanos: AtomicU64,
}

impl RemoteHealth {
    pub fn new(policy: Option<CooldownPolicy>) -> Self {
        Self {
            policy,
            epoch: Instant::now(),
            failures: AtomicU32::new(0),
            cooldown_started_nanos: AtomicU64::new(0),
        }
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// True while the remote path should be skipped.
    pub fn is_cooling_down(&self) -> bool {
        let Some(policy) = self.policy else {
            return false;
        };
        let started = self.cooldown_started_nanos.load(Ordering::Relaxed);
        if started == 0 {
            return false;
        }
        let cooldown_nanos = u64::try_from(policy.cooldown.as_nanos()).unwrap_or(u64::MAX);
        self.now_nanos().saturating_sub(started) < cooldown_nanos
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Relaxed);
        self.cooldown_started_nanos.store(0, Ordering::Relaxed);
    }

    /// Records a remote failure. Returns `true` when this failure started a
    /// cooldown.
    pub fn record_failure(&self) -> bool {
        let Some(policy) = self.policy else {
            return false;
        };
        let failures = self.failures.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        if failures < policy.failure_threshold {
            return false;
        }
        self.failures.store(0, Ordering::Relaxed);
        // 0 is the "no cooldown" sentinel.
        self.cooldown_started_nanos
            .store(self.now_nanos().max(1), Ordering::Relaxed);
        true
    }
}
