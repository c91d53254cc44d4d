// Consensus node - identity, endpoints and lock-free health state

use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::types::{AccountId, NodeAddress};

/// Health score of a node nobody has complained about
pub const INITIAL_HEALTH: i32 = 100;

/// Health ceiling
pub const MAX_HEALTH: i32 = 200;

/// Health floor
pub const MIN_HEALTH: i32 = 0;

/// Health lost per failure
pub const FAILURE_PENALTY: i32 = 20;

/// Milliseconds on a process-wide monotonic clock
pub(crate) fn monotonic_ms() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// One consensus node.
///
/// Health and backoff live in atomics so concurrent executions update a
/// node without locking the registry or each other.
#[derive(Debug)]
pub struct Node {
    account_id: AccountId,
    endpoints: Vec<String>,
    next_endpoint: AtomicUsize,
    health: AtomicI32,
    /// Length of the current backoff interval, 0 when healthy
    backoff_ms: AtomicU64,
    /// Monotonic ms until which the node should be avoided
    backoff_until_ms: AtomicU64,
}

impl Node {
    pub fn new(account_id: AccountId, endpoints: Vec<String>) -> Self {
        Self {
            account_id,
            endpoints,
            next_endpoint: AtomicUsize::new(0),
            health: AtomicI32::new(INITIAL_HEALTH),
            backoff_ms: AtomicU64::new(0),
            backoff_until_ms: AtomicU64::new(0),
        }
    }

    pub fn from_address(address: &NodeAddress) -> Self {
        Self::new(address.account_id, address.endpoints.clone())
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Endpoint for the next request, rotating through all of them
    pub fn endpoint(&self) -> Option<&str> {
        if self.endpoints.is_empty() {
            return None;
        }
        let index = self.next_endpoint.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        Some(&self.endpoints[index])
    }

    pub fn health(&self) -> i32 {
        self.health.load(Ordering::Relaxed)
    }

    /// Current backoff interval (zero when healthy)
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms.load(Ordering::Relaxed))
    }

    /// Time left until the node's backoff expires
    pub fn remaining_backoff(&self) -> Duration {
        let until = self.backoff_until_ms.load(Ordering::Relaxed);
        Duration::from_millis(until.saturating_sub(monotonic_ms()))
    }

    pub fn is_healthy(&self) -> bool {
        self.remaining_backoff().is_zero()
    }

    /// Failure: double the backoff interval (first failure uses `min`),
    /// capped at `max`, and lower health.
    pub fn record_failure(&self, min: Duration, max: Duration) -> Duration {
        let min_ms = min.as_millis() as u64;
        let max_ms = (max.as_millis() as u64).max(min_ms);

        let previous = self
            .backoff_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(next_backoff_ms(current, min_ms, max_ms))
            })
            .unwrap_or_else(|current| current);
        let backoff_ms = next_backoff_ms(previous, min_ms, max_ms);

        self.backoff_until_ms
            .store(monotonic_ms().saturating_add(backoff_ms), Ordering::SeqCst);
        let _ = self
            .health
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |h| {
                Some(h.saturating_sub(FAILURE_PENALTY).max(MIN_HEALTH))
            });

        Duration::from_millis(backoff_ms)
    }

    /// Success: clear the backoff and restore health
    pub fn record_success(&self) {
        self.backoff_ms.store(0, Ordering::SeqCst);
        self.backoff_until_ms.store(0, Ordering::SeqCst);
        let _ = self
            .health
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |h| {
                Some(h.max(INITIAL_HEALTH).min(MAX_HEALTH))
            });
    }

    /// Copy health and backoff from the node this one replaces
    pub(crate) fn inherit_state(&self, previous: &Node) {
        self.health.store(previous.health(), Ordering::SeqCst);
        self.backoff_ms
            .store(previous.backoff_ms.load(Ordering::SeqCst), Ordering::SeqCst);
        self.backoff_until_ms.store(
            previous.backoff_until_ms.load(Ordering::SeqCst),
            Ordering::SeqCst,
        );
    }
}

fn next_backoff_ms(current: u64, min_ms: u64, max_ms: u64) -> u64 {
    if current == 0 {
        min_ms
    } else {
        current.saturating_mul(2).clamp(min_ms, max_ms)
    }
}
