//! TTL-keyed dedupe store
//!
//! Answers "have I already accepted this key recently?". Keys combine
//! task id, chain and address so two tasks watching the same CA do not
//! suppress each other. Fails open: a broken dedupe layer must never
//! block alerting, a duplicate notification is the cheaper failure.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Default entry lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(900);
/// How often the lazy expiry sweep runs
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Injectable dedupe seam so tests can substitute fakes and production
/// can later swap persistence without touching the engine
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Atomic check-and-set: true if the key was recorded within its
    /// TTL, false (and records it) on first sight
    async fn seen(&self, key: &str, ttl: Duration) -> bool;
}

struct DedupeInner {
    entries: HashMap<String, Instant>,
    last_sweep: Instant,
}

/// In-memory `SeenStore` with a batched expiry sweep
pub struct MemoryDedupe {
    inner: Mutex<DedupeInner>,
    sweep_interval: Duration,
}

impl MemoryDedupe {
    pub fn new() -> Self {
        Self::with_sweep_interval(SWEEP_INTERVAL)
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(DedupeInner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            sweep_interval,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryDedupe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeenStore for MemoryDedupe {
    async fn seen(&self, key: &str, ttl: Duration) -> bool {
        // Sweep and check-and-set share one critical section so a
        // concurrent caller can never observe a half-updated map.
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        if now.duration_since(inner.last_sweep) >= self.sweep_interval {
            let before = inner.entries.len();
            inner.entries.retain(|_, expiry| *expiry > now);
            let expired = before - inner.entries.len();
            if expired > 0 {
                debug!("Swept {} expired dedupe entries", expired);
            }
            inner.last_sweep = now;
        }

        if let Some(expiry) = inner.entries.get(key) {
            if *expiry > now {
                debug!("Dedupe hit: {}", key);
                return true;
            }
        }

        inner.entries.insert(key.to_string(), now + ttl);
        false
    }
}

/// Compose the dedupe key for one task's interest in one token
pub fn dedupe_key(task_id: Option<&str>, chain: &str, address: &str) -> String {
    format!("{}:{}:{}", task_id.unwrap_or("global"), chain, address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_seen_then_hit() {
        let store = MemoryDedupe::new();
        assert!(!store.seen("t1:solana:mint", DEFAULT_TTL).await);
        assert!(store.seen("t1:solana:mint", DEFAULT_TTL).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_allows_reprocessing() {
        let store = MemoryDedupe::new();
        let ttl = Duration::from_secs(1);
        assert!(!store.seen("k", ttl).await);
        assert!(store.seen("k", ttl).await);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store.seen("k", ttl).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_bounds_memory_without_evicting_live_entries() {
        let store = MemoryDedupe::with_sweep_interval(Duration::from_secs(300));
        store.seen("short", Duration::from_secs(10)).await;
        store.seen("long", Duration::from_secs(3600)).await;
        assert_eq!(store.len().await, 2);

        // past the sweep interval, "short" is expired, "long" is not
        tokio::time::advance(Duration::from_secs(301)).await;
        store.seen("trigger", DEFAULT_TTL).await;
        assert_eq!(store.len().await, 2); // long + trigger
        assert!(store.seen("long", Duration::from_secs(3600)).await);
    }

    #[tokio::test]
    async fn test_concurrent_callers_exactly_one_first() {
        let store = Arc::new(MemoryDedupe::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.seen("contended", DEFAULT_TTL).await
            }));
        }
        let mut first_sightings = 0;
        for h in handles {
            if !h.await.unwrap() {
                first_sightings += 1;
            }
        }
        assert_eq!(first_sightings, 1);
    }

    #[test]
    fn test_dedupe_key_includes_task_identity() {
        assert_eq!(dedupe_key(Some("t1"), "solana", "mint"), "t1:solana:mint");
        assert_eq!(dedupe_key(None, "bsc", "0xabc"), "global:bsc:0xabc");
        assert_ne!(
            dedupe_key(Some("t1"), "solana", "mint"),
            dedupe_key(Some("t2"), "solana", "mint")
        );
    }
}
