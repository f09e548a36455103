//! Tenant configuration cache.
//!
//! Entries are never expired individually: the whole cache is dropped once per
//! sweep period. An entry therefore lives anywhere between zero and one full
//! period. Concurrent readers and writers are last-writer-wins.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Remote configuration payload as returned by the policy service.
pub type RemoteConfig = Map<String, Value>;

/// Source of "now" for sweep bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub struct ConfigCache {
    entries: DashMap<String, Arc<RemoteConfig>>,
    clock: Arc<dyn Clock>,
    period: Duration,
    last_sweep: Mutex<Instant>,
}

impl ConfigCache {
    pub fn new(period: Duration) -> Self {
        Self::with_clock(period, Arc::new(SystemClock))
    }

    pub fn with_clock(period: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self { entries: DashMap::new(), clock, period, last_sweep: Mutex::new(now) }
    }

    /// Cache sized from `CONFIG_CACHE_MINUTES`.
    pub fn from_minutes(minutes: u64) -> Self {
        Self::new(Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn get(&self, tenant: &str) -> Option<Arc<RemoteConfig>> {
        self.sweep_if_due();
        self.entries.get(tenant).map(|entry| Arc::clone(entry.value()))
    }

    pub fn insert(&self, tenant: &str, config: RemoteConfig) {
        self.sweep_if_due();
        tracing::debug!("[ConfigCache] Caching config for tenant");
        self.entries.insert(tenant.to_string(), Arc::new(config));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and restart the period.
    pub fn sweep(&self) {
        let cleared = self.entries.len();
        self.entries.clear();
        *self.last_sweep.lock() = self.clock.now();
        if cleared > 0 {
            tracing::debug!("[ConfigCache] Swept {} cached tenant configs", cleared);
        }
    }

    fn sweep_if_due(&self) {
        let due = {
            let last = self.last_sweep.lock();
            self.clock.now().saturating_duration_since(*last) >= self.period
        };
        if due {
            self.sweep();
        }
    }
}

/// Start the periodic sweep as a background tokio task.
pub fn spawn_sweeper(cache: Arc<ConfigCache>) -> JoinHandle<()> {
    let period = cache.period();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            cache.sweep();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Clock advanced by hand.
    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self { now: Mutex::new(Instant::now()) }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock()
        }
    }

    fn remote(base: &str) -> RemoteConfig {
        json!({"LLM_API_BASE_PATH": base, "CACHE_ENABLED": true})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        assert!(cache.get("tenant").is_none());

        cache.insert("tenant", remote("https://a"));
        let hit = cache.get("tenant").unwrap();
        assert_eq!(hit["LLM_API_BASE_PATH"], "https://a");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = ConfigCache::new(Duration::from_secs(60));
        cache.insert("tenant", remote("https://a"));
        cache.insert("tenant", remote("https://b"));
        assert_eq!(cache.get("tenant").unwrap()["LLM_API_BASE_PATH"], "https://b");
    }

    #[test]
    fn test_bulk_expiry_after_period() {
        let clock = Arc::new(ManualClock::new());
        let cache = ConfigCache::with_clock(Duration::from_secs(300), clock.clone());

        cache.insert("early", remote("https://a"));
        clock.advance(Duration::from_secs(290));
        cache.insert("late", remote("https://b"));
        assert_eq!(cache.len(), 2);

        // Both entries go together, even though "late" is only 10s old
        clock.advance(Duration::from_secs(10));
        assert!(cache.get("late").is_none());
        assert!(cache.get("early").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_restarts_period() {
        let clock = Arc::new(ManualClock::new());
        let cache = ConfigCache::with_clock(Duration::from_secs(60), clock.clone());

        clock.advance(Duration::from_secs(59));
        cache.sweep();
        cache.insert("tenant", remote("https://a"));

        clock.advance(Duration::from_secs(59));
        assert!(cache.get("tenant").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_clears_cache() {
        let cache = Arc::new(ConfigCache::new(Duration::from_secs(60)));
        cache.insert("tenant", remote("https://a"));

        let handle = spawn_sweeper(cache.clone());
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(cache.is_empty());
        handle.abort();
    }
}
