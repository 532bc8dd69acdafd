use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::{QueryCache, Resource};

/// Default period of the background refresh.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Families every trigger refreshes: the record lists and their statistics.
pub const BROADCAST_FAMILIES: [Resource; 4] = [
    Resource::Cars,
    Resource::Owners,
    Resource::CarStatistics,
    Resource::OwnerStatistics,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// The terminal regained focus.
    FocusGained,
    Interval,
    /// The user switched tabs.
    Navigation,
}

/// Decides what a refresh trigger invalidates.
pub trait RefreshPolicy: Send + Sync {
    fn on_trigger(&self, trigger: RefreshTrigger, cache: &QueryCache);
}

/// Invalidates the same fixed set of families on every trigger.
#[derive(Debug, Clone)]
pub struct BroadcastRefresh {
    families: Vec<Resource>,
}

impl Default for BroadcastRefresh {
    fn default() -> Self {
        Self {
            families: BROADCAST_FAMILIES.to_vec(),
        }
    }
}

impl RefreshPolicy for BroadcastRefresh {
    fn on_trigger(&self, trigger: RefreshTrigger, cache: &QueryCache) {
        let marked: usize = self.families.iter().map(|f| cache.invalidate(*f)).sum();
        debug!(?trigger, marked, "Refresh triggered");
    }
}

/// Fires once per interval when polled from the event loop.
#[derive(Debug)]
pub struct RefreshTicker {
    interval: Duration,
    last: Instant,
}

impl RefreshTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True when a full interval has passed since the last tick.
    pub fn poll(&mut self) -> bool {
        if self.interval.is_zero() {
            return false;
        }
        let now = Instant::now();
        if now.duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{QueryKey, QueryOptions};

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_invalidates_record_families_only() {
        let cache = QueryCache::new();
        let options = QueryOptions::default();
        for resource in [Resource::Cars, Resource::OwnerStatistics, Resource::Users] {
            cache
                .fetch(&QueryKey::new(resource), &options, || async {
                    Ok::<_, anyhow::Error>(1u8)
                })
                .await
                .unwrap();
        }

        let policy = BroadcastRefresh::default();
        policy.on_trigger(RefreshTrigger::FocusGained, &cache);

        let mut calls = 0;
        for resource in [Resource::Cars, Resource::OwnerStatistics, Resource::Users] {
            cache
                .fetch(&QueryKey::new(resource), &options, || {
                    calls += 1;
                    async { Ok::<_, anyhow::Error>(2u8) }
                })
                .await
                .unwrap();
        }
        // Users is outside the broadcast set and still fresh
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_fires_once_per_interval() {
        let mut ticker = RefreshTicker::new(DEFAULT_REFRESH_INTERVAL);
        assert!(!ticker.poll());

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!ticker.poll());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(ticker.poll());
        assert!(!ticker.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_disables_ticker() {
        let mut ticker = RefreshTicker::new(Duration::ZERO);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!ticker.poll());
    }
}
