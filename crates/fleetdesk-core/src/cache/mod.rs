//! In-memory query cache for backend data.
//!
//! This module provides:
//! - `QueryCache`: deduplicating cache with freshness and retention windows
//! - `QueryObserver`: per-view subscriber with keep-previous-data
//! - `QueryKey` / `Resource`: resource family + serialized parameters
//! - `RefreshPolicy`: maps focus, interval and navigation triggers to invalidations
//!
//! Data is stale (served, refreshed in the background) after `stale_time`
//! and evicted after `cache_time`, both measured from the last successful
//! fetch. Defaults are 2 and 10 minutes.

pub mod observer;
pub mod query;
pub mod refresh;
pub mod resource;

pub use observer::QueryObserver;
pub use query::{QueryCache, QueryError, QueryOptions, QueryState};
pub use refresh::{BroadcastRefresh, RefreshPolicy, RefreshTicker, RefreshTrigger};
pub use resource::{QueryKey, Resource};
