//! Persisted UI state.
//!
//! One JSON file per key under the application data directory. Values are
//! read once when a `Persisted` is created and written back synchronously on
//! every change; a missing or unreadable file yields the caller's default.

pub mod persisted;

pub use persisted::{Persisted, PersistedStore};

/// Search filters, sort and page of the cars tab.
pub const CARS_SEARCH_STATE_KEY: &str = "carsSearchState";

/// Search term of the owners tab.
pub const OWNERS_SEARCH_TERM_KEY: &str = "ownersSearchTerm";
