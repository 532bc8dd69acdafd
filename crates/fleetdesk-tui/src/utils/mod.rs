//! Display formatting helpers.

pub mod format;

pub use format::{format_age, format_count, format_price, truncate};
