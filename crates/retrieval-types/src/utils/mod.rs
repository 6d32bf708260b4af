//! Utility functions shared across crates.

pub mod formatting;

pub use formatting::{format_duration, truncate_id};
