//! Common types for the records retrieval service.
//!
//! This crate defines the data model shared by every other crate in the
//! workspace: retrieval orders and their lines, the customer and rate records
//! consumed from the directory, audit entries, events, storage keys, and the
//! HTTP request/response shapes.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Audit trail entries appended on every order mutation.
pub mod audit;
/// Customer and billing rate records.
pub mod customer;
/// Event types for inter-component communication.
pub mod events;
/// Retrieval order, line and lifecycle enums.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage namespaces.
pub mod storage;
/// Formatting helpers.
pub mod utils;
/// Configuration validation types for backend-specific TOML tables.
pub mod validation;

pub use api::*;
pub use audit::*;
pub use customer::*;
pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::{format_duration, truncate_id};
pub use validation::*;
