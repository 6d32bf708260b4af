//! API implementations for the retrieval service.

pub mod orders;
