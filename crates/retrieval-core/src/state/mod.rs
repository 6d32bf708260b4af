//! State management for retrieval orders.
//!
//! The state machine is the only writer of order records. Every mutation runs
//! under a per-order lock, so two concurrent actions on one order serialise
//! and the second observes the first one's result.

pub mod order;
pub mod reference;

pub use order::{OrderStateError, OrderStateMachine, AUTO_ESCALATION_REASON};
pub use reference::ReferenceSequence;
