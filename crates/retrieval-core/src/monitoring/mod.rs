//! Periodic monitoring of retrieval orders.
//!
//! The escalation sweep finds orders whose SLA has been breached and raises
//! their priority once. Scheduling is left to the engine.

pub mod escalation;

pub use escalation::{EscalationMonitor, EscalationReport, MonitorError};
