//! Core engine for the records retrieval service.
//!
//! Ties together the order state machine, the SLA escalation monitor and the
//! collaborators they are given at construction: a clock, an audit log, the
//! customer and rate directory, and storage. The engine runs the periodic
//! sweeps; the builder wires everything from configuration.

pub mod audit;
pub mod builder;
pub mod clock;
pub mod directory;
pub mod engine;
pub mod monitoring;
pub mod sla;
pub mod state;

pub use audit::{AuditError, AuditLog, StorageAuditLog, TracingAuditLog};
pub use builder::{BuilderError, EngineBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::{ConfigDirectory, CustomerDirectory, DirectoryError, RateProvider};
pub use engine::{event_bus::EventBus, EngineError, RetrievalEngine};
pub use monitoring::{EscalationMonitor, EscalationReport, MonitorError};
pub use state::{OrderStateError, OrderStateMachine};
