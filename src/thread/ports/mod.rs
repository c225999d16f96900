//! Port contracts for the external collaborators of the relay engine.
//!
//! The chat transport, the durable config store, and the audit-log service
//! are consumed as interfaces only; their concrete behavior lives behind
//! these traits.

pub mod audit;
pub mod config;
pub mod transport;

pub use audit::{AuditLog, AuditLogError, AuditResult, CloseReport, ClosedLog, LogEntry, LogSummary};
pub use config::{ConfigError, ConfigResult, ConfigStore};
pub use transport::{ChatTransport, PostedCard, TransportError, TransportResult};
