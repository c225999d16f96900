//! In-memory adapters for the thread ports.
//!
//! Thread-safe fakes recording every side effect, used by service and
//! integration tests and for embedding the engine without external
//! services. Failure-injection switches drive the error paths.

mod audit;
mod config;
mod transport;

pub use audit::InMemoryAuditLog;
pub use config::InMemoryConfigStore;
pub use transport::{InMemoryTransport, SentRecord};
