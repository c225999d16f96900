//! Service-level errors for thread lifecycle operations.

use crate::thread::{
    domain::{CorrespondentId, ThreadDomainError},
    ports::{AuditLogError, ConfigError, TransportError},
};
use thiserror::Error;

/// Result type for thread service operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Errors raised by thread lifecycle and relay services.
#[derive(Debug, Clone, Error)]
pub enum ThreadError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] ThreadDomainError),

    /// Transport operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Config-store operation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The audit-log write during finalization failed; the close was
    /// aborted before any destructive step and the thread remains open.
    #[error("closure aborted, audit log failed: {0}")]
    Audit(#[source] AuditLogError),

    /// The thread's backing channel has not been provisioned yet.
    #[error("thread channel is not provisioned")]
    ChannelUnavailable,

    /// A live thread already exists for the correspondent.
    #[error("a thread for correspondent {0} already exists")]
    AlreadyRegistered(CorrespondentId),
}
