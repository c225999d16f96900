//! Domain-level validation errors.

use thiserror::Error;

/// Errors raised by domain validation before any side effect is performed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThreadDomainError {
    /// A reply carried neither text content nor attachments.
    #[error("message has no content or attachments")]
    EmptyMessage,
}
