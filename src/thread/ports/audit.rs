//! Audit-log service port: archived logs and per-message append.

use crate::thread::domain::{ChannelRef, CloserIdentity, CorrespondentId, InboundMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Result type for audit-log operations.
pub type AuditResult<T> = Result<T, AuditLogError>;

/// Closure metadata sent to the audit service when a thread finalizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReport {
    /// Instant the thread was closed.
    pub closed_at: DateTime<Utc>,
    /// Staff member who closed the thread.
    pub closer: CloserIdentity,
}

/// The archived log returned by a successful close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedLog {
    /// Stable key of the archived log.
    pub key: String,
    /// Browsable URL of the archived log.
    pub url: String,
    /// Content of the first archived message, when any exists.
    pub first_message: Option<String>,
}

/// One relayed message appended to the remote log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Platform identifier of the author.
    pub author_id: u64,
    /// Author display name.
    pub author_name: String,
    /// Message text.
    pub content: String,
    /// Number of attachments carried.
    pub attachment_count: usize,
    /// Creation instant of the source message.
    pub created_at: DateTime<Utc>,
    /// Correspondent the entry belongs to, when the destination does not
    /// identify it.
    pub destination: Option<CorrespondentId>,
}

impl LogEntry {
    /// Builds a log entry from an inbound message.
    #[must_use]
    pub fn from_message(message: &InboundMessage, destination: Option<CorrespondentId>) -> Self {
        Self {
            author_id: message.author.id,
            author_name: message.author.name.clone(),
            content: message.content.clone(),
            attachment_count: message.attachments.len(),
            created_at: message.created_at,
            destination,
        }
    }
}

/// Summary of one archived log, used for past-thread counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSummary {
    /// Stable key of the log.
    pub key: String,
    /// Whether the log's thread is still open.
    pub open: bool,
}

/// External log-archival contract.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Marks the remote log for a channel closed.
    ///
    /// # Errors
    ///
    /// Returns [`AuditLogError::Rejected`] when the service answers with an
    /// error payload instead of a log record; a close in progress must abort
    /// before any destructive step when this happens.
    async fn post_log(&self, channel: ChannelRef, report: &CloseReport) -> AuditResult<ClosedLog>;

    /// Appends one relayed message to the remote log.
    ///
    /// Callers dispatch appends fire-and-forget; failures are logged and
    /// swallowed.
    ///
    /// # Errors
    ///
    /// Returns [`AuditLogError::Unavailable`] when the service cannot be
    /// reached.
    async fn append_log(&self, entry: &LogEntry) -> AuditResult<()>;

    /// Returns the browsable URL the archived log will have.
    ///
    /// # Errors
    ///
    /// Returns [`AuditLogError::Unavailable`] when the service cannot be
    /// reached.
    async fn log_url(
        &self,
        correspondent: CorrespondentId,
        channel: ChannelRef,
        creator_id: u64,
    ) -> AuditResult<String>;

    /// Returns summaries of all logs recorded for a correspondent.
    ///
    /// # Errors
    ///
    /// Returns [`AuditLogError::Unavailable`] when the service cannot be
    /// reached.
    async fn user_logs(&self, correspondent: CorrespondentId) -> AuditResult<Vec<LogSummary>>;
}

/// Errors returned by audit-log implementations.
#[derive(Debug, Clone, Error)]
pub enum AuditLogError {
    /// The service answered with an error payload.
    #[error("audit log rejected the request: {0}")]
    Rejected(String),

    /// The service could not be reached.
    #[error("audit log unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl AuditLogError {
    /// Wraps a connectivity error.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
