//! In-memory audit-log service for thread lifecycle tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::thread::{
    domain::{ChannelRef, CorrespondentId},
    ports::{
        AuditLog, AuditLogError, AuditResult, CloseReport, ClosedLog, LogEntry, LogSummary,
    },
};

#[derive(Debug, Default)]
struct AuditState {
    appended: Vec<LogEntry>,
    closed: Vec<(ChannelRef, CloseReport)>,
    user_logs: HashMap<CorrespondentId, Vec<LogSummary>>,
    next_key: u64,
    first_message: Option<String>,
    reject_posts: Option<String>,
}

/// Thread-safe in-memory audit-log service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    state: Arc<RwLock<AuditState>>,
}

fn lock_error(err: impl std::fmt::Display) -> AuditLogError {
    AuditLogError::unavailable(std::io::Error::other(err.to_string()))
}

impl InMemoryAuditLog {
    /// Creates an empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds past log summaries for a correspondent.
    pub fn seed_user_logs(&self, id: CorrespondentId, logs: Vec<LogSummary>) {
        if let Ok(mut state) = self.state.write() {
            state.user_logs.insert(id, logs);
        }
    }

    /// Sets the first-message preview returned by subsequent closes.
    pub fn set_first_message(&self, content: impl Into<String>) {
        if let Ok(mut state) = self.state.write() {
            state.first_message = Some(content.into());
        }
    }

    /// Makes subsequent close posts answer with an error payload.
    pub fn reject_posts(&self, reason: Option<&str>) {
        if let Ok(mut state) = self.state.write() {
            state.reject_posts = reason.map(str::to_owned);
        }
    }

    /// Returns every appended entry, in order.
    #[must_use]
    pub fn appended(&self) -> Vec<LogEntry> {
        self.state
            .read()
            .map(|state| state.appended.clone())
            .unwrap_or_default()
    }

    /// Returns every successful close report, in order.
    #[must_use]
    pub fn closed(&self) -> Vec<(ChannelRef, CloseReport)> {
        self.state
            .read()
            .map(|state| state.closed.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn post_log(&self, channel: ChannelRef, report: &CloseReport) -> AuditResult<ClosedLog> {
        let mut state = self.state.write().map_err(lock_error)?;
        if let Some(reason) = &state.reject_posts {
            return Err(AuditLogError::Rejected(reason.clone()));
        }
        state.next_key += 1;
        let key = format!("log-{}", state.next_key);
        state.closed.push((channel, report.clone()));
        Ok(ClosedLog {
            url: format!("https://logs.example.test/{key}"),
            key,
            first_message: state.first_message.clone(),
        })
    }

    async fn append_log(&self, entry: &LogEntry) -> AuditResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.appended.push(entry.clone());
        Ok(())
    }

    async fn log_url(
        &self,
        correspondent: CorrespondentId,
        channel: ChannelRef,
        _creator_id: u64,
    ) -> AuditResult<String> {
        Ok(format!(
            "https://logs.example.test/{correspondent}/{channel}"
        ))
    }

    async fn user_logs(&self, correspondent: CorrespondentId) -> AuditResult<Vec<LogSummary>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.user_logs.get(&correspondent).cloned().unwrap_or_default())
    }
}
