//! Durable config store port: pending closures, subscriptions, and the
//! one-shot notification list.
//!
//! Every mutation is durable when the call returns; the original system's
//! explicit flush is folded into each operation. Callers await these calls
//! and treat failures as fatal for the operation in progress.

use crate::thread::domain::{CorrespondentId, PendingClosure};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for config-store operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Durable key-value persistence contract for thread-scoped state.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Returns the pending-closure record for a thread, when one is armed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Persistence`] when the read fails.
    async fn pending_closure(&self, id: CorrespondentId) -> ConfigResult<Option<PendingClosure>>;

    /// Persists a pending-closure record, replacing any prior record.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Persistence`] when the write fails.
    async fn store_pending_closure(
        &self,
        id: CorrespondentId,
        record: &PendingClosure,
    ) -> ConfigResult<()>;

    /// Removes and returns the pending-closure record for a thread.
    ///
    /// Removal of an absent record is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Persistence`] when the write fails.
    async fn remove_pending_closure(
        &self,
        id: CorrespondentId,
    ) -> ConfigResult<Option<PendingClosure>>;

    /// Returns all persisted pending-closure records, used for restart
    /// recovery.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Persistence`] when the read fails.
    async fn pending_closures(&self) -> ConfigResult<Vec<(CorrespondentId, PendingClosure)>>;

    /// Returns the persisted subscription mention tokens for a thread.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Persistence`] when the read fails.
    async fn subscriptions(&self, id: CorrespondentId) -> ConfigResult<Vec<String>>;

    /// Drops the subscription list for a thread.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Persistence`] when the write fails.
    async fn remove_subscriptions(&self, id: CorrespondentId) -> ConfigResult<()>;

    /// Returns and durably clears the one-shot notify-on-next-reply mention
    /// tokens for a thread.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Persistence`] when the read or the clearing
    /// write fails.
    async fn take_notification_squad(&self, id: CorrespondentId) -> ConfigResult<Vec<String>>;
}

/// Errors returned by config-store implementations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Persistence-layer failure.
    #[error("config persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ConfigError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
