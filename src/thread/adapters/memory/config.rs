//! In-memory config store for thread lifecycle tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::thread::{
    domain::{CorrespondentId, PendingClosure},
    ports::{ConfigError, ConfigResult, ConfigStore},
};

#[derive(Debug, Default)]
struct ConfigState {
    closures: HashMap<CorrespondentId, PendingClosure>,
    subscriptions: HashMap<CorrespondentId, Vec<String>>,
    notification_squad: HashMap<CorrespondentId, Vec<String>>,
    fail_writes: bool,
}

/// Thread-safe in-memory config store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigStore {
    state: Arc<RwLock<ConfigState>>,
}

fn lock_error(err: impl std::fmt::Display) -> ConfigError {
    ConfigError::persistence(std::io::Error::other(err.to_string()))
}

impl InMemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the subscription list for a thread.
    pub fn set_subscriptions(&self, id: CorrespondentId, tokens: Vec<String>) {
        if let Ok(mut state) = self.state.write() {
            state.subscriptions.insert(id, tokens);
        }
    }

    /// Seeds the one-shot notification list for a thread.
    pub fn set_notification_squad(&self, id: CorrespondentId, tokens: Vec<String>) {
        if let Ok(mut state) = self.state.write() {
            state.notification_squad.insert(id, tokens);
        }
    }

    /// Seeds a persisted pending closure, as a restart recovery would find
    /// it.
    pub fn seed_pending_closure(&self, id: CorrespondentId, record: PendingClosure) {
        if let Ok(mut state) = self.state.write() {
            state.closures.insert(id, record);
        }
    }

    /// Returns the number of persisted pending closures.
    #[must_use]
    pub fn closure_count(&self) -> usize {
        self.state
            .read()
            .map(|state| state.closures.len())
            .unwrap_or_default()
    }

    /// Makes subsequent mutations fail.
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut state) = self.state.write() {
            state.fail_writes = fail;
        }
    }

    fn check_writable(state: &ConfigState) -> ConfigResult<()> {
        if state.fail_writes {
            return Err(ConfigError::persistence(std::io::Error::other(
                "writes disabled",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn pending_closure(&self, id: CorrespondentId) -> ConfigResult<Option<PendingClosure>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.closures.get(&id).cloned())
    }

    async fn store_pending_closure(
        &self,
        id: CorrespondentId,
        record: &PendingClosure,
    ) -> ConfigResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        Self::check_writable(&state)?;
        state.closures.insert(id, record.clone());
        Ok(())
    }

    async fn remove_pending_closure(
        &self,
        id: CorrespondentId,
    ) -> ConfigResult<Option<PendingClosure>> {
        let mut state = self.state.write().map_err(lock_error)?;
        Self::check_writable(&state)?;
        Ok(state.closures.remove(&id))
    }

    async fn pending_closures(&self) -> ConfigResult<Vec<(CorrespondentId, PendingClosure)>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .closures
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect())
    }

    async fn subscriptions(&self, id: CorrespondentId) -> ConfigResult<Vec<String>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.subscriptions.get(&id).cloned().unwrap_or_default())
    }

    async fn remove_subscriptions(&self, id: CorrespondentId) -> ConfigResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        Self::check_writable(&state)?;
        state.subscriptions.remove(&id);
        Ok(())
    }

    async fn take_notification_squad(&self, id: CorrespondentId) -> ConfigResult<Vec<String>> {
        let mut state = self.state.write().map_err(lock_error)?;
        Self::check_writable(&state)?;
        Ok(state.notification_squad.remove(&id).unwrap_or_default())
    }
}
