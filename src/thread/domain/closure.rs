//! Pending-closure records and close requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identity of the staff member who requested a closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloserIdentity {
    /// Platform identifier of the closer.
    pub id: u64,
    /// Display name of the closer.
    pub name: String,
}

impl CloserIdentity {
    /// Creates a closer identity.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Returns the mention token for this closer.
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A persisted, cancellable record of an armed delayed close.
///
/// Presence of this record against a thread means a delayed close is armed;
/// the record survives process restarts through the config store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingClosure {
    /// Absolute instant the closure fires.
    pub fire_at: DateTime<Utc>,
    /// Staff member who armed the closure.
    pub closer: CloserIdentity,
    /// Suppress the closing notice to the correspondent.
    pub silent: bool,
    /// Delete the backing channel on close.
    pub delete_channel: bool,
    /// Custom closing message, when one was given.
    pub message: Option<String>,
}

/// Parameter object for closing a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRequest {
    closer: CloserIdentity,
    delay: Duration,
    silent: bool,
    delete_channel: bool,
    message: Option<String>,
}

impl CloseRequest {
    /// Creates an immediate, non-silent close request that deletes the
    /// backing channel.
    #[must_use]
    pub const fn new(closer: CloserIdentity) -> Self {
        Self {
            closer,
            delay: Duration::ZERO,
            silent: false,
            delete_channel: true,
            message: None,
        }
    }

    /// Defers the close by the given delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Suppresses the closing notice to the correspondent.
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Keeps the backing channel after the close.
    #[must_use]
    pub const fn keep_channel(mut self) -> Self {
        self.delete_channel = false;
        self
    }

    /// Sets a custom closing message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns the closer identity.
    #[must_use]
    pub const fn closer(&self) -> &CloserIdentity {
        &self.closer
    }

    /// Returns the requested delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns whether the correspondent notice is suppressed.
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        self.silent
    }

    /// Returns whether the backing channel is deleted on close.
    #[must_use]
    pub const fn deletes_channel(&self) -> bool {
        self.delete_channel
    }

    /// Returns the custom closing message, when one was given.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Converts the request into the record persisted while the timer is
    /// armed.
    #[must_use]
    pub fn into_pending(self, fire_at: DateTime<Utc>) -> PendingClosure {
        PendingClosure {
            fire_at,
            closer: self.closer,
            silent: self.silent,
            delete_channel: self.delete_channel,
            message: self.message,
        }
    }
}

impl From<PendingClosure> for CloseRequest {
    /// Rebuilds the immediate-close request equivalent of a recovered
    /// pending record.
    fn from(pending: PendingClosure) -> Self {
        Self {
            closer: pending.closer,
            delay: Duration::ZERO,
            silent: pending.silent,
            delete_channel: pending.delete_channel,
            message: pending.message,
        }
    }
}
