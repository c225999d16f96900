//! Chat transport port: channel, message, and directory operations.

use crate::thread::domain::{
    ChannelRef, CorrespondentId, CorrespondentProfile, Destination, MessageCard, MessageRef,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A card previously posted at some endpoint, as seen by a history scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedCard {
    /// Handle to the posted message.
    pub message: MessageRef,
    /// The card it carries.
    pub card: MessageCard,
}

/// Chat-platform transport contract.
///
/// Covers the channel, message, and directory operations the relay engine
/// consumes. History scans return the most recent entries first.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Creates a staff-side channel with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Provisioning`] when the platform rejects
    /// channel creation.
    async fn create_channel(&self, name: &str) -> TransportResult<ChannelRef>;

    /// Sets a channel's topic string. Best-effort on the platform side; a
    /// success here does not guarantee the topic is later readable.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Provisioning`] when the write is rejected.
    async fn set_topic(&self, channel: ChannelRef, topic: &str) -> TransportResult<()>;

    /// Reads a channel's topic string.
    ///
    /// Returns `None` when the channel has no topic.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownChannel`] when the channel does not
    /// exist.
    async fn channel_topic(&self, channel: ChannelRef) -> TransportResult<Option<String>>;

    /// Deletes a channel.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownChannel`] when the channel does not
    /// exist.
    async fn delete_channel(&self, channel: ChannelRef) -> TransportResult<()>;

    /// Returns the names of all existing staff-side channels.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Delivery`] when the listing fails.
    async fn channel_names(&self) -> TransportResult<Vec<String>>;

    /// Returns handles to all existing staff-side channels, used for
    /// startup cache population.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Delivery`] when the listing fails.
    async fn channels(&self) -> TransportResult<Vec<ChannelRef>>;

    /// Finds a channel whose topic is exactly the given string.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Delivery`] when the lookup fails.
    async fn find_channel_by_topic(&self, topic: &str) -> TransportResult<Option<ChannelRef>>;

    /// Sends a card to a destination, optionally preceded by mention text.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Delivery`] when the send fails.
    async fn send_card(
        &self,
        destination: Destination,
        mentions: Option<&str>,
        card: &MessageCard,
    ) -> TransportResult<MessageRef>;

    /// Replaces the card carried by an existing message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownMessage`] when the message no longer
    /// exists.
    async fn edit_card(
        &self,
        destination: Destination,
        message: MessageRef,
        card: &MessageCard,
    ) -> TransportResult<()>;

    /// Deletes a message from a destination.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownMessage`] when the message no longer
    /// exists.
    async fn delete_message(
        &self,
        destination: Destination,
        message: MessageRef,
    ) -> TransportResult<()>;

    /// Returns up to `limit` recent cards from a destination, most recent
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Delivery`] when the scan fails.
    async fn history(
        &self,
        destination: Destination,
        limit: usize,
    ) -> TransportResult<Vec<PostedCard>>;

    /// Pins a message in a channel.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownMessage`] when the message no longer
    /// exists.
    async fn pin_message(&self, channel: ChannelRef, message: MessageRef) -> TransportResult<()>;

    /// Resolves a correspondent's profile.
    ///
    /// Returns `None` when the correspondent shares no common context with
    /// the staff workspace and is thus unreachable.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Delivery`] when the directory lookup fails.
    async fn resolve_correspondent(
        &self,
        id: CorrespondentId,
    ) -> TransportResult<Option<CorrespondentProfile>>;
}

/// Errors returned by transport implementations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Channel provisioning (creation or topic write) was rejected.
    #[error("channel provisioning failed: {0}")]
    Provisioning(String),

    /// The referenced channel does not exist.
    #[error("unknown channel: {0}")]
    UnknownChannel(ChannelRef),

    /// The referenced message does not exist.
    #[error("unknown message: {0}")]
    UnknownMessage(MessageRef),

    /// A delivery or lookup failed at the platform boundary.
    #[error("transport delivery error: {0}")]
    Delivery(Arc<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wraps a platform-level delivery error.
    pub fn delivery(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Delivery(Arc::new(err))
    }
}
