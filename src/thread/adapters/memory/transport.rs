//! In-memory chat transport for thread lifecycle tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::thread::{
    domain::{
        ChannelRef, CorrespondentId, CorrespondentProfile, Destination, MessageCard, MessageRef,
    },
    ports::{ChatTransport, PostedCard, TransportError, TransportResult},
};

/// One delivery recorded by the fake transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecord {
    /// Handle assigned to the delivered message.
    pub message: MessageRef,
    /// Mention text sent ahead of the card, when any.
    pub mentions: Option<String>,
    /// The delivered card.
    pub card: MessageCard,
}

#[derive(Debug, Default)]
struct ChannelState {
    name: String,
    topic: Option<String>,
    pinned: Vec<MessageRef>,
}

#[derive(Debug, Default)]
struct TransportState {
    next_id: u64,
    channels: HashMap<ChannelRef, ChannelState>,
    messages: HashMap<Destination, Vec<SentRecord>>,
    profiles: HashMap<CorrespondentId, CorrespondentProfile>,
    deleted: Vec<(Destination, MessageRef)>,
    fail_channel_creation: bool,
    fail_sends: bool,
}

impl TransportState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id + 1000
    }
}

/// Thread-safe in-memory chat transport.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<RwLock<TransportState>>,
}

fn lock_error(err: impl std::fmt::Display) -> TransportError {
    TransportError::delivery(std::io::Error::other(err.to_string()))
}

impl InMemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolvable correspondent profile.
    pub fn register_profile(&self, profile: CorrespondentProfile) {
        if let Ok(mut state) = self.state.write() {
            state.profiles.insert(profile.id, profile);
        }
    }

    /// Seeds an existing channel, returning its handle.
    pub fn preload_channel(&self, name: &str, topic: Option<&str>) -> ChannelRef {
        self.state.write().map_or(ChannelRef::from_u64(0), |mut state| {
            let channel = ChannelRef::from_u64(state.allocate());
            state.channels.insert(
                channel,
                ChannelState {
                    name: name.to_owned(),
                    topic: topic.map(str::to_owned),
                    pinned: Vec::new(),
                },
            );
            channel
        })
    }

    /// Seeds a previously posted card at a destination, returning its
    /// message handle.
    pub fn preload_card(&self, destination: Destination, card: MessageCard) -> MessageRef {
        self.state.write().map_or(MessageRef::from_u64(0), |mut state| {
            let message = MessageRef::from_u64(state.allocate());
            state.messages.entry(destination).or_default().push(SentRecord {
                message,
                mentions: None,
                card,
            });
            message
        })
    }

    /// Returns every delivery made to a destination, oldest first.
    #[must_use]
    pub fn sent(&self, destination: Destination) -> Vec<SentRecord> {
        self.state
            .read()
            .map(|state| state.messages.get(&destination).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Returns `true` while the channel exists.
    #[must_use]
    pub fn channel_exists(&self, channel: ChannelRef) -> bool {
        self.state
            .read()
            .map(|state| state.channels.contains_key(&channel))
            .unwrap_or_default()
    }

    /// Returns the recorded topic of a channel.
    #[must_use]
    pub fn topic_of(&self, channel: ChannelRef) -> Option<String> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.channels.get(&channel).and_then(|c| c.topic.clone()))
    }

    /// Returns the messages pinned in a channel.
    #[must_use]
    pub fn pinned_in(&self, channel: ChannelRef) -> Vec<MessageRef> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.channels.get(&channel).map(|c| c.pinned.clone()))
            .unwrap_or_default()
    }

    /// Returns every deletion performed, in order.
    #[must_use]
    pub fn deletions(&self) -> Vec<(Destination, MessageRef)> {
        self.state
            .read()
            .map(|state| state.deleted.clone())
            .unwrap_or_default()
    }

    /// Makes subsequent channel creations fail.
    pub fn fail_channel_creation(&self, fail: bool) {
        if let Ok(mut state) = self.state.write() {
            state.fail_channel_creation = fail;
        }
    }

    /// Makes subsequent card sends fail.
    pub fn fail_sends(&self, fail: bool) {
        if let Ok(mut state) = self.state.write() {
            state.fail_sends = fail;
        }
    }
}

#[async_trait]
impl ChatTransport for InMemoryTransport {
    async fn create_channel(&self, name: &str) -> TransportResult<ChannelRef> {
        let mut state = self.state.write().map_err(lock_error)?;
        if state.fail_channel_creation {
            return Err(TransportError::Provisioning(format!(
                "channel creation disabled: {name}"
            )));
        }
        let channel = ChannelRef::from_u64(state.allocate());
        state.channels.insert(
            channel,
            ChannelState {
                name: name.to_owned(),
                topic: None,
                pinned: Vec::new(),
            },
        );
        Ok(channel)
    }

    async fn set_topic(&self, channel: ChannelRef, topic: &str) -> TransportResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let entry = state
            .channels
            .get_mut(&channel)
            .ok_or(TransportError::UnknownChannel(channel))?;
        entry.topic = Some(topic.to_owned());
        Ok(())
    }

    async fn channel_topic(&self, channel: ChannelRef) -> TransportResult<Option<String>> {
        let state = self.state.read().map_err(lock_error)?;
        state
            .channels
            .get(&channel)
            .map(|entry| entry.topic.clone())
            .ok_or(TransportError::UnknownChannel(channel))
    }

    async fn delete_channel(&self, channel: ChannelRef) -> TransportResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state
            .channels
            .remove(&channel)
            .map(|_| ())
            .ok_or(TransportError::UnknownChannel(channel))
    }

    async fn channel_names(&self) -> TransportResult<Vec<String>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .channels
            .values()
            .map(|entry| entry.name.clone())
            .collect())
    }

    async fn channels(&self) -> TransportResult<Vec<ChannelRef>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.channels.keys().copied().collect())
    }

    async fn find_channel_by_topic(&self, topic: &str) -> TransportResult<Option<ChannelRef>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .channels
            .iter()
            .find(|(_, entry)| entry.topic.as_deref() == Some(topic))
            .map(|(channel, _)| *channel))
    }

    async fn send_card(
        &self,
        destination: Destination,
        mentions: Option<&str>,
        card: &MessageCard,
    ) -> TransportResult<MessageRef> {
        let mut state = self.state.write().map_err(lock_error)?;
        if state.fail_sends {
            return Err(TransportError::delivery(std::io::Error::other(
                "sends disabled",
            )));
        }
        let message = MessageRef::from_u64(state.allocate());
        state.messages.entry(destination).or_default().push(SentRecord {
            message,
            mentions: mentions.map(str::to_owned),
            card: card.clone(),
        });
        Ok(message)
    }

    async fn edit_card(
        &self,
        destination: Destination,
        message: MessageRef,
        card: &MessageCard,
    ) -> TransportResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let records = state
            .messages
            .get_mut(&destination)
            .ok_or(TransportError::UnknownMessage(message))?;
        let record = records
            .iter_mut()
            .find(|record| record.message == message)
            .ok_or(TransportError::UnknownMessage(message))?;
        record.card = card.clone();
        Ok(())
    }

    async fn delete_message(
        &self,
        destination: Destination,
        message: MessageRef,
    ) -> TransportResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.deleted.push((destination, message));
        if let Some(records) = state.messages.get_mut(&destination) {
            records.retain(|record| record.message != message);
        }
        Ok(())
    }

    async fn history(
        &self,
        destination: Destination,
        limit: usize,
    ) -> TransportResult<Vec<PostedCard>> {
        let state = self.state.read().map_err(lock_error)?;
        let records = state.messages.get(&destination).cloned().unwrap_or_default();
        Ok(records
            .into_iter()
            .rev()
            .take(limit)
            .map(|record| PostedCard {
                message: record.message,
                card: record.card,
            })
            .collect())
    }

    async fn pin_message(&self, channel: ChannelRef, message: MessageRef) -> TransportResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let entry = state
            .channels
            .get_mut(&channel)
            .ok_or(TransportError::UnknownChannel(channel))?;
        entry.pinned.push(message);
        Ok(())
    }

    async fn resolve_correspondent(
        &self,
        id: CorrespondentId,
    ) -> TransportResult<Option<CorrespondentProfile>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.profiles.get(&id).cloned())
    }
}
