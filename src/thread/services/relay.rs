//! Message relay: builds and delivers the mirrored representation of one
//! inbound message.
//!
//! The relay classifies attachments and inline images, injects notification
//! tags for correspondent-authored messages, applies author-role styling,
//! appends the message to the external audit log, and performs best-effort
//! cleanup of the original.

use std::sync::Arc;

use crate::thread::{
    domain::{
        CardAuthor, CardField, CardTag, CorrespondentId, Destination, InboundMessage, MessageCard,
        MessageRef, classify,
    },
    ports::{AuditLog, ChatTransport, ConfigStore, LogEntry},
    services::ThreadResult,
};

/// Footer tag shown on cards mirrored from staff.
const STAFF_FOOTER: &str = "Moderator";
/// Footer tag shown on cards mirrored from the correspondent.
const CORRESPONDENT_FOOTER: &str = "User";

/// Parameters for one relay delivery.
#[derive(Debug, Clone, Copy)]
pub struct RelayParams<'a> {
    /// The inbound message being mirrored.
    pub message: &'a InboundMessage,
    /// Where the mirrored card is delivered.
    pub destination: Destination,
    /// The thread the message belongs to.
    pub thread_key: CorrespondentId,
    /// Whether the message was authored by staff.
    pub from_staff: bool,
}

/// Builds and delivers mirrored cards for one thread's messages.
#[derive(Clone)]
pub struct MessageRelay<T, S, L>
where
    T: ChatTransport,
    S: ConfigStore,
    L: AuditLog,
{
    transport: Arc<T>,
    config: Arc<S>,
    audit: Arc<L>,
}

impl<T, S, L> MessageRelay<T, S, L>
where
    T: ChatTransport + 'static,
    S: ConfigStore,
    L: AuditLog + 'static,
{
    /// Creates a relay over the given collaborators.
    #[must_use]
    pub const fn new(transport: Arc<T>, config: Arc<S>, audit: Arc<L>) -> Self {
        Self {
            transport,
            config,
            audit,
        }
    }

    /// Mirrors one inbound message to a destination.
    ///
    /// The audit append is dispatched fire-and-forget; original-message
    /// cleanup (performed only when the inbound message carried no
    /// attachments) is best-effort and never surfaces a failure.
    ///
    /// # Errors
    ///
    /// Returns a transport error when delivery fails or a config error when
    /// notification-tag lookup fails.
    pub async fn relay(&self, params: RelayParams<'_>) -> ThreadResult<MessageRef> {
        let mentions = if params.from_staff {
            None
        } else {
            self.gather_mentions(params.thread_key).await?
        };

        self.append_audit(&params);

        let card = build_mirror_card(params.message, params.from_staff);
        let mirrored = self
            .transport
            .send_card(params.destination, mentions.as_deref(), &card)
            .await?;

        if params.message.attachments.is_empty() {
            self.delete_original(params.message).await;
        }

        Ok(mirrored)
    }

    /// Gathers space-joined mention tokens for a correspondent-authored
    /// relay: persisted subscriptions plus the one-shot notification squad,
    /// which is cleared durably as it is read.
    async fn gather_mentions(&self, key: CorrespondentId) -> ThreadResult<Option<String>> {
        let mut tokens = self.config.subscriptions(key).await?;
        tokens.extend(self.config.take_notification_squad(key).await?);
        if tokens.is_empty() {
            return Ok(None);
        }
        Ok(Some(tokens.join(" ")))
    }

    /// Appends the message to the external log, without awaiting the result
    /// as part of the relay.
    fn append_audit(&self, params: &RelayParams<'_>) {
        let staff_to_direct =
            params.from_staff && matches!(params.destination, Destination::Direct(_));
        if staff_to_direct {
            // The staff-channel copy of a reply already carries the append.
            return;
        }

        let destination = (!params.from_staff).then_some(params.thread_key);
        let entry = LogEntry::from_message(params.message, destination);
        let audit = Arc::clone(&self.audit);
        drop(tokio::spawn(async move {
            if let Err(err) = audit.append_log(&entry).await {
                tracing::warn!(error = %err, "audit append failed");
            }
        }));
    }

    /// Deletes the original message from its source location. A failure here
    /// is cosmetic cleanup and is swallowed.
    async fn delete_original(&self, message: &InboundMessage) {
        if let Err(err) = self
            .transport
            .delete_message(message.source, message.id)
            .await
        {
            tracing::debug!(error = %err, message = %message.id, "original cleanup failed");
        }
    }
}

/// Builds the mirrored card for one inbound message: author attribution, the
/// original text, the hidden origin reference, classified image/file fields,
/// and the author-role tag.
#[must_use]
pub fn build_mirror_card(message: &InboundMessage, from_staff: bool) -> MessageCard {
    let classified = classify(&message.attachments, &message.content);

    let mut card = MessageCard {
        author: Some(CardAuthor {
            name: message.author.name.clone(),
            icon_url: message.author.avatar_url.clone(),
        }),
        title: None,
        description: message.content.clone(),
        fields: Vec::new(),
        image_url: classified.primary_image.map(|image| image.url),
        footer: Some(role_footer(from_staff).to_owned()),
        tag: if from_staff {
            CardTag::Staff
        } else {
            CardTag::Correspondent
        },
        timestamp: Some(message.created_at),
        origin: Some(message.id),
    };

    for (index, image) in classified.additional_images.iter().enumerate() {
        card.push_field(
            format!("Additional Image upload ({})", index + 1),
            image.field_value(),
        );
    }

    for (index, file) in classified.files.iter().enumerate() {
        card.fields.push(CardField {
            name: format!("File upload ({})", index + 1),
            value: file.field_value(),
            inline: true,
        });
    }

    card
}

/// Returns the footer tag for an author role.
#[must_use]
pub const fn role_footer(from_staff: bool) -> &'static str {
    if from_staff {
        STAFF_FOOTER
    } else {
        CORRESPONDENT_FOOTER
    }
}
