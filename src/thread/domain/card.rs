//! Structured message cards mirrored between endpoints.
//!
//! A card is the platform-rendered unit carrying text, author, styling
//! intent, and optional fields/images. Rendering is the transport's
//! business; this module only specifies the data a card must carry.

use super::MessageRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Footer marker appended to a mirrored card when its source was edited.
pub const EDITED_MARKER: &str = " - (Edited)";

/// Styling intent of a card, rendered by the transport as colour/accent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardTag {
    /// Relayed on behalf of a staff member.
    Staff,
    /// Relayed on behalf of the external correspondent.
    Correspondent,
    /// System notice (cancelled closures, closure summaries, errors).
    Notice,
}

/// Author attribution displayed on a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAuthor {
    /// Display name.
    pub name: String,
    /// Avatar reference, when one is available.
    pub icon_url: Option<String>,
}

/// A titled name/value pair attached to a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardField {
    /// Field label.
    pub name: String,
    /// Field body.
    pub value: String,
    /// Whether the transport may render the field inline.
    pub inline: bool,
}

/// A structured message card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCard {
    /// Author attribution, when the card mirrors an authored message.
    pub author: Option<CardAuthor>,
    /// Card title, used by lifecycle notices.
    pub title: Option<String>,
    /// Main body text.
    pub description: String,
    /// Additional name/value fields (file and image references).
    pub fields: Vec<CardField>,
    /// Primary embedded image, when one was classified.
    pub image_url: Option<String>,
    /// Footer text (author-role tag, edit marker, recovery metadata).
    pub footer: Option<String>,
    /// Styling intent.
    pub tag: CardTag,
    /// Source-message creation instant, when mirroring a message.
    pub timestamp: Option<DateTime<Utc>>,
    /// Hidden reference to the source message, used for later edit lookup.
    pub origin: Option<MessageRef>,
}

impl MessageCard {
    /// Creates a bare notice card with the given body.
    #[must_use]
    pub const fn notice(description: String) -> Self {
        Self {
            author: None,
            title: None,
            description,
            fields: Vec::new(),
            image_url: None,
            footer: None,
            tag: CardTag::Notice,
            timestamp: None,
            origin: None,
        }
    }

    /// Sets the card title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the footer text.
    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    /// Sets the card timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Appends a non-inline field.
    pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(CardField {
            name: name.into(),
            value: value.into(),
            inline: false,
        });
    }

    /// Appends the edited marker to the footer, once.
    ///
    /// Returns `true` when the marker was added, `false` when the footer
    /// already carried it.
    pub fn mark_edited(&mut self) -> bool {
        let footer = self.footer.get_or_insert_with(String::new);
        if footer.contains(EDITED_MARKER) {
            return false;
        }
        footer.push_str(EDITED_MARKER);
        true
    }
}
