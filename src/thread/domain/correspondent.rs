//! Correspondent profile and workspace membership metadata.

use super::CorrespondentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile of the external party on the other end of a thread.
///
/// A profile may be unresolvable at lookup time (the correspondent shares no
/// common context with the staff workspace); callers hold an
/// `Option<CorrespondentProfile>` and must fall back to the raw
/// [`CorrespondentId`] when formatting an absent profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrespondentProfile {
    /// Stable platform identifier.
    pub id: CorrespondentId,
    /// Display name.
    pub name: String,
    /// Platform discriminator used for channel-name derivation.
    pub discriminator: String,
    /// Avatar image reference, when one is set.
    pub avatar_url: Option<String>,
    /// Platform registration instant.
    pub registered_at: DateTime<Utc>,
    /// Staff-workspace membership details; `None` when the correspondent is
    /// not a member of the workspace.
    pub membership: Option<Membership>,
}

impl CorrespondentProfile {
    /// Returns the mention token for this correspondent.
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Workspace membership context used by the informational summary card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Instant the correspondent joined the staff workspace.
    pub joined_at: DateTime<Utc>,
    /// Workspace nickname, when one is set.
    pub nickname: Option<String>,
    /// Role names held in the workspace, lowest first.
    pub roles: Vec<String>,
}
