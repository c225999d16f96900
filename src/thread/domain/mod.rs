//! Domain model for thread lifecycle and relay.
//!
//! Pure data types and classification logic. All infrastructure concerns
//! (transport, persistence, log archival) stay outside the domain boundary.

mod attachment;
mod card;
mod closure;
mod correspondent;
mod error;
mod ids;
mod message;

pub use attachment::{
    Attachment, ClassifiedAttachments, IMAGE_EXTENSIONS, classify, is_image_url,
    scan_inline_image_links,
};
pub use card::{CardAuthor, CardField, CardTag, EDITED_MARKER, MessageCard};
pub use closure::{CloseRequest, CloserIdentity, PendingClosure};
pub use correspondent::{CorrespondentProfile, Membership};
pub use error::ThreadDomainError;
pub use ids::{ChannelRef, CorrespondentId, MessageRef};
pub use message::{Destination, InboundMessage, MessageAuthor};
