//! Attachment and inline-image classification.
//!
//! Pure function layer: given a message's uploaded attachments and the bare
//! URLs found in its text, partitions them into one primary image, numbered
//! additional images, and numbered generic files. Uploaded images always win
//! the primary slot over bare-link images; among uploads, or among links
//! when no upload-image exists, the first candidate in combined order wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Extensions treated as images by the classifier, matched case-insensitively
/// against the URL path.
pub const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// One attachment reference.
///
/// Uploaded attachments carry a filename; bare links scanned from the text
/// body do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Source URL.
    pub url: String,
    /// Original filename for uploads, `None` for bare links.
    pub filename: Option<String>,
}

impl Attachment {
    /// Creates an uploaded attachment.
    #[must_use]
    pub fn upload(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: Some(filename.into()),
        }
    }

    /// Creates a bare-link attachment.
    #[must_use]
    pub fn link(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: None,
        }
    }

    /// Returns `true` when the attachment is an uploaded file.
    #[must_use]
    pub const fn is_upload(&self) -> bool {
        self.filename.is_some()
    }

    /// Renders the attachment as a card-field value: a named link for
    /// uploads, the bare URL otherwise.
    #[must_use]
    pub fn field_value(&self) -> String {
        self.filename.as_ref().map_or_else(
            || self.url.clone(),
            |name| format!("[{name}]({})", self.url),
        )
    }
}

/// Result of classifying one message's attachments and inline links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedAttachments {
    /// The single image embedded inline, when any image candidate exists.
    pub primary_image: Option<Attachment>,
    /// Remaining image candidates, in combined order.
    pub additional_images: Vec<Attachment>,
    /// Non-image uploads, in platform order.
    pub files: Vec<Attachment>,
}

/// Returns `true` when the URL path ends in a known image extension.
///
/// Query and fragment components are ignored; the comparison is
/// case-insensitive.
#[must_use]
pub fn is_image_url(url: &str) -> bool {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let path = without_fragment.split('?').next().unwrap_or(without_fragment);
    let lowered = path.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    #[expect(clippy::expect_used, reason = "the pattern is statically valid")]
    PATTERN.get_or_init(|| Regex::new(r"https?://\S+").expect("valid link pattern"))
}

/// Scans a text body for bare URLs that resolve to images by extension.
///
/// Order of appearance is preserved; results carry no filename.
#[must_use]
pub fn scan_inline_image_links(content: &str) -> Vec<Attachment> {
    link_pattern()
        .find_iter(content)
        .map(|m| Attachment::link(m.as_str()))
        .filter(|link| is_image_url(&link.url))
        .collect()
}

/// Partitions uploaded attachments and inline links into primary image,
/// additional images, and generic files.
///
/// Image candidates are real attachment images followed by inline-link
/// images. When any uploaded image exists the first upload wins the primary
/// slot; otherwise the first candidate in combined order does. Every
/// non-primary image candidate lands in `additional_images`.
#[must_use]
pub fn classify(attachments: &[Attachment], content: &str) -> ClassifiedAttachments {
    let (upload_images, files): (Vec<Attachment>, Vec<Attachment>) = attachments
        .iter()
        .cloned()
        .partition(|att| is_image_url(&att.url));

    let mut candidates = upload_images;
    candidates.extend(scan_inline_image_links(content));

    let primary_index = candidates
        .iter()
        .position(Attachment::is_upload)
        .or_else(|| (!candidates.is_empty()).then_some(0));

    let primary_image = primary_index.map(|index| candidates.remove(index));

    ClassifiedAttachments {
        primary_image,
        additional_images: candidates,
        files,
    }
}
