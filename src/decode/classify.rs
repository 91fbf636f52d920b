//! Decide what a MIME part is: a container to descend into, text to keep,
//! or an attachment to file.

use crate::parser::part::MimePart;

/// Multipart flavors that are descended into.
const MULTIPART_TYPES: [&str; 5] = [
    "multipart/mixed",
    "multipart/report",
    "multipart/related",
    "multipart/relative",
    "multipart/alternative",
];

/// Content types whose bodies become message text.
const TEXT_TYPES: [&str; 5] = [
    "text/plain",
    "text/html",
    "application/xml",
    "text/enriched",
    "message/delivery-status",
];

pub const RFC822: &str = "message/rfc822";
pub const TEXT_HTML: &str = "text/html";

/// How the walker treats a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Text,
    Multipart,
    Rfc822,
    Attachment,
}

/// Classify a part from its headers alone.
///
/// Rules, first match wins:
/// 1. a listed multipart flavor or `message/rfc822` is a container;
/// 2. a part with `X-Attachment-Id` or `Content-Disposition` that is not a
///    text type is an attachment;
/// 3. a text type, or a part without a content type, is text;
/// 4. anything else is an attachment, so unknown types are never dropped.
pub fn classify(part: &MimePart) -> PartKind {
    let content_type = part.content_type();
    let content_type = content_type.as_deref();

    match content_type {
        Some(RFC822) => return PartKind::Rfc822,
        Some(ct) if MULTIPART_TYPES.contains(&ct) => return PartKind::Multipart,
        _ => {}
    }

    let headers = part.headers();
    if (headers.has("x-attachment-id") || headers.has("content-disposition"))
        && !is_text_type(content_type)
    {
        return PartKind::Attachment;
    }

    if content_type.is_none() || is_text_type(content_type) {
        PartKind::Text
    } else {
        PartKind::Attachment
    }
}

/// Whether `content_type` (lowercased `type/subtype`) is a text type.
/// An absent type is not.
pub fn is_text_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| TEXT_TYPES.contains(&ct))
}
