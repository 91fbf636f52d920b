//! Message-level attributes that attachment identity and placement derive from.

use chrono::{DateTime, Utc};

use crate::model::address::EmailAddress;
use crate::parser::header::{self, decode_encoded_words, Headers};

/// Format used for dates inside attachment-id hash input.
pub const HASH_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Read-only description of the message being decoded.
///
/// `id`, `date`, `from_address`, `subject` and `message_id` feed the
/// deterministic attachment ids; changing any of them changes every
/// hash-derived id of the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MessageContext {
    /// Mailbox-assigned identifier (sequence number or UID).
    pub id: String,
    /// Raw `Date` header value.
    pub date: String,
    /// Bare sender address.
    pub from_address: String,
    /// Sender display name (not part of any id).
    pub from_name: String,
    /// Decoded `Subject`.
    pub subject: String,
    /// Raw `Message-ID`, angle brackets included.
    pub message_id: String,
    /// Best-effort delivery time from the first `Received` header.
    pub date_received: Option<DateTime<Utc>>,
}

impl MessageContext {
    pub fn new(
        id: impl Into<String>,
        date: impl Into<String>,
        from_address: impl Into<String>,
        subject: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
            from_address: from_address.into(),
            subject: subject.into(),
            message_id: message_id.into(),
            ..Self::default()
        }
    }

    /// Build the context from a message's top-level headers.
    pub fn from_headers(id: impl Into<String>, headers: &Headers) -> Self {
        let from = headers
            .get("from")
            .and_then(|raw| EmailAddress::parse_list(raw).into_iter().next())
            .unwrap_or_default();

        Self {
            id: id.into(),
            date: headers.get("date").unwrap_or_default().to_string(),
            from_address: from.address,
            from_name: from.display_name,
            subject: decode_encoded_words(headers.get("subject").unwrap_or_default()),
            message_id: headers.get("message-id").unwrap_or_default().to_string(),
            date_received: headers.get("received").and_then(received_date),
        }
    }

    /// The message date, if the header can be parsed.
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        header::parse_date(&self.date)
    }

    /// The date as it enters attachment-id hashes: `YYYY-MM-DD HH:MM:SS` in
    /// UTC, or the trimmed raw header when it cannot be parsed so the id
    /// stays reproducible.
    pub fn normalized_date(&self) -> String {
        match self.parsed_date() {
            Some(dt) => dt.format(HASH_DATE_FORMAT).to_string(),
            None => self.date.trim().to_string(),
        }
    }
}

/// The date of a `Received` trace field: the last `;`-separated segment that
/// parses.
fn received_date(received: &str) -> Option<DateTime<Utc>> {
    received
        .rsplit(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .find_map(header::parse_date)
}
