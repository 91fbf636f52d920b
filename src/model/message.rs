//! The decoded form of a message: text bodies plus attachments.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::attachment::Attachment;

/// `src="cid:…"`-style references to inline parts (`cd:` is a common typo).
static INTERNAL_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)=["'](ci?d:([\w.%*@-]+))["']"#).expect("valid internal link regex")
});

/// Result of decoding one message.
///
/// Bodies are append-only: every text part found during the walk is
/// concatenated in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedMessage {
    /// All `text/*` (non-HTML) content, UTF-8.
    pub text_plain: String,
    /// All `text/html` content, UTF-8.
    pub text_html: String,
    /// Charset of the last plain-text part seen.
    pub charset: String,
    attachments: Vec<Attachment>,
}

impl DecodedMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attachment. A later attachment with the same id replaces the
    /// earlier one in its original position.
    pub fn add_attachment(&mut self, attachment: Attachment) {
        let existing = attachment
            .id
            .as_ref()
            .and_then(|id| self.position(id));
        match existing {
            Some(pos) => self.attachments[pos] = attachment,
            None => self.attachments.push(attachment),
        }
    }

    /// Attachments in discovery order.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attachment(&self, id: &str) -> Option<&Attachment> {
        self.position(id).map(|pos| &self.attachments[pos])
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.attachments
            .iter()
            .position(|a| a.id.as_deref() == Some(id))
    }

    /// Every `="cid:…"` reference in the HTML body as `(cid, placeholder)`,
    /// e.g. `("logo@x", "cid:logo@x")`. Later duplicates are dropped.
    pub fn internal_link_placeholders(&self) -> Vec<(String, String)> {
        let mut found: Vec<(String, String)> = Vec::new();
        for caps in INTERNAL_LINK.captures_iter(&self.text_html) {
            let cid = caps[2].to_string();
            if !found.iter().any(|(c, _)| *c == cid) {
                found.push((cid, caps[1].to_string()));
            }
        }
        found
    }

    /// The HTML body with inline references to known, filed attachments
    /// pointed at `{base_uri}/{system file name}`.
    pub fn replace_internal_links(&self, base_uri: &str) -> String {
        let base = base_uri.trim_end_matches(['/', '\\']);
        INTERNAL_LINK
            .replace_all(&self.text_html, |caps: &Captures<'_>| {
                let whole = &caps[0];
                let target = self
                    .attachment(&caps[2])
                    .and_then(|a| a.location.as_ref())
                    .map(|loc| format!("{base}/{}", loc.file_name()));
                match target {
                    Some(url) => whole.replacen(&caps[1], &url, 1),
                    None => whole.to_string(),
                }
            })
            .into_owned()
    }
}
