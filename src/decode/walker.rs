//! The part tree and the recursive walk that fills a [`DecodedMessage`].
//!
//! The tree is built eagerly: every multipart body is split along its
//! boundary and every embedded message is parsed before the walk starts.
//! Part numbers are not stored in the tree; the walk derives them from the
//! position of each node.

use std::fmt;

use tracing::{debug, trace, warn};

use crate::config::DecodeConfig;
use crate::decode::classify::{classify, PartKind, TEXT_HTML};
use crate::decode::codec::{self, TransferEncoding};
use crate::decode::{filename, identity};
use crate::error::Result;
use crate::export::attachment::save_attachment;
use crate::model::attachment::Attachment;
use crate::model::context::MessageContext;
use crate::model::message::DecodedMessage;
use crate::parser::part::{split_multipart, MimePart};

/// Maximum container nesting. Deeper branches are dropped.
pub const MAX_DEPTH: usize = 32;

/// Charset assumed for text parts that do not declare one.
pub const DEFAULT_CHARSET: &str = "US-ASCII";

/// A message's MIME structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartTree {
    /// Children of a multipart part, in order.
    Multipart(Vec<PartTree>),
    /// An embedded message: `message/rfc822`, or a multipart part without a
    /// boundary whose body is parsed as a whole message.
    Rfc822(Box<PartTree>),
    Text(MimePart),
    Attachment(MimePart),
}

impl PartTree {
    /// Build the tree rooted at `part`.
    pub fn build(part: MimePart) -> Self {
        Self::build_at(part, 0)
    }

    fn build_at(part: MimePart, depth: usize) -> Self {
        if depth > MAX_DEPTH {
            warn!(depth, "MIME nesting too deep, ignoring branch");
            return PartTree::Multipart(Vec::new());
        }

        match Self::kind_at(&part, depth) {
            PartKind::Multipart => match part.param("content-type", "boundary") {
                Some(boundary) => {
                    let children = split_multipart(part.body(), &boundary);
                    if children.is_empty() {
                        debug!(%boundary, "Multipart body has no parts");
                    }
                    PartTree::Multipart(
                        children
                            .into_iter()
                            .map(|child| Self::build_at(child, depth + 1))
                            .collect(),
                    )
                }
                None => Self::embedded(&part, depth),
            },
            PartKind::Rfc822 => Self::embedded(&part, depth),
            PartKind::Text => PartTree::Text(part),
            PartKind::Attachment => PartTree::Attachment(part),
        }
    }

    /// The root of a message is split whenever it is a multipart with a
    /// boundary, whatever the subtype (`signed`, `encrypted`, ...). Nested
    /// parts go by [`classify`] alone.
    fn kind_at(part: &MimePart, depth: usize) -> PartKind {
        match classify(part) {
            PartKind::Attachment
                if depth == 0
                    && part.is_multipart()
                    && part.param("content-type", "boundary").is_some() =>
            {
                PartKind::Multipart
            }
            kind => kind,
        }
    }

    fn embedded(part: &MimePart, depth: usize) -> Self {
        let inner = MimePart::parse(&embedded_body(part));
        PartTree::Rfc822(Box::new(Self::build_at(inner, depth + 1)))
    }

    /// Number of text and attachment leaves.
    pub fn leaf_count(&self) -> usize {
        match self {
            PartTree::Multipart(children) => children.iter().map(PartTree::leaf_count).sum(),
            PartTree::Rfc822(inner) => inner.leaf_count(),
            PartTree::Text(_) | PartTree::Attachment(_) => 1,
        }
    }
}

/// The raw message inside a wrapper. Base64 and quoted-printable wrappers
/// are undone first; anything else is taken verbatim.
fn embedded_body(part: &MimePart) -> Vec<u8> {
    let encoding = part
        .headers()
        .get("content-transfer-encoding")
        .and_then(TransferEncoding::from_header);
    match encoding {
        Some(TransferEncoding::Base64) => codec::decode_base64(part.body()),
        Some(TransferEncoding::QuotedPrintable) => codec::decode_quoted_printable(part.body()),
        _ => part.body().to_vec(),
    }
}

/// Dotted position of a part in its message, e.g. `2.1`.
///
/// The root has no components and displays as `1`, which is the number a
/// single-part message gives its only part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PartNumber(Vec<usize>);

impl PartNumber {
    pub fn root() -> Self {
        Self::default()
    }

    /// Number of the `index`-th (1-based) child.
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }
}

impl fmt::Display for PartNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("1");
        }
        for (i, n) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{n}")?;
        }
        Ok(())
    }
}

/// Walks a [`PartTree`] for one message.
pub struct Walker<'a> {
    ctx: &'a MessageContext,
    config: &'a DecodeConfig,
}

impl<'a> Walker<'a> {
    pub fn new(ctx: &'a MessageContext, config: &'a DecodeConfig) -> Self {
        Self { ctx, config }
    }

    /// Visit `tree` in document order, appending to `message`.
    ///
    /// Stops at the first fatal error; `message` then holds whatever was
    /// collected before it.
    pub fn walk(
        &self,
        tree: &PartTree,
        number: &PartNumber,
        message: &mut DecodedMessage,
    ) -> Result<()> {
        match tree {
            PartTree::Multipart(children) => {
                for (i, child) in children.iter().enumerate() {
                    self.walk(child, &number.child(i + 1), message)?;
                }
                Ok(())
            }
            PartTree::Rfc822(inner) => self.walk(inner, number, message),
            PartTree::Text(part) => {
                add_text(part, number, message);
                Ok(())
            }
            PartTree::Attachment(part) => self.add_attachment(part, number, message),
        }
    }

    fn add_attachment(
        &self,
        part: &MimePart,
        number: &PartNumber,
        message: &mut DecodedMessage,
    ) -> Result<()> {
        if self.config.skip_attachments {
            trace!(part = %number, "Skipping attachment");
            return Ok(());
        }

        let number = number.to_string();
        let names = filename::resolve(part);
        let data = codec::decode_transfer(
            part.body(),
            part.headers().get("content-transfer-encoding"),
            names.mime_type.as_deref(),
            self.config.strict_encoding,
            &number,
        )?;
        let id = identity::generate_id(self.ctx, part, &number);
        let location = match &self.config.attachments_dir {
            Some(base_dir) => Some(identity::generate_filepath(
                self.ctx,
                &id,
                &names.filename,
                base_dir,
                self.config.strict_dates,
            )?),
            None => None,
        };

        let attachment = Attachment {
            id: Some(id),
            name: names.name,
            filename: names.filename,
            mime_type: names.mime_type,
            orig_name: names.orig_name,
            orig_filename: names.orig_filename,
            location,
            data,
        };
        if attachment.location.is_some() {
            save_attachment(&attachment)?;
        }

        debug!(
            part = %number,
            filename = %attachment.filename,
            size = attachment.data.len(),
            "Attachment found"
        );
        message.add_attachment(attachment);
        Ok(())
    }
}

/// Decode a text part and append it to the matching body.
fn add_text(part: &MimePart, number: &PartNumber, message: &mut DecodedMessage) {
    let content_type = part.content_type();
    let charset = part
        .param("content-type", "charset")
        .unwrap_or_else(|| DEFAULT_CHARSET.to_string());

    // Text is never decoded strictly, so this cannot fail
    let raw = codec::decode_transfer(
        part.body(),
        part.headers().get("content-transfer-encoding"),
        content_type.as_deref(),
        false,
        &number.to_string(),
    )
    .unwrap_or_else(|_| part.body().to_vec());
    let text = codec::to_utf8(&raw, &charset);

    if content_type.as_deref() == Some(TEXT_HTML) {
        message.text_html.push_str(&text);
    } else {
        message.charset = charset;
        message.text_plain.push_str(&text);
    }
}
