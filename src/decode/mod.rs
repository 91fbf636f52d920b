//! Message decoding: classify parts, walk the MIME tree, undo transfer
//! encodings and file attachments.

pub mod classify;
pub mod codec;
pub mod filename;
pub mod identity;
pub mod walker;

use tracing::debug;

use crate::config::DecodeConfig;
use crate::error::Result;
use crate::model::context::MessageContext;
use crate::model::message::DecodedMessage;
use crate::parser::part::MimePart;

use walker::{PartNumber, PartTree, Walker};

/// Decode a message into its text bodies and attachments.
///
/// Either the whole message decodes or the first fatal error is returned.
/// With `config.attachments_dir` set, attachments are written as they are
/// found, so files written before a failure stay on disk.
pub fn decode(
    ctx: &MessageContext,
    root: &MimePart,
    config: &DecodeConfig,
) -> Result<DecodedMessage> {
    let tree = PartTree::build(root.clone());
    debug!(message = %ctx.id, leaves = tree.leaf_count(), "Decoding message");

    let mut message = DecodedMessage::new();
    Walker::new(ctx, config).walk(&tree, &PartNumber::root(), &mut message)?;
    Ok(message)
}

/// Parse a raw RFC 822 message and decode it, taking the context from its
/// own headers. `id` is the mailbox-assigned identifier.
pub fn decode_raw(id: &str, raw: &[u8], config: &DecodeConfig) -> Result<DecodedMessage> {
    let root = MimePart::parse(raw);
    let ctx = MessageContext::from_headers(id, root.headers());
    decode(&ctx, &root, config)
}
