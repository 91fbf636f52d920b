//! Deterministic attachment ids and on-disk placement.
//!
//! Re-processing the same message always yields the same ids and, as long
//! as the message date parses, the same paths. Callers rely on this for
//! idempotent re-downloads.

use std::path::Path;

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use tracing::warn;

use crate::error::{DecodeError, Result};
use crate::model::attachment::AttachmentLocation;
use crate::model::context::MessageContext;
use crate::parser::header::trim_angle_brackets;
use crate::parser::part::MimePart;

/// Longest system file name, in bytes.
const MAX_SYS_NAME_BYTES: usize = 250;

/// Id for the attachment at `part_number` (e.g. `"2.1"`).
///
/// A non-empty `X-Attachment-Id` header is used as is, minus whitespace and
/// angle brackets. Otherwise the id is the hex MD5 of
/// `"{date}-{from}-{subject}-{part_number}-{message_id}"`.
pub fn generate_id(ctx: &MessageContext, part: &MimePart, part_number: &str) -> String {
    if let Some(id) = part
        .headers()
        .get("x-attachment-id")
        .map(trim_angle_brackets)
        .filter(|id| !id.is_empty())
    {
        return id.to_string();
    }

    let input = format!(
        "{}-{}-{}-{}-{}",
        ctx.normalized_date(),
        ctx.from_address,
        ctx.subject,
        part_number,
        ctx.message_id
    );
    format!("{:x}", Md5::digest(input.as_bytes()))
}

/// Reduce a file name to a safe path component.
///
/// Whitespace becomes `_`; only ASCII letters, digits, `_`, `.` and the
/// Cyrillic letters `а-я`, `і`, `ї`, `є` (either case) survive; runs of `_`
/// collapse and leading/trailing `_` are trimmed.
pub fn sanitize_filename(filename: &str) -> String {
    let mut out = String::with_capacity(filename.len());
    for c in filename.chars() {
        let c = if c.is_whitespace() { '_' } else { c };
        if !is_kept_char(c) || (c == '_' && out.ends_with('_')) {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

fn is_kept_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '_' | '.' | 'а'..='я' | 'А'..='Я' | 'і' | 'І' | 'ї' | 'Ї' | 'є' | 'Є'
        )
}

/// Place an attachment under `{base_dir}/{YYYY}/{MM}`.
///
/// The year and month come from the message date. When it cannot be parsed
/// the current time is used, unless `strict_dates` is set, in which case
/// this fails with [`DecodeError::UnparsableDate`].
pub fn generate_filepath(
    ctx: &MessageContext,
    attachment_id: &str,
    filename: &str,
    base_dir: &Path,
    strict_dates: bool,
) -> Result<AttachmentLocation> {
    let sys_name: String = format!("{}_{}_{}", ctx.id, attachment_id, sanitize_filename(filename))
        .chars()
        .filter(|c| *c != '/' && *c != '\\')
        .collect();
    let sys_name = truncate_bytes(&sys_name, MAX_SYS_NAME_BYTES);

    let date = filing_date(ctx, strict_dates)?;
    let year = date.format("%Y").to_string();
    let month = date.format("%m").to_string();

    let date_dir = base_dir.join(&year).join(&month);
    let relative_path = format!("{year}/{month}/{sys_name}");
    let absolute_path = date_dir.join(sys_name);

    Ok(AttachmentLocation {
        base_dir: base_dir.to_path_buf(),
        date_dir,
        relative_path,
        absolute_path,
    })
}

fn filing_date(ctx: &MessageContext, strict_dates: bool) -> Result<DateTime<Utc>> {
    if let Some(date) = ctx.parsed_date() {
        return Ok(date);
    }
    if strict_dates {
        return Err(DecodeError::UnparsableDate(ctx.date.clone()));
    }
    warn!(
        message = %ctx.id,
        date = %ctx.date,
        "Unparsable message date, filing attachment under the current month"
    );
    Ok(Utc::now())
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
