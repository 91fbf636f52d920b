//! Content-transfer decoding and charset conversion.

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, STANDARD};
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine;
use tracing::{debug, warn};

use crate::decode::classify::is_text_type;
use crate::error::{DecodeError, Result};

/// Base64 that tolerates missing padding and non-zero trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Literal escapes seen in 7bit bodies that were really quoted-printable.
/// `=C2=A0` must come before `=A0`.
const SEVEN_BIT_FIXUPS: [(&[u8], &[u8]); 8] = [
    (b"=C2=A0", b" "),
    (b"=20", b" "),
    (b"=E2=80=99", b"'"),
    (b"=0A", b"\r\n"),
    (b"=A0", b" "),
    (b"=\r\n", b""),
    ("=E2=80=A6".as_bytes(), "…".as_bytes()),
    ("=E2=80=A2".as_bytes(), "•".as_bytes()),
];

/// A recognized `Content-Transfer-Encoding` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    Base64,
    QuotedPrintable,
    SevenBit,
    EightBit,
    Binary,
}

impl TransferEncoding {
    /// Parse a header value, case-insensitively. Unknown values give `None`.
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "base64" => Some(Self::Base64),
            "quoted-printable" => Some(Self::QuotedPrintable),
            "7bit" => Some(Self::SevenBit),
            "8bit" => Some(Self::EightBit),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }
}

/// Undo the transfer encoding of a part body.
///
/// Without a recognized encoding, text types are returned as-is; other types
/// fail under `strict` and otherwise get a best-effort base64 decode that
/// falls back to the raw bytes. `part` is only used for the error message.
pub fn decode_transfer(
    raw: &[u8],
    encoding: Option<&str>,
    content_type: Option<&str>,
    strict: bool,
    part: &str,
) -> Result<Vec<u8>> {
    match encoding.and_then(TransferEncoding::from_header) {
        Some(TransferEncoding::Base64) => Ok(decode_base64(raw)),
        Some(TransferEncoding::SevenBit) => Ok(decode_7bit(raw)),
        Some(TransferEncoding::EightBit) | Some(TransferEncoding::Binary) => Ok(raw.to_vec()),
        Some(TransferEncoding::QuotedPrintable) => Ok(decode_quoted_printable(raw)),
        None => {
            if is_text_type(content_type) {
                return Ok(raw.to_vec());
            }
            if strict {
                return Err(DecodeError::MissingEncoding {
                    part: part.to_string(),
                });
            }
            Ok(guess_base64(raw).unwrap_or_else(|| raw.to_vec()))
        }
    }
}

/// Decode base64 after dropping everything outside `[A-Za-z0-9+=/]`.
///
/// Padding anywhere is ignored and a dangling final character is dropped, so
/// this never fails.
pub fn decode_base64(raw: &[u8]) -> Vec<u8> {
    let mut clean: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
        .collect();
    if clean.len() % 4 == 1 {
        clean.pop();
    }
    LENIENT_BASE64.decode(&clean).unwrap_or_default()
}

/// Strict base64 used when a part gives no encoding at all.
fn guess_base64(raw: &[u8]) -> Option<Vec<u8>> {
    let clean: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    match STANDARD.decode(&clean) {
        Ok(decoded) if !decoded.is_empty() => Some(decoded),
        _ => None,
    }
}

/// Decode a body labelled `7bit`.
///
/// If the first line is a single unbroken token of base64 characters the
/// body is assumed to be base64 mislabelled as 7bit. This still misfires on
/// bodies whose first line is one bare word; it is kept because mail in the
/// wild relies on it. The fixup table is applied afterwards.
pub fn decode_7bit(raw: &[u8]) -> Vec<u8> {
    let first_line = raw
        .split(|&b| b == b'\n')
        .next()
        .unwrap_or_default();
    let first_line = first_line.strip_suffix(b"\r").unwrap_or(first_line);
    let looks_like_base64 = !first_line.is_empty()
        && first_line
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='));

    let mut data = if !looks_like_base64 {
        raw.to_vec()
    } else {
        let decoded = decode_base64(raw);
        if decoded.is_empty() {
            raw.to_vec()
        } else {
            decoded
        }
    };

    for (from, to) in SEVEN_BIT_FIXUPS {
        data = replace_bytes(&data, from, to);
    }
    data
}

/// Quoted-printable in robust mode; malformed input is returned unchanged.
pub fn decode_quoted_printable(raw: &[u8]) -> Vec<u8> {
    match quoted_printable::decode(raw, quoted_printable::ParseMode::Robust) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "Malformed quoted-printable body, keeping raw content");
            raw.to_vec()
        }
    }
}

fn replace_bytes(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() || haystack.len() < from.len() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

/// Convert `input` from one charset to another.
///
/// Best effort: an empty or unknown source charset, identical charsets, or
/// input that is malformed for the source charset all return the input
/// unchanged. Never fails.
pub fn convert_encoding<'a>(input: &'a [u8], from: &str, to: &str) -> Cow<'a, [u8]> {
    let from = from.trim();
    if from.is_empty() || input.is_empty() || from.eq_ignore_ascii_case(to.trim()) {
        return Cow::Borrowed(input);
    }

    // Undeclared 8-bit text is overwhelmingly UTF-8 in practice
    if is_ascii_label(from) && std::str::from_utf8(input).is_ok() {
        return Cow::Borrowed(input);
    }

    let Some(source) = encoding_rs::Encoding::for_label(from.as_bytes()) else {
        warn!(charset = from, "Unknown charset, keeping original bytes");
        return Cow::Borrowed(input);
    };
    let Some(target) = encoding_rs::Encoding::for_label(to.trim().as_bytes()) else {
        warn!(charset = to, "Unknown target charset, keeping original bytes");
        return Cow::Borrowed(input);
    };

    let Some(text) = source.decode_without_bom_handling_and_without_replacement(input) else {
        debug!(charset = from, "Malformed input for charset, keeping original bytes");
        return Cow::Borrowed(input);
    };

    let (encoded, _, had_errors) = target.encode(&text);
    if had_errors {
        debug!(charset = to, "Unmappable characters while converting, keeping original bytes");
        return Cow::Borrowed(input);
    }
    Cow::Owned(encoded.into_owned())
}

fn is_ascii_label(label: &str) -> bool {
    matches!(
        label.to_ascii_lowercase().as_str(),
        "us-ascii" | "ascii" | "us_ascii" | "ansi_x3.4-1968"
    )
}

/// Bytes in `charset` → `String`, with lossy UTF-8 as the last resort.
pub fn to_utf8(input: &[u8], charset: &str) -> String {
    match convert_encoding(input, charset, "UTF-8") {
        Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Cow::Owned(bytes) => String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}
