//! MIME parts as delivered by a mail-storage client: a header view plus the
//! raw (still transfer-encoded) body, and the boundary splitting that turns a
//! multipart body into its children.

use crate::parser::header::Headers;

/// A single MIME entity: headers and raw content.
///
/// Children of a multipart entity are not pre-parsed; they are found by
/// [`split_multipart`] on the raw body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimePart {
    headers: Headers,
    body: Vec<u8>,
}

impl MimePart {
    /// Build a part from an already tokenized header view and raw body.
    pub fn new(headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    /// Parse a complete raw entity (headers, blank line, body).
    ///
    /// A leading mbox `From ` separator line and UTF-8 BOM are skipped. When
    /// the first line does not look like a header field, the whole input is
    /// treated as body with no headers.
    pub fn parse(raw: &[u8]) -> Self {
        let data = skip_from_line(raw);

        // Blank first line: no headers, body follows
        if let Some(body) = data
            .strip_prefix(b"\r\n")
            .or_else(|| data.strip_prefix(b"\n"))
        {
            return Self::new(Headers::new(), body);
        }

        if !starts_with_header_field(data) {
            return Self::new(Headers::new(), data);
        }

        match find_header_end(data) {
            Some((end, sep_len)) => Self::new(
                Headers::parse(&data[..end]),
                &data[end + sep_len..],
            ),
            None => Self::new(Headers::parse(data), Vec::new()),
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Raw, still transfer-encoded content.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Lowercased `type/subtype` of the `Content-Type` header, if present.
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .main_value("content-type")
            .filter(|ct| !ct.is_empty())
    }

    /// Shorthand for `headers().param(header, name)`.
    pub fn param(&self, header: &str, name: &str) -> Option<String> {
        self.headers.param(header, name)
    }

    /// Whether the part declares a `multipart/*` content type.
    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.starts_with("multipart/"))
    }
}

/// Split a multipart body along `boundary` into its child parts.
///
/// The preamble before the first delimiter and the epilogue after the close
/// delimiter are discarded. A body without a close delimiter keeps its last
/// segment up to the end of input. No delimiter at all yields an empty list.
pub fn split_multipart(body: &[u8], boundary: &str) -> Vec<MimePart> {
    if boundary.is_empty() {
        return Vec::new();
    }

    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    // Start offset of the current segment's content, once a delimiter has been seen
    let mut current: Option<usize> = None;
    let mut line_start = 0;

    while line_start < body.len() {
        let line_end = body[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| line_start + p + 1)
            .unwrap_or(body.len());
        let line = &body[line_start..line_end];

        if let Some(rest) = line.strip_prefix(delimiter) {
            let rest = trim_line_end(rest);
            let closing = rest.starts_with(b"--");
            if closing || rest.iter().all(|b| b.is_ascii_whitespace()) {
                if let Some(start) = current.take() {
                    parts.push(MimePart::parse(strip_trailing_newline(
                        &body[start..line_start],
                    )));
                }
                if closing {
                    return parts;
                }
                current = Some(line_end);
            }
        }

        line_start = line_end;
    }

    if let Some(start) = current {
        if start < body.len() {
            parts.push(MimePart::parse(&body[start..]));
        }
    }

    parts
}

/// Skip the `From ` separator line at the start of mbox messages (and a BOM).
pub(crate) fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Whether the first line has the shape `name: value`.
fn starts_with_header_field(data: &[u8]) -> bool {
    let first_line = data
        .split(|&b| b == b'\n')
        .next()
        .unwrap_or_default();
    match first_line.iter().position(|&b| b == b':') {
        Some(0) | None => false,
        Some(colon) => first_line[..colon]
            .iter()
            .all(|&b| b.is_ascii_graphic()),
    }
}

/// Find where headers end. Returns the offset of the blank-line separator and
/// its length.
fn find_header_end(data: &[u8]) -> Option<(usize, usize)> {
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if data[i..].starts_with(b"\n\r\n") {
            return Some((i, 3));
        }
    }
    None
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// The line break before a delimiter belongs to the delimiter.
fn strip_trailing_newline(segment: &[u8]) -> &[u8] {
    trim_line_end(segment)
}
