//! RFC 5322 header handling: folding, parameter lists (with RFC 2231
//! continuations), encoded-words (RFC 2047), and date parsing.

use std::collections::BTreeMap;

use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// An ordered, case-insensitive collection of header fields.
///
/// Names are stored lowercased. Duplicate fields are kept in order; lookups
/// return the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw header block (everything before the first blank line).
    pub fn parse(raw: &[u8]) -> Self {
        let text = decode_header_bytes(raw);
        Self {
            fields: unfold_headers(&text),
        }
    }

    /// Build from `(name, value)` pairs, e.g. headers already tokenized by a
    /// mail-storage client.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.push(name.as_ref(), value);
        }
        headers
    }

    /// Append a field.
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        self.fields
            .push((name.trim().to_ascii_lowercase(), value.into().trim().to_string()));
    }

    /// Whether a field with this name is present.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Raw value of the first field with this name.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The value before any `;` parameters, lowercased (e.g. `"text/plain"`).
    pub fn main_value(&self, name: &str) -> Option<String> {
        self.get(name).map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// A parameter of a structured field, e.g. `param("content-type", "charset")`.
    ///
    /// RFC 2231 continuations and charsets, and RFC 2047 encoded-words in the
    /// value, are resolved. Empty values are reported as absent.
    pub fn param(&self, name: &str, param: &str) -> Option<String> {
        let value = self.get(name)?;
        let params_part = value.split_once(';')?.1;
        parse_parameters(params_part)
            .remove(&param.to_ascii_lowercase())
            .filter(|v| !v.is_empty())
    }

    /// Iterate over `(lowercase_name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Join continuation lines (starting with space or tab) onto the previous field.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() {
                result.push((name.to_ascii_lowercase(), value.trim().to_string()));
            }
        }
    }

    result
}

/// One `name[*N][*]=value` item of a parameter list.
struct RawParam {
    name: String,
    section: Option<u32>,
    extended: bool,
    value: String,
}

/// Parse `; a=b; c="d e"` into a lowercase-keyed map.
///
/// RFC 2231 sections (`name*0`, `name*1*`, ...) are stitched back together in
/// order and percent-decoded with their declared charset; plain values get
/// RFC 2047 encoded-word decoding.
fn parse_parameters(params_part: &str) -> BTreeMap<String, String> {
    let mut simple: BTreeMap<String, String> = BTreeMap::new();
    let mut sectioned: BTreeMap<String, Vec<RawParam>> = BTreeMap::new();

    for raw in split_parameter_list(params_part) {
        if raw.section.is_some() || raw.extended {
            sectioned.entry(raw.name.clone()).or_default().push(raw);
        } else {
            simple
                .entry(raw.name)
                .or_insert_with(|| decode_encoded_words(&raw.value));
        }
    }

    for (name, mut sections) in sectioned {
        sections.sort_by_key(|p| p.section.unwrap_or(0));
        let mut charset: Option<String> = None;
        let mut bytes = Vec::new();
        for (i, section) in sections.iter().enumerate() {
            let mut value = section.value.as_str();
            if section.extended && i == 0 {
                // charset'language'encoded
                let mut pieces = value.splitn(3, '\'');
                if let (Some(cs), Some(_lang), Some(rest)) =
                    (pieces.next(), pieces.next(), pieces.next())
                {
                    charset = Some(cs.to_string());
                    value = rest;
                }
            }
            if section.extended {
                bytes.extend(percent_encoding::percent_decode_str(value));
            } else {
                bytes.extend_from_slice(value.as_bytes());
            }
        }
        let decoded = match charset.as_deref() {
            Some(cs) if !cs.is_empty() => decode_charset(cs, &bytes),
            _ => String::from_utf8_lossy(&bytes).into_owned(),
        };
        simple.insert(name, decoded);
    }

    simple
}

/// Tokenize a parameter list, honouring quoted strings and backslash escapes.
fn split_parameter_list(params_part: &str) -> Vec<RawParam> {
    let mut params = Vec::new();
    let chars: Vec<char> = params_part.chars().collect();
    let len = chars.len();
    let mut pos = 0;

    while pos < len {
        while pos < len && (chars[pos] == ';' || chars[pos].is_whitespace()) {
            pos += 1;
        }
        if pos >= len {
            break;
        }

        let name_start = pos;
        while pos < len && chars[pos] != '=' && chars[pos] != ';' {
            pos += 1;
        }
        let raw_name: String = chars[name_start..pos].iter().collect();
        if pos >= len || chars[pos] == ';' {
            // Attribute without a value; ignore it.
            continue;
        }
        pos += 1; // '='
        while pos < len && chars[pos].is_whitespace() {
            pos += 1;
        }

        let value = if pos < len && chars[pos] == '"' {
            pos += 1;
            let mut v = String::new();
            while pos < len {
                match chars[pos] {
                    '\\' if pos + 1 < len => {
                        v.push(chars[pos + 1]);
                        pos += 2;
                    }
                    '"' => {
                        pos += 1;
                        break;
                    }
                    c => {
                        v.push(c);
                        pos += 1;
                    }
                }
            }
            // Skip anything between the closing quote and the next ';'
            while pos < len && chars[pos] != ';' {
                pos += 1;
            }
            v
        } else {
            let start = pos;
            while pos < len && chars[pos] != ';' {
                pos += 1;
            }
            chars[start..pos].iter().collect::<String>().trim().to_string()
        };

        let mut name = raw_name.trim().to_ascii_lowercase();
        let extended = name.ends_with('*');
        if extended {
            name.pop();
        }
        let mut section = None;
        if let Some((base, idx)) = name.rsplit_once('*') {
            if let Ok(n) = idx.parse::<u32>() {
                section = Some(n);
                name = base.to_string();
            }
        }

        if !name.is_empty() {
            params.push(RawParam {
                name,
                section,
                extended,
                value,
            });
        }
    }

    params
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two adjacent encoded-words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some((text, consumed)) = decode_one_word(after_start) {
            result.push_str(&text);
            remaining = &after_start[consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=` and report how many bytes were consumed.
fn decode_one_word(s: &str) -> Option<(String, usize)> {
    let (charset, rest) = s.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let encoded_text = &rest[..end];

    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let consumed = charset.len() + 1 + encoding.len() + 1 + end + 2;

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(encoded_text.trim_end_matches('='))
            .ok()?,
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    // RFC 2231 allows a language suffix: "UTF-8*en"
    let charset = charset.split('*').next().unwrap_or(charset);
    Some((decode_charset(charset, &bytes), consumed))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset, falling back to lossy UTF-8.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
        Some(encoding) => {
            let (decoded, _) = encoding.decode_without_bom_handling(bytes);
            decoded.into_owned()
        }
        None => {
            warn!(charset, "Unknown charset in header, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Strip surrounding whitespace and angle brackets: `" <abc@x> "` → `"abc@x"`.
pub fn trim_angle_brackets(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '<' || c == '>')
}

/// Remove parenthesized comments, e.g. `"(PDT)"` at the end of a date.
pub fn strip_comments(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut depth = 0usize;
    for ch in s.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

const DATE_FORMATS: [&str; 10] = [
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %Z",
    "%d %b %Y %H:%M:%S",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const NAMED_ZONES: [(&str, &str); 13] = [
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("CEST", "+0200"),
    ("CET", "+0100"),
    ("JST", "+0900"),
];

const DAY_PREFIXES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Parse an email date string in the common formats seen in real mail.
///
/// Comments are stripped first. Returns `None` (after logging) when nothing
/// matches; callers decide on the fallback.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let cleaned = strip_comments(date_str);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);
    let candidates = [
        no_dow.clone(),
        normalize_imap_date(&no_dow),
        replace_named_zone(&no_dow),
    ];

    for candidate in &candidates {
        for fmt in &DATE_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(Utc.from_utc_datetime(&ndt));
            }
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Last resort: let `mail-parser` have a go at the value.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = mail_parser::MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?;
    DateTime::parse_from_rfc3339(&dt.to_rfc3339())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// `"Thu, 04 Jan 2024 …"` → `"04 Jan 2024 …"`.
fn strip_day_of_week(s: &str) -> String {
    for day in &DAY_PREFIXES {
        if let Some(rest) = s.strip_prefix(day) {
            let rest = rest.strip_prefix(',').unwrap_or(rest);
            if rest.starts_with(char::is_whitespace) {
                return rest.trim().to_string();
            }
        }
    }
    s.to_string()
}

/// IMAP INTERNALDATE style: `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    let Some((day, rest)) = s.split_once('-') else {
        return s.to_string();
    };
    let Some((month, rest)) = rest.split_once('-') else {
        return s.to_string();
    };
    if month.len() != 3 || !month.chars().all(|c| c.is_ascii_alphabetic()) {
        return s.to_string();
    }
    let mut title = month.to_ascii_lowercase();
    title[..1].make_ascii_uppercase();
    format!("{day} {title} {rest}")
}

/// Replace a trailing zone abbreviation with its numeric offset.
fn replace_named_zone(s: &str) -> String {
    for (name, offset) in &NAMED_ZONES {
        if let Some(head) = s.strip_suffix(name) {
            return format!("{head}{offset}");
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfold_and_lookup() {
        let headers = Headers::parse(
            b"Content-Type: multipart/mixed;\r\n\tboundary=\"abc\"\r\nSubject: Hi\r\n",
        );
        assert_eq!(headers.len(), 2);
        assert_eq!(
            headers.get("content-type"),
            Some("multipart/mixed; boundary=\"abc\"")
        );
        assert_eq!(headers.param("Content-Type", "boundary").as_deref(), Some("abc"));
        assert_eq!(headers.main_value("CONTENT-TYPE").as_deref(), Some("multipart/mixed"));
    }

    #[test]
    fn test_param_quoted_with_semicolon() {
        let headers = Headers::from_pairs([(
            "Content-Disposition",
            r#"attachment; filename="a;b \"c\".txt"; size=10"#,
        )]);
        assert_eq!(
            headers.param("content-disposition", "filename").as_deref(),
            Some("a;b \"c\".txt")
        );
        assert_eq!(headers.param("content-disposition", "size").as_deref(), Some("10"));
        assert_eq!(headers.main_value("content-disposition").as_deref(), Some("attachment"));
    }

    #[test]
    fn test_param_missing_or_empty() {
        let headers = Headers::from_pairs([("Content-Type", "text/plain; charset=\"\"")]);
        assert_eq!(headers.param("content-type", "charset"), None);
        assert_eq!(headers.param("content-type", "name"), None);
        assert_eq!(headers.param("x-missing", "name"), None);
    }

    #[test]
    fn test_rfc2231_extended_value() {
        let headers = Headers::from_pairs([(
            "Content-Disposition",
            "attachment; filename*=UTF-8''%D0%B7%D0%B2%D1%96%D1%82.pdf",
        )]);
        assert_eq!(
            headers.param("content-disposition", "filename").as_deref(),
            Some("звіт.pdf")
        );
    }

    #[test]
    fn test_rfc2231_legacy_charsets() {
        let headers = Headers::from_pairs([(
            "Content-Disposition",
            "attachment; filename*=iso-8859-1'fr'r%E9sum%E9.txt",
        )]);
        assert_eq!(
            headers.param("content-disposition", "filename").as_deref(),
            Some("résumé.txt")
        );
        assert_eq!(decode_charset("windows-1251", b"\xcf\xf0\xe8"), "При");
        assert_eq!(decode_charset("x-no-such", b"abc"), "abc");
    }

    #[test]
    fn test_rfc2231_continuations() {
        let headers = Headers::from_pairs([(
            "Content-Type",
            "application/pdf; name*0=\"quarterly_\"; name*1=\"report.pdf\"",
        )]);
        assert_eq!(
            headers.param("content-type", "name").as_deref(),
            Some("quarterly_report.pdf")
        );
    }

    #[test]
    fn test_encoded_word_in_param() {
        let headers = Headers::from_pairs([(
            "Content-Type",
            "application/pdf; name=\"=?UTF-8?B?SG9sYS5wZGY=?=\"",
        )]);
        assert_eq!(headers.param("content-type", "name").as_deref(), Some("Hola.pdf"));
    }

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        let input = "Re: =?UTF-8?B?SG9sYQ==?= there";
        assert_eq!(decode_encoded_words(input), "Re: Hola there");
    }

    #[test]
    fn test_decode_broken_word_is_preserved() {
        assert_eq!(decode_encoded_words("price =? 10"), "price =? 10");
    }

    #[test]
    fn test_trim_angle_brackets() {
        assert_eq!(trim_angle_brackets(" <abc123> "), "abc123");
        assert_eq!(trim_angle_brackets("plain"), "plain");
    }

    #[test]
    fn test_strip_comments() {
        assert_eq!(
            strip_comments("Tue, 1 Jul 2003 10:52:37 +0200 (CEST)"),
            "Tue, 1 Jul 2003 10:52:37 +0200"
        );
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Mon, 1 Jan 2020 00:00:00 +0000").expect("parse");
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2020-01-01 00:00:00");
    }

    #[test]
    fn test_parse_date_with_comment() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0100 (CET)").expect("parse");
        assert_eq!(dt.format("%Y-%m-%d %H").to_string(), "2024-01-04 09");
    }

    #[test]
    fn test_parse_date_named_tz() {
        assert!(parse_date("Thu, 04 Jan 2024 10:00:00 EST").is_some());
    }

    #[test]
    fn test_parse_date_imap_style() {
        let dt = parse_date("16-JUL-2025 03:01:03").expect("parse");
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2025-07-16");
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("not a date at all").is_none());
        assert!(parse_date("   ").is_none());
    }
}
