//! Mailbox addresses from `From`-style header values (RFC 5322 §3.4).

use crate::parser::header::decode_encoded_words;

/// A parsed mailbox: optional display name plus the bare address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"juan@ejemplo.com (Juan)"` → `display_name = "Juan"`, `address = "juan@ejemplo.com"`
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty), encoded-words resolved.
    pub display_name: String,
    /// The bare address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Parse a single mailbox. Unrecognized input is kept verbatim as `address`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    display_name: clean_display_name(&trimmed[..open]),
                    address: trimmed[open + 1..close].trim().to_string(),
                };
            }
        }

        // Old style: "user@example.com (Display Name)"
        if let (Some(open), true) = (trimmed.find('('), trimmed.ends_with(')')) {
            return Self {
                display_name: clean_display_name(&trimmed[open + 1..trimmed.len() - 1]),
                address: trimmed[..open].trim().to_string(),
            };
        }

        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Parse a comma-separated address list, ignoring commas inside quotes,
    /// angle brackets and comments. Entries without an address are dropped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut angle_depth = 0usize;
        let mut comment_depth = 0usize;

        for ch in raw.chars() {
            match ch {
                '"' if comment_depth == 0 => in_quotes = !in_quotes,
                '<' if !in_quotes => angle_depth += 1,
                '>' if !in_quotes => angle_depth = angle_depth.saturating_sub(1),
                '(' if !in_quotes => comment_depth += 1,
                ')' if !in_quotes => comment_depth = comment_depth.saturating_sub(1),
                ',' if !in_quotes && angle_depth == 0 && comment_depth == 0 => {
                    results.push(Self::parse(&current));
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }
        results.push(Self::parse(&current));

        results.retain(|a| !a.address.is_empty());
        results
    }
}

/// Strip quotes and decode encoded-words in a display name.
fn clean_display_name(s: &str) -> String {
    let trimmed = s.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed);
    decode_encoded_words(unquoted.trim())
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} <{}>", self.display_name, self.address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("a@b.com");
        assert_eq!(addr.address, "a@b.com");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("\"Last, First\" <user@example.com>");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "Last, First");
    }

    #[test]
    fn test_parse_comment_form() {
        let addr = EmailAddress::parse("user@example.com (User Name)");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "User Name");
    }

    #[test]
    fn test_parse_encoded_display_name() {
        let addr = EmailAddress::parse("=?UTF-8?B?SG9sYQ==?= <hola@example.com>");
        assert_eq!(addr.display_name, "Hola");
    }

    #[test]
    fn test_parse_list_with_quoted_comma() {
        let list = EmailAddress::parse_list("\"Last, First\" <a@b.com>, other@c.com, ");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].address, "a@b.com");
        assert_eq!(list[1].address, "other@c.com");
    }

    #[test]
    fn test_display() {
        let addr = EmailAddress::parse("Alice <alice@example.com>");
        assert_eq!(addr.to_string(), "Alice <alice@example.com>");
        assert_eq!(EmailAddress::parse("bob@example.com").to_string(), "bob@example.com");
    }
}
