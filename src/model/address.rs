//! Mailbox parsing for the sender and recipient header fields.

use std::fmt;

/// One mailbox from an address header.
///
/// - `"Ana Pérez <ana@example.org>"` → `name = "Ana Pérez"`, `address = "ana@example.org"`
/// - `"ana@example.org"` → `name = ""`, `address = "ana@example.org"`
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EmailAddress {
    /// Display name, empty when the header carries only an address.
    pub name: String,
    /// The bare `local@domain` part.
    pub address: String,
}

impl EmailAddress {
    /// Parse a single mailbox. Unparseable input is kept verbatim as `address`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    name: unquote(&trimmed[..open]),
                    address: trimmed[open + 1..close].trim().to_string(),
                };
            }
        }

        Self {
            name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Parse a comma-separated mailbox list, honoring quoted and bracketed commas.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        split_mailboxes(raw)
            .into_iter()
            .map(Self::parse)
            .filter(|a| !a.is_empty())
            .collect()
    }

    /// `true` when neither a name nor an address was found.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.address.is_empty()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.address)
        } else {
            write!(f, "{} <{}>", self.name, self.address)
        }
    }
}

/// Split on top-level commas only.
fn split_mailboxes(raw: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut bracketed = false;

    for (i, ch) in raw.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '<' if !quoted => bracketed = true,
            '>' if !quoted => bracketed = false,
            ',' if !quoted && !bracketed => {
                pieces.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&raw[start..]);
    pieces
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("Ana Pérez <ana@example.org>");
        assert_eq!(addr.name, "Ana Pérez");
        assert_eq!(addr.address, "ana@example.org");
    }

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("  ana@example.org ");
        assert_eq!(addr.name, "");
        assert_eq!(addr.address, "ana@example.org");
    }

    #[test]
    fn test_parse_list_with_quoted_comma() {
        let list = EmailAddress::parse_list("\"Doe, Jane\" <jane@a.org>, bob@b.org,");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Doe, Jane");
        assert_eq!(list[1].address, "bob@b.org");
    }

    #[test]
    fn test_display() {
        let addr = EmailAddress::parse("Bob <bob@b.org>");
        assert_eq!(addr.to_string(), "Bob <bob@b.org>");
        assert_eq!(EmailAddress::parse("bob@b.org").to_string(), "bob@b.org");
    }
}
