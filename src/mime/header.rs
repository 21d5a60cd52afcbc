//! RFC 5322 header block decoding: folding, encoded-words (RFC 2047), and dates.
//!
//! Only the top-level header fields a reader shows or threads on are
//! extracted. Part-level MIME headers come from the parsed object graph.

use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

use crate::mime::filter::charset;
use crate::model::address::EmailAddress;

/// Header fields extracted once when a message is loaded.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MessageHeaders {
    /// First `From:` mailbox.
    pub sender: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub reply_to: Option<EmailAddress>,
    /// Decoded subject (encoded-words resolved).
    pub subject: String,
    /// `Message-ID` without angle brackets; empty when absent.
    pub message_id: String,
    /// `In-Reply-To` without angle brackets.
    pub in_reply_to: Option<String>,
    /// Message-IDs from `References`, oldest first, without angle brackets.
    pub references: Vec<String>,
    pub date: Option<DateTime<Utc>>,
}

impl MessageHeaders {
    /// Parse the header block at the start of `raw` (everything before the first blank line).
    pub fn parse(raw: &[u8]) -> Self {
        let end = find_header_end(raw).unwrap_or(raw.len());
        let text = decode_header_bytes(&raw[..end]);
        let headers = unfold_headers(&text);

        let decoded = |name: &str| get_header(&headers, name).map(|v| decode_encoded_words(&v));
        // Split before decoding so an encoded comma stays inside its display name.
        let mailboxes = |name: &str| {
            get_header(&headers, name)
                .map(|v| decode_mailboxes(&v))
                .unwrap_or_default()
        };

        Self {
            sender: mailboxes("from").into_iter().next().unwrap_or_default(),
            to: mailboxes("to"),
            cc: mailboxes("cc"),
            reply_to: mailboxes("reply-to").into_iter().next(),
            subject: decoded("subject").unwrap_or_default(),
            message_id: get_header(&headers, "message-id")
                .map(|v| strip_angle_brackets(&v))
                .unwrap_or_default(),
            in_reply_to: get_header(&headers, "in-reply-to").map(|v| strip_angle_brackets(&v)),
            references: get_header(&headers, "references")
                .map(|v| extract_message_ids(&v))
                .unwrap_or_default(),
            date: get_header(&headers, "date").and_then(|v| parse_date(&v)),
        }
    }
}

/// Split an address header into mailboxes, then decode each display name.
fn decode_mailboxes(raw: &str) -> Vec<EmailAddress> {
    EmailAddress::parse_list(raw)
        .into_iter()
        .map(|mut mailbox| {
            mailbox.name = decode_encoded_words(&mailbox.name);
            mailbox
        })
        .collect()
}

/// Find the byte offset where headers end (position of the first blank line).
pub fn find_header_end(data: &[u8]) -> Option<usize> {
    if data.starts_with(b"\n") || data.starts_with(b"\r\n") {
        return Some(0);
    }
    (0..data.len()).find(|&i| {
        data[i..].starts_with(b"\n\n") || data[i..].starts_with(b"\r\n\r\n")
    })
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
pub fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            result.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    result
}

/// Get the first value for a header name (case-insensitive).
pub fn get_header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Tokens that fail to decode are kept verbatim.
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
        match decode_one_word(after_start) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &after_start[consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=` and report how many bytes were consumed.
fn decode_one_word(s: &str) -> Option<(String, usize)> {
    let (charset_label, rest) = s.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let encoded_text = &rest[..end];
    let consumed = charset_label.len() + 1 + encoding.len() + 1 + end + 2;

    let bytes = match encoding {
        "B" | "b" => base64::engine::general_purpose::STANDARD
            .decode(encoded_text)
            .or_else(|_| {
                base64::engine::general_purpose::STANDARD_NO_PAD
                    .decode(encoded_text.trim_end_matches('='))
            })
            .ok()?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    // RFC 2231 language suffix: "utf-8*en"
    let label = charset_label.split('*').next().unwrap_or(charset_label);
    Some((charset::decode_to_string(label, &bytes), consumed))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        result.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
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

pub(crate) fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Content between the first `<` and the following `>`, or the trimmed input.
fn strip_angle_brackets(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(len) = trimmed[start..].find('>') {
            return trimmed[start + 1..start + len].to_string();
        }
    }
    trimmed.to_string()
}

/// Every `<…>` token in a `References` header, brackets removed.
fn extract_message_ids(s: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut remaining = s;
    while let Some(start) = remaining.find('<') {
        let Some(len) = remaining[start..].find('>') else {
            break;
        };
        result.push(remaining[start + 1..start + len].to_string());
        remaining = &remaining[start + len + 1..];
    }
    result
}

/// Parse an email date string in the common formats.
///
/// Supports RFC 2822, RFC 3339, and a few broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Drop a trailing comment such as "(CET)" and a leading day-of-week
    let no_comment = trimmed.split(" (").next().unwrap_or(trimmed);
    let no_dow = match no_comment.split_once(", ") {
        Some((dow, rest)) if dow.len() == 3 => rest,
        _ => no_comment,
    };

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(no_dow, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(no_dow, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word_latin1() {
        assert_eq!(
            decode_encoded_words("=?ISO-8859-1?Q?R=E9sum=E9_du_projet?="),
            "Résumé du projet"
        );
    }

    #[test]
    fn test_adjacent_encoded_words_join() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_malformed_word_kept() {
        assert_eq!(decode_encoded_words("50% =?off"), "50% =?off");
    }

    #[test]
    fn test_unfold_headers() {
        let headers = unfold_headers("Subject: a long\n\tsubject\nFrom: x@y.org\n");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0], ("subject".to_string(), "a long subject".to_string()));
    }

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"A: b\nC: d\n\nBody"), Some(9));
        assert_eq!(find_header_end(b"A: b\r\n\r\nBody"), Some(4));
        assert_eq!(find_header_end(b"A: b\n"), None);
    }

    #[test]
    fn test_parse_message_headers() {
        let raw = b"From: =?UTF-8?Q?Jos=C3=A9?= <jose@example.org>\n\
Reply-To: list@example.org\n\
Subject: [PATCH 1/2] fix\n\
Message-ID: <abc@example.org>\n\
In-Reply-To: <parent@example.org>\n\
References: <root@example.org>\n <parent@example.org>\n\
Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
\n\
body\n";
        let h = MessageHeaders::parse(raw);
        assert_eq!(h.sender.name, "José");
        assert_eq!(h.sender.address, "jose@example.org");
        assert_eq!(h.reply_to.unwrap().address, "list@example.org");
        assert_eq!(h.message_id, "abc@example.org");
        assert_eq!(h.in_reply_to.as_deref(), Some("parent@example.org"));
        assert_eq!(h.references, vec!["root@example.org", "parent@example.org"]);
        assert_eq!(
            h.date.unwrap().format("%Y-%m-%d").to_string(),
            "2024-01-04"
        );
    }

    #[test]
    fn test_encoded_comma_stays_in_display_name() {
        let raw = b"From: =?utf-8?Q?Doe=2C_John?= <john@example.org>\n\
To: =?utf-8?B?U21pdGgsIEFubmE=?= <anna@example.org>, bob@example.org\n\
\n";
        let h = MessageHeaders::parse(raw);
        assert_eq!(h.sender.name, "Doe, John");
        assert_eq!(h.sender.address, "john@example.org");
        assert_eq!(h.to.len(), 2);
        assert_eq!(h.to[0].name, "Smith, Anna");
        assert_eq!(h.to[0].address, "anna@example.org");
        assert_eq!(h.to[1].address, "bob@example.org");
    }

    #[test]
    fn test_parse_date_with_comment() {
        assert!(parse_date("Mon, 3 Jun 2024 09:15:00 +0200 (CEST)").is_some());
        assert!(parse_date("not a date").is_none());
    }
}
