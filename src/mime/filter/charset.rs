//! Character-set conversion to UTF-8 via `encoding_rs`.

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};
use tracing::{debug, warn};

use super::Filter;

/// Resolve a MIME charset label (`"ISO-8859-1"`, `"utf8"`, `"cp1252"`, …).
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    let label = label.trim().trim_matches('"');
    Encoding::for_label(label.as_bytes()).or_else(|| match label.to_ascii_lowercase().as_str() {
        "utf8" => Some(UTF_8),
        "latin1" | "latin-1" => Some(encoding_rs::WINDOWS_1252),
        _ => None,
    })
}

/// Decode a complete byte string using a named charset.
///
/// Unknown charsets fall back to lossy UTF-8, with a warning.
pub fn decode_to_string(label: &str, bytes: &[u8]) -> String {
    match lookup(label) {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => {
            warn!(charset = label, "Unknown charset, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Streaming conversion from a declared charset to UTF-8.
///
/// Multi-byte sequences split across chunks are carried by the
/// `encoding_rs` decoder itself.
pub struct CharsetDecoder {
    decoder: Decoder,
    had_errors: bool,
}

impl CharsetDecoder {
    /// Build a decoder for the declared charset.
    ///
    /// A missing or unknown charset is recorded in the log and the bytes are
    /// treated as UTF-8.
    pub fn new(declared: Option<&str>) -> Self {
        let encoding = match declared {
            Some(label) => match lookup(label) {
                Some(encoding) => {
                    debug!(charset = label, encoding = encoding.name(), "charset");
                    encoding
                }
                None => {
                    warn!(charset = label, "Unknown charset, treating as UTF-8");
                    UTF_8
                }
            },
            None => {
                warn!("charset: not defined, treating as UTF-8");
                UTF_8
            }
        };
        Self {
            decoder: encoding.new_decoder_without_bom_handling(),
            had_errors: false,
        }
    }

    /// `true` if malformed input was replaced with U+FFFD.
    pub fn had_errors(&self) -> bool {
        self.had_errors
    }

    fn decode(&mut self, mut src: &[u8], last: bool, out: &mut Vec<u8>) {
        let capacity = self
            .decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or(src.len() * 3)
            .max(16);
        let mut text = String::with_capacity(capacity);

        loop {
            let (result, read, had_errors) = self.decoder.decode_to_string(src, &mut text, last);
            self.had_errors |= had_errors;
            src = &src[read..];
            out.extend_from_slice(text.as_bytes());
            text.clear();
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => text.reserve(capacity),
            }
        }
    }
}

impl Filter for CharsetDecoder {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.decode(input, false, out);
    }

    fn complete(&mut self, out: &mut Vec<u8>) {
        self.decode(&[], true, out);
        if self.had_errors {
            warn!("Malformed bytes for declared charset were replaced");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(declared: Option<&str>, chunks: &[&[u8]]) -> String {
        let mut decoder = CharsetDecoder::new(declared);
        let mut out = Vec::new();
        for chunk in chunks {
            decoder.filter(chunk, &mut out);
        }
        decoder.complete(&mut out);
        String::from_utf8(out).expect("decoder emits UTF-8")
    }

    #[test]
    fn test_latin1_cafe() {
        assert_eq!(run(Some("iso-8859-1"), &[b"caf\xE9"]), "café");
    }

    #[test]
    fn test_utf8_sequence_split_across_chunks() {
        assert_eq!(run(Some("UTF-8"), &[b"caf\xC3", b"\xA9!"]), "café!");
    }

    #[test]
    fn test_absent_charset_treated_as_utf8() {
        assert_eq!(run(None, &["naïve".as_bytes()]), "naïve");
    }

    #[test]
    fn test_unknown_charset_falls_back() {
        assert_eq!(run(Some("x-made-up"), &[b"plain"]), "plain");
    }

    #[test]
    fn test_lookup_aliases() {
        assert!(lookup("utf8").is_some());
        assert!(lookup("\"windows-1252\"").is_some());
        assert!(lookup("koi8-r").is_some());
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_decode_to_string_shift_jis() {
        assert_eq!(decode_to_string("Shift_JIS", b"\x82\xa0"), "あ");
    }
}
