//! Content-Transfer-Encoding decoders (RFC 2045 §6).

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use tracing::warn;

use super::Filter;
use crate::mime::header::hex_value;

/// Tolerates missing padding and stray trailing bits, as mail in the wild does.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// The transfer encoding a part declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub enum TransferEncoding {
    /// `7bit`, `8bit`, `binary`, or no header at all.
    #[default]
    Identity,
    Base64,
    QuotedPrintable,
}

impl TransferEncoding {
    /// Interpret a `Content-Transfer-Encoding` header value.
    ///
    /// Unknown tokens are logged and treated as identity.
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Identity;
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "7bit" | "8bit" | "binary" | "" => Self::Identity,
            other => {
                warn!(encoding = other, "Unknown transfer encoding, passing bytes through");
                Self::Identity
            }
        }
    }

    /// A streaming decoder for this encoding, or `None` for identity.
    pub fn decoder(self) -> Option<Box<dyn Filter>> {
        match self {
            Self::Identity => None,
            Self::Base64 => Some(Box::new(Base64Decoder::default())),
            Self::QuotedPrintable => Some(Box::new(QuotedPrintableDecoder::default())),
        }
    }

    /// Decode a whole body at once.
    pub fn decode(self, body: &[u8]) -> Vec<u8> {
        match self.decoder() {
            None => body.to_vec(),
            Some(mut decoder) => {
                let mut out = Vec::with_capacity(body.len());
                decoder.filter(body, &mut out);
                decoder.complete(&mut out);
                out
            }
        }
    }
}

impl Filter for Box<dyn Filter> {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        (**self).filter(input, out)
    }

    fn complete(&mut self, out: &mut Vec<u8>) {
        (**self).complete(out)
    }
}

/// Base64 decoder that skips whitespace and other non-alphabet bytes.
#[derive(Debug, Default)]
pub struct Base64Decoder {
    /// Alphabet characters not yet forming a complete quad.
    pending: Vec<u8>,
    /// Set after a padded quad: anything later is trailing garbage.
    finished: bool,
    warned: bool,
}

impl Base64Decoder {
    fn decode_quads(&mut self, quads: &[u8], out: &mut Vec<u8>) {
        if LENIENT_BASE64.decode_vec(quads, out).is_ok() {
            return;
        }
        // Salvage what we can, one quad at a time
        for quad in quads.chunks(4) {
            if LENIENT_BASE64.decode_vec(quad, out).is_err() && !self.warned {
                warn!("Invalid base64 quad in body, skipping");
                self.warned = true;
            }
        }
    }
}

impl Filter for Base64Decoder {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        if self.finished {
            return;
        }

        for &b in input {
            if b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=' {
                self.pending.push(b);
            }
        }

        let whole = self.pending.len() / 4 * 4;
        if whole == 0 {
            return;
        }

        // Stop at the first quad carrying padding
        let end = self.pending[..whole]
            .chunks(4)
            .position(|quad| quad.contains(&b'='))
            .map(|i| {
                self.finished = true;
                (i + 1) * 4
            })
            .unwrap_or(whole);

        let quads: Vec<u8> = self.pending.drain(..end).collect();
        self.decode_quads(&quads, out);
        if self.finished {
            self.pending.clear();
        }
    }

    fn complete(&mut self, out: &mut Vec<u8>) {
        let rest: Vec<u8> = std::mem::take(&mut self.pending);
        let rest: Vec<u8> = rest.into_iter().filter(|&b| b != b'=').collect();
        if rest.len() >= 2 {
            self.decode_quads(&rest, out);
        }
    }
}

/// Quoted-printable decoder: `=XX` escapes and soft line breaks.
#[derive(Debug, Default)]
pub struct QuotedPrintableDecoder {
    /// An `=` sequence cut off at the end of the previous chunk.
    carry: Vec<u8>,
}

impl Filter for QuotedPrintableDecoder {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(input);

        let mut i = 0;
        while i < data.len() {
            let b = data[i];
            if b != b'=' {
                out.push(b);
                i += 1;
                continue;
            }

            match (data.get(i + 1), data.get(i + 2)) {
                (Some(b'\n'), _) => i += 2,
                (Some(b'\r'), Some(b'\n')) => i += 3,
                (Some(&hi), Some(&lo)) => match (hex_value(hi), hex_value(lo)) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'=');
                        i += 1;
                    }
                },
                // Incomplete escape: wait for the next chunk
                _ => {
                    self.carry = data[i..].to_vec();
                    return;
                }
            }
        }
    }

    fn complete(&mut self, out: &mut Vec<u8>) {
        let carry = std::mem::take(&mut self.carry);
        // A lone "=" or "=\r" at the very end is a soft break without its newline
        if carry != b"=" && carry != b"=\r" {
            out.extend_from_slice(&carry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header() {
        assert_eq!(TransferEncoding::from_header(None), TransferEncoding::Identity);
        assert_eq!(
            TransferEncoding::from_header(Some(" Base64 ")),
            TransferEncoding::Base64
        );
        assert_eq!(
            TransferEncoding::from_header(Some("quoted-printable")),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(
            TransferEncoding::from_header(Some("x-uuencode")),
            TransferEncoding::Identity
        );
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let body = b"SGVsbG8s\r\nIHdvcmxk\r\nIQ==\r\n";
        assert_eq!(TransferEncoding::Base64.decode(body), b"Hello, world!");
    }

    #[test]
    fn test_base64_split_across_chunks() {
        let mut decoder = Base64Decoder::default();
        let mut out = Vec::new();
        decoder.filter(b"SGVsb", &mut out);
        decoder.filter(b"G8gdGhl\ncmU", &mut out);
        decoder.complete(&mut out);
        assert_eq!(out, b"Hello there");
    }

    #[test]
    fn test_base64_ignores_trailing_garbage() {
        let body = b"aGk=\n-- \nsignature";
        assert_eq!(TransferEncoding::Base64.decode(body), b"hi");
    }

    #[test]
    fn test_quoted_printable_escapes_and_soft_breaks() {
        let body = b"caf=C3=A9 au =\r\nlait=3D1\n";
        assert_eq!(
            TransferEncoding::QuotedPrintable.decode(body),
            "café au lait=1\n".as_bytes()
        );
    }

    #[test]
    fn test_quoted_printable_escape_split_across_chunks() {
        let mut decoder = QuotedPrintableDecoder::default();
        let mut out = Vec::new();
        decoder.filter(b"a=C", &mut out);
        decoder.filter(b"3=A9b=", &mut out);
        decoder.filter(b"\nc", &mut out);
        decoder.complete(&mut out);
        assert_eq!(out, "aébc".as_bytes());
    }

    #[test]
    fn test_quoted_printable_invalid_escape_kept() {
        assert_eq!(TransferEncoding::QuotedPrintable.decode(b"1 =ZZ 2"), b"1 =ZZ 2");
    }

    #[test]
    fn test_identity_passthrough() {
        assert_eq!(TransferEncoding::Identity.decode(b"=41"), b"=41");
    }
}
