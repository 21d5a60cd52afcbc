//! Decoding of a leaf body into display text.
//!
//! Stages run in a fixed order: transfer decoding, charset conversion to
//! UTF-8, then for `text/plain` only CRLF normalization and, when asked,
//! conversion to HTML. `text/html` is passed through after charset
//! conversion.

use crate::error::{MimeError, Result};
use crate::mime::filter::charset::CharsetDecoder;
use crate::mime::filter::crlf::CrlfDecoder;
use crate::mime::filter::html::{HtmlFilter, HtmlOptions};
use crate::mime::filter::transfer::TransferEncoding;
use crate::mime::filter::FilterChain;
use crate::mime::node::{ContentNode, NodeKind};

/// One step of a [`DecodingPipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    TransferDecode(TransferEncoding),
    /// Declared charset, if any.
    Charset(Option<String>),
    Crlf,
    /// Plain text to HTML, with the color used for cited lines.
    Html { cite_color: u32 },
}

/// The stages needed to display one leaf, bound to its body.
#[derive(Debug)]
pub struct DecodingPipeline<'a> {
    body: &'a [u8],
    stages: Vec<Stage>,
}

impl<'a> DecodingPipeline<'a> {
    /// Plan the pipeline for `node`.
    ///
    /// Fails with [`MimeError::UnsupportedContent`] unless `node` is a
    /// `text/plain` or `text/html` leaf.
    pub fn new(node: &'a ContentNode, html: bool, cite_color: u32) -> Result<Self> {
        let content_type = node.content_type();
        let unsupported = || MimeError::UnsupportedContent {
            id: node.id(),
            content_type: content_type.essence(),
        };

        let NodeKind::Leaf(leaf) = node.kind() else {
            return Err(unsupported());
        };
        let plain = content_type.is_type("text", "plain");
        if !plain && !content_type.is_type("text", "html") {
            return Err(unsupported());
        }

        let mut stages = vec![
            Stage::TransferDecode(leaf.transfer_encoding),
            Stage::Charset(content_type.charset().map(String::from)),
        ];
        if plain {
            stages.push(Stage::Crlf);
            if html {
                stages.push(Stage::Html { cite_color });
            }
        }

        Ok(Self {
            body: &leaf.body,
            stages,
        })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage over the body and return the UTF-8 result.
    pub fn run(self) -> String {
        let mut chain = FilterChain::new();
        for stage in self.stages {
            match stage {
                Stage::TransferDecode(encoding) => {
                    if let Some(decoder) = encoding.decoder() {
                        chain.push(decoder);
                    }
                }
                Stage::Charset(charset) => chain.push(CharsetDecoder::new(charset.as_deref())),
                Stage::Crlf => chain.push(CrlfDecoder::default()),
                Stage::Html { cite_color } => chain.push(HtmlFilter::new(HtmlOptions {
                    cite_color: Some(cite_color),
                    ..HtmlOptions::default()
                })),
            }
        }

        let out = chain.run(self.body);
        match String::from_utf8(out) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

/// Decode `node` for display, as [`DecodingPipeline::run`].
pub fn decode(node: &ContentNode, html: bool, cite_color: u32) -> Result<String> {
    Ok(DecodingPipeline::new(node, html, cite_color)?.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::node::{next_id, LeafPart};
    use crate::model::content_type::ContentType;

    fn leaf(ct: &str, encoding: TransferEncoding, body: &[u8]) -> ContentNode {
        ContentNode::new(
            next_id(),
            ContentType::parse(ct).unwrap(),
            NodeKind::Leaf(LeafPart {
                body: body.to_vec(),
                transfer_encoding: encoding,
                viewable: true,
                ..LeafPart::default()
            }),
        )
    }

    #[test]
    fn test_latin1_to_utf8() {
        let node = leaf(
            "text/plain; charset=iso-8859-1",
            TransferEncoding::Identity,
            b"caf\xe9",
        );
        assert_eq!(decode(&node, false, 0).unwrap(), "café");
    }

    #[test]
    fn test_quoted_printable_latin1() {
        let node = leaf(
            "text/plain; charset=iso-8859-1",
            TransferEncoding::QuotedPrintable,
            b"caf=E9 au=\r\n lait\r\n",
        );
        assert_eq!(decode(&node, false, 0).unwrap(), "café au lait\n");
    }

    #[test]
    fn test_base64_utf8_with_crlf() {
        // "line one\r\nline two\r\n"
        let node = leaf(
            "text/plain; charset=utf-8",
            TransferEncoding::Base64,
            b"bGluZSBvbmUNCmxpbmUgdHdvDQo=\r\n",
        );
        assert_eq!(decode(&node, false, 0).unwrap(), "line one\nline two\n");
    }

    #[test]
    fn test_plain_to_html() {
        let node = leaf("text/plain", TransferEncoding::Identity, b"> a & b\r\nok\r\n");
        let html = decode(&node, true, 0x112233).unwrap();
        assert_eq!(
            html,
            "<font color=\"#112233\">&gt; a &amp; b</font><br>\nok<br>\n"
        );
    }

    #[test]
    fn test_html_passes_through() {
        let node = leaf("text/html; charset=utf-8", TransferEncoding::Identity, b"<p>Hi</p>\r\n");
        let pipeline = DecodingPipeline::new(&node, true, 0).unwrap();
        assert_eq!(pipeline.stages().len(), 2);
        assert_eq!(pipeline.run(), "<p>Hi</p>\r\n");
    }

    #[test]
    fn test_stage_order_for_plain() {
        let node = leaf("text/plain; charset=utf-8", TransferEncoding::Base64, b"");
        let pipeline = DecodingPipeline::new(&node, true, 7).unwrap();
        assert_eq!(
            pipeline.stages(),
            &[
                Stage::TransferDecode(TransferEncoding::Base64),
                Stage::Charset(Some("utf-8".into())),
                Stage::Crlf,
                Stage::Html { cite_color: 7 },
            ]
        );
    }

    #[test]
    fn test_missing_charset_is_read_as_utf8() {
        let node = leaf("text/plain", TransferEncoding::Identity, "naïve".as_bytes());
        assert_eq!(decode(&node, false, 0).unwrap(), "naïve");
    }

    #[test]
    fn test_unsupported_types_fail() {
        let image = leaf("image/png", TransferEncoding::Base64, b"iVBORw0KGgo=");
        assert!(matches!(
            decode(&image, false, 0),
            Err(MimeError::UnsupportedContent { .. })
        ));

        let multipart = ContentNode::new(
            next_id(),
            ContentType::new("multipart", "mixed"),
            NodeKind::Multipart,
        );
        assert!(matches!(
            DecodingPipeline::new(&multipart, false, 0),
            Err(MimeError::UnsupportedContent { .. })
        ));
    }
}
