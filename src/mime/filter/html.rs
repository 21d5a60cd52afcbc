//! Plain text → HTML conversion for display in an HTML view.
//!
//! Mirrors what mail readers traditionally do to `text/plain` bodies:
//! newlines become `<br>`, runs of spaces become non-breaking, bare URLs
//! and addresses become links, and cited (`>`) lines are colored.

use std::sync::LazyLock;

use html_escape::{encode_double_quoted_attribute_to_string, encode_text_to_string};
use regex::Regex;

use super::Filter;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?P<url>\b(?:(?:https?|ftp)://|www\.)[^\s<>"']+)|(?P<addr>\b[a-z0-9._%+-]+@[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}\b)"#,
    )
    .expect("link pattern is valid")
});

/// Characters that end a sentence rather than a URL.
const URL_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

const TAB_WIDTH: usize = 8;

/// Which conversions to apply.
#[derive(Debug, Clone, Copy)]
pub struct HtmlOptions {
    pub convert_newlines: bool,
    pub convert_spaces: bool,
    pub convert_urls: bool,
    pub convert_addresses: bool,
    /// Color cited lines with this RGB value.
    pub cite_color: Option<u32>,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            convert_newlines: true,
            convert_spaces: true,
            convert_urls: true,
            convert_addresses: true,
            cite_color: Some(0x1e1e1e),
        }
    }
}

/// Line-buffered text → HTML filter. Input must already be UTF-8.
#[derive(Debug, Default)]
pub struct HtmlFilter {
    options: HtmlOptions,
    line: Vec<u8>,
}

impl HtmlFilter {
    pub fn new(options: HtmlOptions) -> Self {
        Self {
            options,
            line: Vec::new(),
        }
    }

    fn flush_line(&mut self, newline: bool, out: &mut Vec<u8>) {
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        out.extend_from_slice(convert_line(&line, &self.options).as_bytes());
        if newline {
            if self.options.convert_newlines {
                out.extend_from_slice(b"<br>");
            }
            out.push(b'\n');
        }
    }
}

impl Filter for HtmlFilter {
    fn filter(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &b in input {
            if b == b'\n' {
                self.flush_line(true, out);
            } else {
                self.line.push(b);
            }
        }
    }

    fn complete(&mut self, out: &mut Vec<u8>) {
        if !self.line.is_empty() {
            self.flush_line(false, out);
        }
    }
}

/// Convert one line (without its newline) to HTML.
pub fn convert_line(line: &str, options: &HtmlOptions) -> String {
    let mut html = String::with_capacity(line.len() + 16);
    let mut column = 0;
    let mut last = 0;

    for caps in LINK_RE.captures_iter(line) {
        let (m, is_url) = match (caps.name("url"), caps.name("addr")) {
            (Some(m), _) if options.convert_urls => (m, true),
            (None, Some(m)) if options.convert_addresses => (m, false),
            _ => continue,
        };

        let text = if is_url {
            m.as_str().trim_end_matches(URL_TRAILING)
        } else {
            m.as_str()
        };
        if text.is_empty() {
            continue;
        }

        push_text(&mut html, &line[last..m.start()], &mut column, options);

        let href = if is_url {
            if text.len() >= 4 && text[..4].eq_ignore_ascii_case("www.") {
                format!("http://{text}")
            } else {
                text.to_string()
            }
        } else {
            format!("mailto:{text}")
        };
        html.push_str("<a href=\"");
        encode_double_quoted_attribute_to_string(&href, &mut html);
        html.push_str("\">");
        encode_text_to_string(text, &mut html);
        html.push_str("</a>");
        column += text.chars().count();
        last = m.start() + text.len();
    }
    push_text(&mut html, &line[last..], &mut column, options);

    match options.cite_color {
        Some(color) if line.starts_with('>') => {
            format!("<font color=\"#{color:06x}\">{html}</font>")
        }
        _ => html,
    }
}

/// Escape `text`, making spaces non-collapsing if asked.
fn push_text(html: &mut String, text: &str, column: &mut usize, options: &HtmlOptions) {
    let mut prev_space = *column == 0;
    let mut run = 0;
    for (i, ch) in text.char_indices() {
        let nbsp = match ch {
            ' ' if options.convert_spaces && prev_space => 1,
            '\t' if options.convert_spaces => TAB_WIDTH - (*column % TAB_WIDTH),
            _ => 0,
        };
        if nbsp > 0 {
            encode_text_to_string(&text[run..i], html);
            html.push_str(&"&nbsp;".repeat(nbsp));
            run = i + ch.len_utf8();
        }
        *column += nbsp.max(1);
        prev_space = ch == ' ' || ch == '\t';
    }
    encode_text_to_string(&text[run..], html);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(text: &str) -> String {
        let mut filter = HtmlFilter::new(HtmlOptions::default());
        let mut out = Vec::new();
        filter.filter(text.as_bytes(), &mut out);
        filter.complete(&mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_newlines_become_breaks() {
        assert_eq!(convert("one\ntwo"), "one<br>\ntwo");
    }

    #[test]
    fn test_markup_is_escaped() {
        assert_eq!(convert("<b>&\"x\"</b>"), "&lt;b&gt;&amp;\"x\"&lt;/b&gt;");
    }

    #[test]
    fn test_link_href_is_attribute_escaped() {
        let html = convert("https://example.org/?a=1&b=2");
        assert_eq!(
            html,
            "<a href=\"https://example.org/?a=1&amp;b=2\">https://example.org/?a=1&amp;b=2</a>"
        );
    }

    #[test]
    fn test_space_runs_do_not_collapse() {
        assert_eq!(convert("a  b"), "a &nbsp;b");
        assert_eq!(convert(" x"), "&nbsp;x");
    }

    #[test]
    fn test_tab_expands_to_next_stop() {
        assert_eq!(convert("ab\tc"), format!("ab{}c", "&nbsp;".repeat(6)));
    }

    #[test]
    fn test_urls_are_linked_without_trailing_period() {
        let html = convert("see https://example.org/a?b=1.");
        assert_eq!(
            html,
            "see <a href=\"https://example.org/a?b=1\">https://example.org/a?b=1</a>."
        );
    }

    #[test]
    fn test_www_gets_scheme() {
        let html = convert("www.example.org");
        assert!(html.contains("href=\"http://www.example.org\""));
    }

    #[test]
    fn test_addresses_are_linked() {
        let html = convert("mail bob@example.org now");
        assert!(html.contains("<a href=\"mailto:bob@example.org\">bob@example.org</a>"));
    }

    #[test]
    fn test_cited_lines_are_marked() {
        let html = convert("> quoted\nreply");
        assert!(html.starts_with("<font color=\"#1e1e1e\">&gt; quoted</font><br>\n"));
        assert!(html.ends_with("reply"));
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut filter = HtmlFilter::new(HtmlOptions::default());
        let mut out = Vec::new();
        filter.filter(b"http://exa", &mut out);
        assert!(out.is_empty());
        filter.filter(b"mple.org\n", &mut out);
        filter.complete(&mut out);
        let html = String::from_utf8(out).unwrap();
        assert!(html.contains("href=\"http://example.org\""));
    }
}
