//! Structured `Content-Type` values: media type, subtype, and parameters.

use std::fmt;

/// An owned, lowercase-normalized content type.
///
/// Built either from a parsed `mail_parser::ContentType` or from a short
/// `type/subtype` string (as found in the configuration allow-list).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentType {
    pub media_type: String,
    pub subtype: String,
    /// Parameters in header order; names are lowercase, values verbatim.
    pub params: Vec<(String, String)>,
}

impl ContentType {
    pub fn new(media_type: &str, subtype: &str) -> Self {
        Self {
            media_type: media_type.trim().to_ascii_lowercase(),
            subtype: subtype.trim().to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    /// Parse `type/subtype[; name=value]*`. Returns `None` without a `/`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut fields = raw.split(';');
        let essence = fields.next()?.trim();
        let (media_type, subtype) = essence.split_once('/')?;
        if media_type.trim().is_empty() || subtype.trim().is_empty() {
            return None;
        }

        let mut ct = Self::new(media_type, subtype);
        for field in fields {
            if let Some((name, value)) = field.split_once('=') {
                ct.params.push((
                    name.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                ));
            }
        }
        Some(ct)
    }

    /// Match against a media type and subtype; `*` matches anything.
    pub fn is_type(&self, media_type: &str, subtype: &str) -> bool {
        (media_type == "*" || self.media_type.eq_ignore_ascii_case(media_type))
            && (subtype == "*" || self.subtype.eq_ignore_ascii_case(subtype))
    }

    /// `true` when media type and subtype equal `other`'s; parameters are ignored.
    pub fn same_type(&self, other: &ContentType) -> bool {
        self.is_type(&other.media_type, &other.subtype)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.media_type, self.subtype)
    }
}

/// RFC 2045 §5.2: a part without a `Content-Type` is `text/plain; charset=us-ascii`.
impl Default for ContentType {
    fn default() -> Self {
        let mut ct = Self::new("text", "plain");
        ct.params.push(("charset".to_string(), "us-ascii".to_string()));
        ct
    }
}

impl From<&mail_parser::ContentType<'_>> for ContentType {
    fn from(parsed: &mail_parser::ContentType<'_>) -> Self {
        let mut ct = Self::new(parsed.ctype(), parsed.subtype().unwrap_or_default());
        if let Some(attributes) = parsed.attributes.as_ref() {
            ct.params = attributes
                .iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect();
        }
        ct
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.media_type, self.subtype)?;
        for (name, value) in &self.params {
            write!(f, "; {name}=\"{value}\"")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_params() {
        let ct = ContentType::parse("Text/Plain; charset=\"ISO-8859-1\"; format=flowed").unwrap();
        assert_eq!(ct.essence(), "text/plain");
        assert_eq!(ct.charset(), Some("ISO-8859-1"));
        assert_eq!(ct.param("FORMAT"), Some("flowed"));
    }

    #[test]
    fn test_parse_rejects_missing_subtype() {
        assert!(ContentType::parse("text").is_none());
        assert!(ContentType::parse("text/").is_none());
    }

    #[test]
    fn test_is_type_wildcard() {
        let ct = ContentType::new("image", "png");
        assert!(ct.is_type("image", "*"));
        assert!(ct.is_type("IMAGE", "PNG"));
        assert!(!ct.is_type("text", "*"));
    }

    #[test]
    fn test_default_is_us_ascii_plain() {
        let ct = ContentType::default();
        assert!(ct.is_type("text", "plain"));
        assert_eq!(ct.charset(), Some("us-ascii"));
    }
}
