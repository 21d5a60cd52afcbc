//! Viewability decisions for leaf parts.

use tracing::warn;

use crate::config::RenderConfig;
use crate::model::content_type::ContentType;

/// Decides which parts can be shown inline and which representation of an
/// alternative group is preferred.
#[derive(Debug, Clone)]
pub struct ContentTypeClassifier {
    viewable: Vec<ContentType>,
    preferred: ContentType,
}

impl ContentTypeClassifier {
    pub fn new(viewable: Vec<ContentType>, preferred: ContentType) -> Self {
        Self {
            viewable,
            preferred,
        }
    }

    /// Build from the `[render]` section. Entries that are not `type/subtype`
    /// are skipped with a warning.
    pub fn from_config(config: &RenderConfig) -> Self {
        let viewable = config
            .viewable_types
            .iter()
            .filter_map(|entry| {
                let parsed = ContentType::parse(entry);
                if parsed.is_none() {
                    warn!(entry = %entry, "Ignoring invalid viewable type");
                }
                parsed
            })
            .collect();

        let preferred = ContentType::parse(&config.preferred_type).unwrap_or_else(|| {
            warn!(
                entry = %config.preferred_type,
                "Invalid preferred type, using text/html"
            );
            ContentType::new("text", "html")
        });

        Self::new(viewable, preferred)
    }

    /// A part declared `attachment` is never viewable; otherwise its type
    /// must be on the allow-list. A part without a type is not viewable.
    pub fn is_viewable(&self, content_type: Option<&ContentType>, disposition: Option<&str>) -> bool {
        if disposition.is_some_and(|d| d.trim().eq_ignore_ascii_case("attachment")) {
            return false;
        }
        match content_type {
            Some(ct) => self.viewable.iter().any(|allowed| ct.same_type(allowed)),
            None => false,
        }
    }

    pub fn is_preferred(&self, content_type: &ContentType) -> bool {
        content_type.same_type(&self.preferred)
    }

    pub fn viewable_types(&self) -> &[ContentType] {
        &self.viewable
    }

    pub fn preferred_type(&self) -> &ContentType {
        &self.preferred
    }
}

impl Default for ContentTypeClassifier {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ct(raw: &str) -> ContentType {
        ContentType::parse(raw).unwrap()
    }

    #[test]
    fn test_allow_list_types_are_viewable() {
        let c = ContentTypeClassifier::default();
        assert!(c.is_viewable(Some(&ct("text/plain; charset=utf-8")), None));
        assert!(c.is_viewable(Some(&ct("TEXT/HTML")), Some("inline")));
        assert!(!c.is_viewable(Some(&ct("image/png")), Some("inline")));
        assert!(!c.is_viewable(Some(&ct("application/pdf")), None));
    }

    #[test]
    fn test_attachment_disposition_is_never_viewable() {
        let c = ContentTypeClassifier::default();
        assert!(!c.is_viewable(Some(&ct("text/plain")), Some("attachment")));
        assert!(!c.is_viewable(Some(&ct("text/html")), Some("Attachment")));
    }

    #[test]
    fn test_missing_type_is_not_viewable() {
        let c = ContentTypeClassifier::default();
        assert!(!c.is_viewable(None, None));
    }

    #[test]
    fn test_preferred_ignores_params() {
        let c = ContentTypeClassifier::default();
        assert!(c.is_preferred(&ct("text/html; charset=utf-8")));
        assert!(!c.is_preferred(&ct("text/plain")));
    }

    #[test]
    fn test_from_config_skips_invalid_entries() {
        let config = RenderConfig {
            viewable_types: vec!["text/plain".into(), "bogus".into(), "text/x-diff".into()],
            preferred_type: "text/plain".into(),
            ..RenderConfig::default()
        };
        let c = ContentTypeClassifier::from_config(&config);
        assert_eq!(c.viewable_types().len(), 2);
        assert!(c.is_viewable(Some(&ct("text/x-diff")), None));
        assert!(c.is_preferred(&ct("text/plain")));
    }
}
