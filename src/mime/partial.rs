//! `message/partial` reassembly (RFC 2046 §5.2.2).
//!
//! A fragmented message arrives as several `message/partial` parts sharing an
//! `id` parameter, numbered `1..=total`. The total is only required on the
//! last fragment. Concatenating the decoded bodies in order yields the
//! complete enclosed message.

use std::collections::BTreeMap;

use mail_parser::{MessageParser, MimeHeaders};
use tracing::debug;

use crate::error::{MimeError, Result};
use crate::mime::filter::transfer::TransferEncoding;
use crate::model::content_type::ContentType;

/// How many missing fragment numbers a reconstruction error names.
const MISSING_REPORTED: usize = 5;

/// One fragment of a partial message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub id: String,
    pub number: u32,
    pub total: Option<u32>,
    /// Transfer-decoded fragment body.
    pub body: Vec<u8>,
}

impl Fragment {
    /// Read `id`, `number` and `total` from a `message/partial` content type.
    ///
    /// Returns `None` when `id` or a numeric `number` is missing.
    pub fn from_content_type(content_type: &ContentType, body: Vec<u8>) -> Option<Self> {
        let id = content_type.param("id")?.to_string();
        let number = content_type.param("number")?.trim().parse().ok()?;
        let total = content_type
            .param("total")
            .and_then(|t| t.trim().parse().ok());
        Some(Self {
            id,
            number,
            total,
            body,
        })
    }
}

/// Fragments available for reassembly, keyed by partial id.
#[derive(Debug, Clone, Default)]
pub struct FragmentPool {
    fragments: BTreeMap<String, BTreeMap<u32, Fragment>>,
}

impl FragmentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment, replacing any earlier fragment with the same id and number.
    pub fn insert(&mut self, fragment: Fragment) {
        self.fragments
            .entry(fragment.id.clone())
            .or_default()
            .insert(fragment.number, fragment);
    }

    /// Parse a whole message and add it if its body is a `message/partial`.
    ///
    /// Returns `Ok(false)` for a message that is not a fragment.
    pub fn add_message(&mut self, raw: &[u8]) -> Result<bool> {
        let message = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| MimeError::Unparseable("fragment is not a mail message".into()))?;
        let Some(root) = message.parts.first() else {
            return Ok(false);
        };
        let Some(content_type) = root.content_type().map(ContentType::from) else {
            return Ok(false);
        };
        if !content_type.is_type("message", "partial") {
            return Ok(false);
        }

        let body = message
            .raw_message
            .get(root.raw_body_offset()..root.raw_end_offset())
            .unwrap_or_default();
        let body = TransferEncoding::from_header(root.content_transfer_encoding()).decode(body);

        match Fragment::from_content_type(&content_type, body) {
            Some(fragment) => {
                debug!(id = %fragment.id, number = fragment.number, "Added fragment");
                self.insert(fragment);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Number of fragments held.
    pub fn len(&self) -> usize {
        self.fragments.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reassemble the message `current` belongs to.
    ///
    /// `current` takes precedence over a pooled fragment with the same number.
    /// The total comes from `current` or from any pooled fragment of the set.
    pub fn reassemble(&self, current: &Fragment) -> Result<Vec<u8>> {
        let pooled = self.fragments.get(&current.id);
        let fail = |reason: String| MimeError::Reconstruction {
            partial_id: current.id.clone(),
            reason,
        };

        let total = current
            .total
            .or_else(|| pooled.and_then(|set| set.values().find_map(|f| f.total)))
            .ok_or_else(|| fail("total number of fragments is unknown".into()))?;
        if total == 0 {
            return Err(fail("declared total is zero".into()));
        }

        let mut present: BTreeMap<u32, &Fragment> = pooled
            .into_iter()
            .flat_map(|set| set.range(1..=total))
            .map(|(number, fragment)| (*number, fragment))
            .collect();
        if (1..=total).contains(&current.number) {
            present.insert(current.number, current);
        }

        let missing = total as usize - present.len();
        if missing > 0 {
            // The first `present + MISSING_REPORTED` numbers hold enough gaps
            // to name, so the scan is bounded by what was received.
            let scan = (present.len() + MISSING_REPORTED).min(total as usize) as u32;
            let mut named: Vec<String> = (1..=scan)
                .filter(|n| !present.contains_key(n))
                .take(MISSING_REPORTED)
                .map(|n| n.to_string())
                .collect();
            if missing > named.len() {
                named.push(format!("and {} more", missing - named.len()));
            }
            return Err(fail(format!(
                "missing fragment(s) {} of {total}",
                named.join(", ")
            )));
        }

        let mut raw = Vec::new();
        for fragment in present.values() {
            raw.extend_from_slice(&fragment.body);
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(number: u32, total: Option<u32>, body: &str) -> Fragment {
        Fragment {
            id: "abc@host".into(),
            number,
            total,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_from_content_type() {
        let ct = ContentType::parse("message/partial; id=\"abc@host\"; number=2; total=3").unwrap();
        let f = Fragment::from_content_type(&ct, Vec::new()).unwrap();
        assert_eq!(f.id, "abc@host");
        assert_eq!(f.number, 2);
        assert_eq!(f.total, Some(3));

        let no_number = ContentType::parse("message/partial; id=x").unwrap();
        assert!(Fragment::from_content_type(&no_number, Vec::new()).is_none());
    }

    #[test]
    fn test_reassemble_in_order() {
        let mut pool = FragmentPool::new();
        pool.insert(fragment(3, Some(3), "C"));
        pool.insert(fragment(2, None, "B"));
        let raw = pool.reassemble(&fragment(1, None, "A")).unwrap();
        assert_eq!(raw, b"ABC");
    }

    #[test]
    fn test_single_fragment_set() {
        let pool = FragmentPool::new();
        assert_eq!(pool.reassemble(&fragment(1, Some(1), "all")).unwrap(), b"all");
    }

    #[test]
    fn test_missing_fragments_fail() {
        let mut pool = FragmentPool::new();
        pool.insert(fragment(3, Some(3), "C"));
        let err = pool.reassemble(&fragment(1, None, "A")).unwrap_err();
        match err {
            MimeError::Reconstruction { partial_id, reason } => {
                assert_eq!(partial_id, "abc@host");
                assert!(reason.contains("2 of 3"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_huge_total_fails_fast() {
        let pool = FragmentPool::new();
        let err = pool
            .reassemble(&fragment(1, Some(4_000_000_000), "A"))
            .unwrap_err();
        match err {
            MimeError::Reconstruction { reason, .. } => {
                assert!(reason.starts_with("missing fragment(s) 2, 3, 4, 5, 6, and 3999999994 more"));
                assert!(reason.ends_with("of 4000000000"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_out_of_range_fragments_ignored() {
        let mut pool = FragmentPool::new();
        pool.insert(fragment(7, None, "X"));
        pool.insert(fragment(2, None, "B"));
        let raw = pool.reassemble(&fragment(1, Some(2), "A")).unwrap();
        assert_eq!(raw, b"AB");
    }

    #[test]
    fn test_unknown_total_fails() {
        let pool = FragmentPool::new();
        assert!(matches!(
            pool.reassemble(&fragment(1, None, "A")),
            Err(MimeError::Reconstruction { .. })
        ));
    }

    #[test]
    fn test_add_message_ignores_non_fragments() {
        let mut pool = FragmentPool::new();
        let plain = b"From: a@b.c\r\nSubject: hi\r\n\r\nbody\r\n";
        assert!(!pool.add_message(plain).unwrap());
        assert!(pool.is_empty());

        let partial = b"From: a@b.c\r\nContent-Type: message/partial; id=\"abc@host\"; number=2; total=2\r\n\r\nsecond\r\n";
        assert!(pool.add_message(partial).unwrap());
        assert_eq!(pool.len(), 1);
    }
}
