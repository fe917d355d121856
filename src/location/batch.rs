//! Batch preparation: normalize, drop blanks, dedupe, cap.

use super::normalize::normalize;
use super::types::CanonicalName;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What an upstream caller asks for: raw names in display order plus the
/// ceiling on distinct external lookups for this invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub names: Vec<String>,
    pub max_lookups: usize,
}

impl BatchRequest {
    pub fn new<I, S>(names: I, max_lookups: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            max_lookups,
        }
    }
}

/// The minimal ordered key set for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBatch {
    /// Distinct canonical names to resolve, first-seen order, at most `max_lookups`.
    pub keys: Vec<CanonicalName>,
    /// Distinct canonical names before the ceiling was applied.
    pub distinct: usize,
    /// Keys cut by the ceiling, in first-seen order.
    pub omitted: Vec<CanonicalName>,
}

impl PreparedBatch {
    pub fn truncated(&self) -> bool {
        !self.omitted.is_empty()
    }
}

/// Collapse raw names into the keys that actually need resolving.
pub fn prepare<I, S>(names: I, max_lookups: usize) -> PreparedBatch
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    let mut omitted = Vec::new();

    for raw in names {
        let key = normalize(raw.as_ref());
        if key.is_unknown() || !seen.insert(key.clone()) {
            continue;
        }
        if keys.len() < max_lookups {
            keys.push(key);
        } else {
            omitted.push(key);
        }
    }

    PreparedBatch {
        distinct: keys.len() + omitted.len(),
        keys,
        omitted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(keys: &[CanonicalName]) -> Vec<&str> {
        keys.iter().map(|k| k.as_str()).collect()
    }

    #[test]
    fn test_empty_input() {
        let batch = prepare(Vec::<String>::new(), 10);
        assert!(batch.keys.is_empty());
        assert_eq!(batch.distinct, 0);
        assert!(!batch.truncated());
    }

    #[test]
    fn test_delhi_variants_collapse() {
        let batch = prepare(["Delhi", " delhi ", "NCT of Delhi", "Mumbai"], 10);
        assert_eq!(strs(&batch.keys), vec!["Delhi", "Mumbai"]);
        assert!(!batch.truncated());
    }

    #[test]
    fn test_first_seen_order_not_sorted() {
        let batch = prepare(["Pune", "Chennai", "Ahmedabad", "Pune", "Bombay"], 10);
        assert_eq!(strs(&batch.keys), vec!["Pune", "Chennai", "Ahmedabad", "Mumbai"]);
    }

    #[test]
    fn test_drops_blank_and_sentinel() {
        let batch = prepare(["", "  ", "Unknown", "unknown", "Hosur"], 10);
        assert_eq!(strs(&batch.keys), vec!["Hosur"]);
        assert_eq!(batch.distinct, 1);
    }

    #[test]
    fn test_truncates_fifty_to_thirty() {
        let names: Vec<String> = (0..50).map(|i| format!("Place {i:02}")).collect();
        let batch = prepare(&names, 30);
        assert_eq!(batch.keys.len(), 30);
        assert_eq!(batch.distinct, 50);
        assert!(batch.truncated());
        assert_eq!(batch.keys[0].as_str(), "Place 00");
        assert_eq!(batch.keys[29].as_str(), "Place 29");
        assert_eq!(batch.omitted.len(), 20);
        assert_eq!(batch.omitted[0].as_str(), "Place 30");
    }

    #[test]
    fn test_duplicates_do_not_count_against_ceiling() {
        let batch = prepare(["A", "a", "A", "B", "B", "C"], 3);
        assert_eq!(strs(&batch.keys), vec!["A", "a", "B"]);
        assert_eq!(strs(&batch.omitted), vec!["C"]);
    }

    #[test]
    fn test_never_exceeds_ceiling() {
        let names: Vec<String> = (0..40).map(|i| format!("N{}", i % 17)).collect();
        for k in 0..20 {
            let batch = prepare(&names, k);
            assert!(batch.keys.len() <= k);
            assert_eq!(batch.keys.len() + batch.omitted.len(), 17);
        }
    }

    #[test]
    fn test_zero_ceiling_omits_everything() {
        let batch = prepare(["Pune"], 0);
        assert!(batch.keys.is_empty());
        assert!(batch.truncated());
    }

    #[test]
    fn test_request_builder() {
        let req = BatchRequest::new(["Pune", "Hosur"], 30);
        assert_eq!(req.names, vec!["Pune".to_string(), "Hosur".to_string()]);
        assert_eq!(req.max_lookups, 30);
    }
}
