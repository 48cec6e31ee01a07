//! Label selector matching
//!
//! Kubernetes equality-based selector semantics: a selector built from a map
//! matches a label set when every selector key is present with an equal value.

use std::collections::BTreeMap;

use serde_json::Value;

/// Label set as carried by workloads and services
pub type Labels = BTreeMap<String, String>;

/// Equality-based label selector
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSelector {
    match_labels: Labels,
}

impl LabelSelector {
    /// Build a selector from an untyped spec map.
    ///
    /// Non-string values are dropped, so the selector only gets looser: a
    /// map holding nothing but numeric values becomes an empty selector that
    /// matches every label set.
    pub fn from_value(value: &serde_json::Map<String, Value>) -> Self {
        Self {
            match_labels: string_labels(value),
        }
    }

    /// Whether the selector has no requirements (and so selects everything)
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }

    /// Whether `labels` satisfies every requirement of this selector
    pub fn matches(&self, labels: &Labels) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

impl From<Labels> for LabelSelector {
    fn from(match_labels: Labels) -> Self {
        Self { match_labels }
    }
}

/// Keep only the string-valued entries of an untyped label map
pub fn string_labels(value: &serde_json::Map<String, Value>) -> Labels {
    value
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_subset_of_labels_matches() {
        let selector = LabelSelector::from(labels(&[("app", "reviews")]));
        assert!(selector.matches(&labels(&[("app", "reviews"), ("version", "v1")])));
    }

    #[test]
    fn test_missing_or_different_value_does_not_match() {
        let selector = LabelSelector::from(labels(&[("app", "reviews"), ("version", "v2")]));
        assert!(!selector.matches(&labels(&[("app", "reviews"), ("version", "v1")])));
        assert!(!selector.matches(&labels(&[("app", "reviews")])));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = LabelSelector::default();
        assert!(selector.is_empty());
        assert!(selector.matches(&Labels::new()));
        assert!(selector.matches(&labels(&[("app", "x")])));
    }

    #[test]
    fn test_from_value_drops_non_strings() {
        let value = json!({"version": "v1", "replicas": 3});
        let selector = LabelSelector::from_value(value.as_object().expect("object"));
        assert_eq!(selector, LabelSelector::from(labels(&[("version", "v1")])));
    }

    #[test]
    fn test_numeric_only_selector_matches_everything() {
        let value = json!({"version": 3});
        let selector = LabelSelector::from_value(value.as_object().expect("object"));
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[("version", "v1")])));
    }
}
