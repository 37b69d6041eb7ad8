//! Canonical label set shared by every ensemble member

use crate::error::{EngineError, Result};
use serde::Serialize;
use std::collections::HashSet;

/// The fixed, ordered set of health categories.
///
/// Order matters only for tie-breaking: when two labels share the maximal
/// probability the one listed first wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSet {
    labels: Vec<String>,
    #[serde(skip)]
    healthy: usize,
}

impl LabelSet {
    /// Build a label set, validating uniqueness and the healthy label.
    pub fn new(labels: Vec<String>, healthy: &str) -> Result<Self> {
        if labels.len() < 2 {
            return Err(EngineError::Config(format!(
                "label set needs at least two labels, got {}",
                labels.len()
            )));
        }

        let mut seen = HashSet::new();
        for label in &labels {
            if label.trim().is_empty() {
                return Err(EngineError::Config("label names must not be empty".into()));
            }
            if !seen.insert(label.as_str()) {
                return Err(EngineError::Config(format!("duplicate label '{}'", label)));
            }
        }

        let healthy = labels.iter().position(|l| l == healthy).ok_or_else(|| {
            EngineError::Config(format!("healthy label '{}' not in label set", healthy))
        })?;

        Ok(Self { labels, healthy })
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label name at a canonical index.
    pub fn name(&self, index: usize) -> &str {
        &self.labels[index]
    }

    /// Canonical index of a label, if known.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Canonical index of the healthy label.
    pub fn healthy_index(&self) -> usize {
        self.healthy
    }

    /// Name of the healthy label.
    pub fn healthy_name(&self) -> &str {
        &self.labels[self.healthy]
    }

    pub fn is_healthy(&self, index: usize) -> bool {
        index == self.healthy
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_label_set_lookup() {
        let set = LabelSet::new(labels(&["coccidiosis", "healthy", "salmonella"]), "healthy")
            .unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.healthy_index(), 1);
        assert_eq!(set.healthy_name(), "healthy");
        assert_eq!(set.index_of("salmonella"), Some(2));
        assert_eq!(set.index_of("newcastle_disease"), None);
        assert!(set.is_healthy(1));
        assert!(!set.is_healthy(0));
    }

    #[test]
    fn test_missing_healthy_label() {
        let err = LabelSet::new(labels(&["coccidiosis", "salmonella"]), "healthy").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_duplicate_label() {
        let err = LabelSet::new(labels(&["healthy", "healthy"]), "healthy").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_single_label_rejected() {
        assert!(LabelSet::new(labels(&["healthy"]), "healthy").is_err());
    }
}
