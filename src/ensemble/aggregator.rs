//! Probability fusion for the classifier ensemble

use crate::error::{EngineError, Result};
use crate::types::label::LabelSet;
use crate::types::probability::{argmax, LabelScore, MemberOutput, ProbabilityVector};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Allowed distance of the configured weight total from 1.0
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// How much the members disagreed about the fused top label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreementSummary {
    /// Max minus min of the top label's probability across members
    pub top_label_spread: f64,
    /// Population standard deviation of the top label's probability
    pub top_label_std_dev: f64,
    /// Members whose own argmax differs from the fused argmax
    pub dissenting_members: usize,
}

impl AgreementSummary {
    /// 1 - std-dev, clamped to [0, 1]. Higher means the members agree more.
    pub fn agreement_score(&self) -> f64 {
        1.0 - self.top_label_std_dev.min(1.0)
    }

    pub fn is_unanimous(&self) -> bool {
        self.dissenting_members == 0
    }
}

/// One member's validated vector, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberVector {
    pub member: String,
    pub probabilities: Vec<LabelScore>,
    pub top_label: String,
    pub top_probability: f64,
    pub weight: f64,
}

/// Fused ensemble output for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    /// Fused distribution in canonical label order
    pub probabilities: Vec<LabelScore>,
    pub top_label: String,
    #[serde(skip)]
    pub top_index: usize,
    pub top_probability: f64,
    pub agreement: AgreementSummary,
    pub members: Vec<MemberVector>,
}

impl FusedResult {
    /// Fused probability at a canonical index.
    pub fn probability(&self, index: usize) -> f64 {
        self.probabilities[index].probability
    }
}

/// Combines per-member probability vectors into one distribution.
///
/// Members and weights are fixed at construction. Inputs are matched to
/// members by position. Weights are kept unnormalized and the weighted sum
/// is divided once by their total, so identical member outputs fuse back to
/// the same value instead of drifting below it.
#[derive(Debug, Clone)]
pub struct EnsembleAggregator {
    labels: LabelSet,
    members: Vec<String>,
    weights: Vec<f64>,
    weight_total: f64,
}

impl EnsembleAggregator {
    /// Create an aggregator with explicit per-member weights.
    ///
    /// Every member needs a weight; weights must be non-negative and sum to 1.
    pub fn new(
        labels: LabelSet,
        members: Vec<String>,
        weights: &HashMap<String, f64>,
    ) -> Result<Self> {
        Self::check_members(&members)?;

        if let Some(unknown) = weights.keys().find(|name| !members.contains(name)) {
            return Err(EngineError::Config(format!(
                "weight given for unknown member '{}'",
                unknown
            )));
        }

        let mut ordered = Vec::with_capacity(members.len());
        for member in &members {
            let weight = weights.get(member).copied().ok_or_else(|| {
                EngineError::Config(format!("no weight configured for member '{}'", member))
            })?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(EngineError::Config(format!(
                    "weight for member '{}' is {}, must be non-negative",
                    member, weight
                )));
            }
            ordered.push(weight);
        }

        let total: f64 = ordered.iter().sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::Config(format!(
                "member weights sum to {:.6}, expected 1.0",
                total
            )));
        }

        Ok(Self {
            labels,
            members,
            weights: ordered,
            weight_total: total,
        })
    }

    /// Create an aggregator that takes the plain arithmetic mean.
    pub fn equal_weights(labels: LabelSet, members: Vec<String>) -> Result<Self> {
        Self::check_members(&members)?;
        let weights = vec![1.0; members.len()];
        let weight_total = members.len() as f64;

        Ok(Self {
            labels,
            members,
            weights,
            weight_total,
        })
    }

    fn check_members(members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Err(EngineError::Config(
                "ensemble needs at least one member".into(),
            ));
        }
        let mut seen = HashSet::new();
        for member in members {
            if !seen.insert(member.as_str()) {
                return Err(EngineError::Config(format!("duplicate member '{}'", member)));
            }
        }
        Ok(())
    }

    /// Fuse one set of member outputs.
    pub fn fuse(&self, outputs: &[MemberOutput]) -> Result<FusedResult> {
        if outputs.len() != self.members.len() {
            return Err(EngineError::ShapeMismatch(format!(
                "received {} member outputs, ensemble has {} members",
                outputs.len(),
                self.members.len()
            )));
        }

        let mut vectors = Vec::with_capacity(outputs.len());
        for (output, expected) in outputs.iter().zip(&self.members) {
            if let Some(name) = &output.member {
                if name != expected {
                    return Err(EngineError::ShapeMismatch(format!(
                        "output from member '{}' where '{}' was expected",
                        name, expected
                    )));
                }
            }
            vectors.push(ProbabilityVector::validate(output, &self.labels)?);
        }

        let mut fused = vec![0.0; self.labels.len()];
        for (vector, &weight) in vectors.iter().zip(&self.weights) {
            for (slot, &p) in fused.iter_mut().zip(vector.values()) {
                *slot += weight * p;
            }
        }
        for slot in fused.iter_mut() {
            *slot /= self.weight_total;
        }

        let total: f64 = fused.iter().sum();
        if total > 0.0 && (total - 1.0).abs() > f64::EPSILON {
            for slot in fused.iter_mut() {
                *slot /= total;
            }
        }

        let (top_index, top_probability) = argmax(&fused);
        let agreement = Self::agreement(&vectors, top_index);

        let members = vectors
            .iter()
            .zip(self.members.iter().zip(self.weights()))
            .map(|(vector, (name, weight))| {
                let (index, p) = vector.argmax();
                MemberVector {
                    member: name.clone(),
                    probabilities: vector.to_scores(&self.labels),
                    top_label: self.labels.name(index).to_string(),
                    top_probability: p,
                    weight,
                }
            })
            .collect();

        let probabilities = self
            .labels
            .iter()
            .zip(&fused)
            .map(|(label, &p)| LabelScore::new(label, p))
            .collect();

        Ok(FusedResult {
            probabilities,
            top_label: self.labels.name(top_index).to_string(),
            top_index,
            top_probability,
            agreement,
            members,
        })
    }

    fn agreement(vectors: &[ProbabilityVector], top_index: usize) -> AgreementSummary {
        let scores: Vec<f64> = vectors.iter().map(|v| v.get(top_index)).collect();

        let max = scores.iter().copied().fold(f64::MIN, f64::max);
        let min = scores.iter().copied().fold(f64::MAX, f64::min);
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance =
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;

        let dissenting_members = vectors
            .iter()
            .filter(|v| v.argmax().0 != top_index)
            .count();

        AgreementSummary {
            top_label_spread: max - min,
            top_label_std_dev: variance.sqrt(),
            dissenting_members,
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn member_names(&self) -> &[String] {
        &self.members
    }

    /// Normalized weights in member order.
    pub fn weights(&self) -> Vec<f64> {
        self.weights.iter().map(|w| w / self.weight_total).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_set() -> LabelSet {
        LabelSet::new(
            vec![
                "coccidiosis".to_string(),
                "healthy".to_string(),
                "salmonella".to_string(),
            ],
            "healthy",
        )
        .unwrap()
    }

    fn members(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn output(scores: [f64; 3]) -> MemberOutput {
        MemberOutput::anonymous(&[
            ("coccidiosis", scores[0]),
            ("healthy", scores[1]),
            ("salmonella", scores[2]),
        ])
    }

    #[test]
    fn test_equal_weight_fusion() {
        let aggregator =
            EnsembleAggregator::equal_weights(label_set(), members(&["a", "b"])).unwrap();

        let fused = aggregator
            .fuse(&[output([0.2, 0.8, 0.0]), output([0.4, 0.6, 0.0])])
            .unwrap();

        assert!((fused.probability(0) - 0.3).abs() < 1e-9);
        assert!((fused.probability(1) - 0.7).abs() < 1e-9);
        assert_eq!(fused.top_label, "healthy");
        assert_eq!(fused.top_index, 1);
        assert!((fused.top_probability - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_fusion() {
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 0.75);
        weights.insert("b".to_string(), 0.25);
        let aggregator =
            EnsembleAggregator::new(label_set(), members(&["a", "b"]), &weights).unwrap();

        let fused = aggregator
            .fuse(&[output([1.0, 0.0, 0.0]), output([0.0, 0.0, 1.0])])
            .unwrap();

        // Expected: 0.75 coccidiosis, 0.25 salmonella
        assert!((fused.probability(0) - 0.75).abs() < 1e-9);
        assert!((fused.probability(2) - 0.25).abs() < 1e-9);
        assert_eq!(fused.top_label, "coccidiosis");
        assert_eq!(aggregator.weights(), vec![0.75, 0.25]);
    }

    #[test]
    fn test_fused_vector_is_normalized() {
        let aggregator =
            EnsembleAggregator::equal_weights(label_set(), members(&["a", "b", "c"])).unwrap();

        // Each vector drifts slightly but within tolerance
        let fused = aggregator
            .fuse(&[
                output([0.3004, 0.5, 0.2]),
                output([0.3, 0.5004, 0.2]),
                output([0.3, 0.5, 0.2004]),
            ])
            .unwrap();

        let total: f64 = fused.probabilities.iter().map(|s| s.probability).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_agreement_summary() {
        let aggregator =
            EnsembleAggregator::equal_weights(label_set(), members(&["a", "b", "c"])).unwrap();

        let fused = aggregator
            .fuse(&[
                output([0.1, 0.9, 0.0]),
                output([0.3, 0.7, 0.0]),
                output([0.6, 0.4, 0.0]),
            ])
            .unwrap();

        assert_eq!(fused.top_label, "healthy");
        assert!((fused.agreement.top_label_spread - 0.5).abs() < 1e-9);
        assert_eq!(fused.agreement.dissenting_members, 1);
        assert!(!fused.agreement.is_unanimous());
        assert!(fused.agreement.top_label_std_dev > 0.0);
        assert_eq!(fused.members[2].top_label, "coccidiosis");
    }

    #[test]
    fn test_single_member_agreement_is_perfect() {
        let aggregator = EnsembleAggregator::equal_weights(label_set(), members(&["a"])).unwrap();
        let fused = aggregator.fuse(&[output([0.1, 0.9, 0.0])]).unwrap();

        assert_eq!(fused.agreement.top_label_spread, 0.0);
        assert_eq!(fused.agreement.agreement_score(), 1.0);
        assert!(fused.agreement.is_unanimous());
    }

    #[test]
    fn test_member_count_mismatch() {
        let aggregator =
            EnsembleAggregator::equal_weights(label_set(), members(&["a", "b"])).unwrap();
        let err = aggregator.fuse(&[output([0.1, 0.9, 0.0])]).unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch(_)));
    }

    #[test]
    fn test_member_name_mismatch() {
        let aggregator =
            EnsembleAggregator::equal_weights(label_set(), members(&["a", "b"])).unwrap();
        let mut second = output([0.1, 0.9, 0.0]);
        second.member = Some("z".to_string());

        let err = aggregator
            .fuse(&[output([0.1, 0.9, 0.0]), second])
            .unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch(_)));
    }

    #[test]
    fn test_invalid_member_vector() {
        let aggregator =
            EnsembleAggregator::equal_weights(label_set(), members(&["a", "b"])).unwrap();
        let err = aggregator
            .fuse(&[output([0.1, 0.9, 0.0]), output([0.5, 0.5, 0.3])])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidProbability(_)));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 0.5);
        weights.insert("b".to_string(), 0.6);
        let err =
            EnsembleAggregator::new(label_set(), members(&["a", "b"]), &weights).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 1.5);
        weights.insert("b".to_string(), -0.5);
        assert!(EnsembleAggregator::new(label_set(), members(&["a", "b"]), &weights).is_err());
    }

    #[test]
    fn test_missing_and_unknown_weights() {
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 1.0);
        assert!(EnsembleAggregator::new(label_set(), members(&["a", "b"]), &weights).is_err());

        weights.insert("ghost".to_string(), 0.0);
        assert!(EnsembleAggregator::new(label_set(), members(&["a"]), &weights).is_err());
    }

    #[test]
    fn test_identical_members_fuse_to_their_value() {
        for n in [3, 6, 7] {
            let names: Vec<String> = (0..n).map(|i| format!("m{}", i)).collect();
            let aggregator = EnsembleAggregator::equal_weights(label_set(), names).unwrap();

            for p in [0.5, 0.8, 0.9] {
                let outputs = vec![output([1.0 - p, p, 0.0]); n];
                let fused = aggregator.fuse(&outputs).unwrap();
                assert!((fused.top_probability - p).abs() < 1e-12, "n={} p={}", n, p);
                assert_eq!(fused.top_label, "healthy");
            }
        }
    }

    #[test]
    fn test_empty_ensemble_rejected() {
        let err = EnsembleAggregator::equal_weights(label_set(), Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
