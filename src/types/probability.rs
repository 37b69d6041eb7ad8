//! Per-member classifier outputs and validated probability vectors

use crate::error::{EngineError, Result};
use crate::types::label::LabelSet;
use serde::{Deserialize, Serialize};

/// Allowed distance of a vector's sum from 1.0
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Probability assigned to one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub probability: f64,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, probability: f64) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// Raw output of one ensemble member for a single image, as received from
/// the inference layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberOutput {
    /// Member name; checked against the configured member at this position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,

    /// Scores in canonical label order
    pub probabilities: Vec<LabelScore>,
}

impl MemberOutput {
    /// Create an output from `(label, probability)` pairs.
    pub fn new(member: impl Into<String>, scores: &[(&str, f64)]) -> Self {
        Self {
            member: Some(member.into()),
            probabilities: scores
                .iter()
                .map(|(label, p)| LabelScore::new(*label, *p))
                .collect(),
        }
    }

    /// Create an anonymous output, identified only by position.
    pub fn anonymous(scores: &[(&str, f64)]) -> Self {
        Self {
            member: None,
            ..Self::new("", scores)
        }
    }
}

/// Index and value of the largest entry, first index on ties.
///
/// Callers guarantee a non-empty slice.
pub fn argmax(values: &[f64]) -> (usize, f64) {
    let mut best = (0, values[0]);
    for (index, &p) in values.iter().enumerate().skip(1) {
        if p > best.1 {
            best = (index, p);
        }
    }
    best
}

/// A discrete distribution over the canonical label set.
///
/// Only constructed through validation, so `values[i]` always belongs to
/// canonical label `i`, every entry is finite and non-negative, and the sum
/// is within tolerance of 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityVector {
    values: Vec<f64>,
}

impl ProbabilityVector {
    /// Validate a member output against the canonical label set.
    pub fn validate(output: &MemberOutput, labels: &LabelSet) -> Result<Self> {
        let source = output.member.as_deref().unwrap_or("<anonymous>");

        if output.probabilities.len() != labels.len() {
            return Err(EngineError::ShapeMismatch(format!(
                "member {} reported {} labels, expected {}",
                source,
                output.probabilities.len(),
                labels.len()
            )));
        }

        for (index, (score, expected)) in output.probabilities.iter().zip(labels.iter()).enumerate() {
            if score.label != expected {
                return Err(EngineError::ShapeMismatch(format!(
                    "member {} has label '{}' at position {}, expected '{}'",
                    source, score.label, index, expected
                )));
            }
        }

        let values: Vec<f64> = output.probabilities.iter().map(|s| s.probability).collect();
        Self::from_values(values).map_err(|e| match e {
            EngineError::InvalidProbability(msg) => {
                EngineError::InvalidProbability(format!("member {}: {}", source, msg))
            }
            other => other,
        })
    }

    /// Validate raw values already known to be in canonical order.
    pub(crate) fn from_values(values: Vec<f64>) -> Result<Self> {
        if let Some((index, p)) = values
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p < 0.0)
        {
            return Err(EngineError::InvalidProbability(format!(
                "entry {} is {}, must be a finite non-negative number",
                index, p
            )));
        }

        let sum: f64 = values.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(EngineError::InvalidProbability(format!(
                "probabilities sum to {:.6}, expected 1.0",
                sum
            )));
        }

        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, index: usize) -> f64 {
        self.values[index]
    }

    /// Index and value of the highest probability. Ties go to the earlier
    /// canonical label.
    pub fn argmax(&self) -> (usize, f64) {
        argmax(&self.values)
    }

    /// Render back into labelled scores for output.
    pub fn to_scores(&self, labels: &LabelSet) -> Vec<LabelScore> {
        labels
            .iter()
            .zip(self.values.iter())
            .map(|(label, &p)| LabelScore::new(label, p))
            .collect()
    }
}
