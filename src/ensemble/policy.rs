//! Safety-first decision policy
//!
//! Turns a fused ensemble result into a decision. Rules are checked in a
//! fixed order and the first match wins:
//!
//! 1. top-label confidence below the uncertainty threshold: isolate, high risk
//! 2. healthy argmax at or above the healthy threshold: no isolation
//! 3. anything else: isolate, risk taken from the label's severity
//!
//! Both thresholds are inclusive: a confidence equal to a threshold meets it.
//! Fusion rounding is absorbed by [`THRESHOLD_TOLERANCE`], so an ensemble whose
//! members all report exactly the threshold still meets it.

use crate::ensemble::aggregator::FusedResult;
use crate::error::{EngineError, Result};
use crate::types::decision::{Classification, Decision, DecisionRule, RiskLevel, SafetyEvaluation};
use crate::types::label::LabelSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const ACTION_NO_ACTION: &str = "No action required";
pub const ACTION_ISOLATE_RETEST: &str = "Isolate and re-test";
pub const ACTION_ISOLATE_MONITOR: &str = "Isolate and re-test within 24 hours";
pub const ACTION_CONSULT_VET: &str = "Isolate and consult a veterinarian";

/// Slack allowed below a threshold before a confidence stops meeting it.
pub const THRESHOLD_TOLERANCE: f64 = 1e-9;

fn meets(confidence: f64, threshold: f64) -> bool {
    confidence + THRESHOLD_TOLERANCE >= threshold
}

/// Calibration thresholds, immutable once the engine is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdConfig {
    /// Minimum healthy probability to clear a bird
    pub healthy_threshold: f64,
    /// Minimum top-label probability to trust the ensemble at all
    pub uncertainty_threshold: f64,
}

impl ThresholdConfig {
    pub fn new(healthy_threshold: f64, uncertainty_threshold: f64) -> Result<Self> {
        for (name, value) in [
            ("healthy_threshold", healthy_threshold),
            ("uncertainty_threshold", uncertainty_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Config(format!(
                    "{} is {}, must be within [0, 1]",
                    name, value
                )));
            }
        }

        if uncertainty_threshold >= healthy_threshold {
            return Err(EngineError::Config(format!(
                "uncertainty_threshold ({}) must be below healthy_threshold ({})",
                uncertainty_threshold, healthy_threshold
            )));
        }

        Ok(Self {
            healthy_threshold,
            uncertainty_threshold,
        })
    }
}

/// Severity and recommendation for one disease label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPolicy {
    pub label: String,
    pub severity: RiskLevel,
    pub action: String,
}

/// Per-label severity and action table.
///
/// Labels without an entry are treated as high risk with the generic
/// veterinarian recommendation.
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    entries: HashMap<String, LabelPolicy>,
}

impl ActionCatalog {
    pub fn new(entries: Vec<LabelPolicy>, labels: &LabelSet) -> Result<Self> {
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            if labels.index_of(&entry.label).is_none() {
                return Err(EngineError::Config(format!(
                    "action catalog references unknown label '{}'",
                    entry.label
                )));
            }
            if entry.action.trim().is_empty() {
                return Err(EngineError::Config(format!(
                    "empty action for label '{}'",
                    entry.label
                )));
            }
            if map.insert(entry.label.clone(), entry).is_some() {
                return Err(EngineError::Config(
                    "action catalog lists a label twice".into(),
                ));
            }
        }
        Ok(Self { entries: map })
    }

    pub fn severity(&self, label: &str) -> RiskLevel {
        self.entries
            .get(label)
            .map(|e| e.severity)
            .unwrap_or(RiskLevel::High)
    }

    pub fn action(&self, label: &str) -> &str {
        self.entries
            .get(label)
            .map(|e| e.action.as_str())
            .unwrap_or(ACTION_CONSULT_VET)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deterministic decision procedure over fused results.
#[derive(Debug, Clone)]
pub struct SafetyPolicy {
    labels: LabelSet,
    thresholds: ThresholdConfig,
    catalog: ActionCatalog,
}

impl SafetyPolicy {
    pub fn new(labels: LabelSet, thresholds: ThresholdConfig, catalog: ActionCatalog) -> Self {
        Self {
            labels,
            thresholds,
            catalog,
        }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Produce the decision for one fused result.
    pub fn decide(&self, fused: FusedResult) -> Decision {
        let top = fused.top_probability;
        let top_label = fused.top_label.clone();
        let ThresholdConfig {
            healthy_threshold,
            uncertainty_threshold,
        } = self.thresholds;

        let trusted = meets(top, uncertainty_threshold);
        let (classification, risk_level, action, rule, reason) = if !trusted {
            (
                Classification::Uncertain,
                RiskLevel::High,
                ACTION_ISOLATE_RETEST.to_string(),
                DecisionRule::LowConfidence,
                format!(
                    "confidence {:.2} in {} below uncertainty threshold {:.2}",
                    top, top_label, uncertainty_threshold
                ),
            )
        } else if self.labels.is_healthy(fused.top_index) {
            if meets(top, healthy_threshold) {
                (
                    Classification::Healthy(top_label),
                    RiskLevel::Low,
                    ACTION_NO_ACTION.to_string(),
                    DecisionRule::Healthy,
                    format!(
                        "healthy with confidence {:.2} meets healthy threshold {:.2}",
                        top, healthy_threshold
                    ),
                )
            } else {
                (
                    Classification::Suspect,
                    RiskLevel::Medium,
                    ACTION_ISOLATE_MONITOR.to_string(),
                    DecisionRule::HealthyBelowThreshold,
                    format!(
                        "healthy confidence {:.2} below healthy threshold {:.2}",
                        top, healthy_threshold
                    ),
                )
            }
        } else {
            let risk_level = self.catalog.severity(&top_label);
            let action = self.catalog.action(&top_label).to_string();
            let reason = format!(
                "disease {} detected with confidence {:.2} above confidence floor {:.2}",
                top_label, top, uncertainty_threshold
            );
            (
                Classification::Disease(top_label),
                risk_level,
                action,
                DecisionRule::Disease,
                reason,
            )
        };

        let should_isolate = rule != DecisionRule::Healthy;

        debug!(
            rule = ?rule,
            classification = %classification,
            risk_level = %risk_level,
            confidence = top,
            dissenting_members = fused.agreement.dissenting_members,
            "Decision rule applied"
        );

        Decision {
            classification,
            risk_level,
            should_isolate,
            action,
            confidence: top,
            rule,
            reason,
            fused,
        }
    }

    /// Reduced safety verdict; a projection of [`SafetyPolicy::decide`].
    pub fn evaluate_safety(&self, fused: FusedResult) -> SafetyEvaluation {
        self.decide(fused).safety()
    }
}
