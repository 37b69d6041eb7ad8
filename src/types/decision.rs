//! Triage decision records

use crate::ensemble::aggregator::FusedResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification marker when the ensemble is too unsure to name a label
pub const UNCERTAIN_MARKER: &str = "uncertain";

/// Classification marker when healthy leads but is not confident enough
pub const SUSPECT_MARKER: &str = "suspect";

/// Risk tier, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the ensemble says the bird has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Classification {
    /// Confidently healthy; carries the healthy label name
    Healthy(String),
    /// A disease label cleared the confidence floor
    Disease(String),
    /// Top label below the uncertainty threshold
    Uncertain,
    /// Healthy leads but below the healthy threshold
    Suspect,
}

impl Classification {
    pub fn as_str(&self) -> &str {
        match self {
            Classification::Healthy(label) | Classification::Disease(label) => label,
            Classification::Uncertain => UNCERTAIN_MARKER,
            Classification::Suspect => SUSPECT_MARKER,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Classification::Healthy(_))
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Classification> for String {
    fn from(classification: Classification) -> Self {
        classification.as_str().to_string()
    }
}

/// Which rule of the safety policy produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    LowConfidence,
    Healthy,
    HealthyBelowThreshold,
    Disease,
}

/// Full decision record for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub classification: Classification,
    pub risk_level: RiskLevel,
    pub should_isolate: bool,
    /// Recommendation from the action catalog
    pub action: String,
    /// Fused top-label probability (healthy probability when healthy)
    pub confidence: f64,
    pub rule: DecisionRule,
    /// Human-readable explanation of the rule outcome
    pub reason: String,
    /// Fused vector, agreement summary and per-member vectors
    pub fused: FusedResult,
}

impl Decision {
    /// Reduced response shape.
    pub fn summary(&self) -> DecisionSummary {
        DecisionSummary {
            classification: self.classification.clone(),
            risk_level: self.risk_level,
            should_isolate: self.should_isolate,
            action: self.action.clone(),
            confidence: self.confidence,
        }
    }

    /// Lightweight safety verdict. Derived from this decision, so it can
    /// never disagree with `should_isolate`.
    pub fn safety(&self) -> SafetyEvaluation {
        let is_safe = !self.should_isolate;
        SafetyEvaluation {
            is_safe,
            status: if is_safe {
                SafetyStatus::Safe
            } else {
                SafetyStatus::Isolate
            },
            reason: self.reason.clone(),
        }
    }
}

/// Reduced decision shape: what most callers need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionSummary {
    pub classification: Classification,
    pub risk_level: RiskLevel,
    pub should_isolate: bool,
    pub action: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SafetyStatus {
    Safe,
    Isolate,
}

/// Safety verdict with the reason behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyEvaluation {
    pub is_safe: bool,
    pub status: SafetyStatus,
    pub reason: String,
}
