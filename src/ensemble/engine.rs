//! Triage engine: aggregator and safety policy behind one immutable handle

use crate::config::AppConfig;
use crate::ensemble::aggregator::{EnsembleAggregator, FusedResult};
use crate::ensemble::policy::{ActionCatalog, SafetyPolicy, ThresholdConfig};
use crate::error::Result;
use crate::types::decision::{Decision, SafetyEvaluation};
use crate::types::label::LabelSet;
use crate::types::probability::MemberOutput;
use serde::Serialize;
use tracing::info;

/// Readiness report for the surrounding service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub model_loaded: bool,
    pub device: String,
    pub members: Vec<String>,
    pub labels: Vec<String>,
    pub thresholds: ThresholdConfig,
}

/// Ensemble decision engine.
///
/// Built once at startup and shared read-only (typically behind an `Arc`)
/// by every request. Holds no mutable state, so calls need no locking.
#[derive(Debug, Clone)]
pub struct TriageEngine {
    aggregator: EnsembleAggregator,
    policy: SafetyPolicy,
    device: String,
}

impl TriageEngine {
    /// Build the engine from configuration, validating the calibration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let labels = LabelSet::new(config.labels.canonical.clone(), &config.labels.healthy)?;
        let thresholds =
            ThresholdConfig::new(config.thresholds.healthy, config.thresholds.uncertainty)?;
        let catalog = ActionCatalog::new(config.labels.catalog.clone(), &labels)?;

        let members = config.ensemble.members.clone();
        let aggregator = match &config.ensemble.weights {
            Some(weights) => EnsembleAggregator::new(labels.clone(), members, weights)?,
            None => EnsembleAggregator::equal_weights(labels.clone(), members)?,
        };

        let engine = Self::from_parts(
            aggregator,
            SafetyPolicy::new(labels, thresholds, catalog),
            &config.ensemble.device,
        );

        info!(
            members = ?engine.member_names(),
            weights = ?engine.aggregator.weights(),
            labels = engine.labels().len(),
            healthy_threshold = thresholds.healthy_threshold,
            uncertainty_threshold = thresholds.uncertainty_threshold,
            device = %engine.device,
            "Triage engine initialized"
        );

        Ok(engine)
    }

    /// Assemble an engine from already-validated parts.
    pub fn from_parts(aggregator: EnsembleAggregator, policy: SafetyPolicy, device: &str) -> Self {
        Self {
            aggregator,
            policy,
            device: device.to_string(),
        }
    }

    /// Fuse member outputs without deciding.
    pub fn fuse(&self, outputs: &[MemberOutput]) -> Result<FusedResult> {
        self.aggregator.fuse(outputs)
    }

    /// Full decision for one image's member outputs.
    pub fn decide(&self, outputs: &[MemberOutput]) -> Result<Decision> {
        let fused = self.aggregator.fuse(outputs)?;
        Ok(self.policy.decide(fused))
    }

    /// Safety verdict for one image's member outputs.
    pub fn evaluate_safety(&self, outputs: &[MemberOutput]) -> Result<SafetyEvaluation> {
        let fused = self.aggregator.fuse(outputs)?;
        Ok(self.policy.evaluate_safety(fused))
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy".to_string(),
            model_loaded: true,
            device: self.device().to_string(),
            members: self.member_names().to_vec(),
            labels: self.labels().iter().map(str::to_string).collect(),
            thresholds: *self.policy.thresholds(),
        }
    }

    pub fn labels(&self) -> &LabelSet {
        self.aggregator.labels()
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        self.policy.thresholds()
    }

    pub fn member_count(&self) -> usize {
        self.aggregator.member_count()
    }

    pub fn member_names(&self) -> &[String] {
        self.aggregator.member_names()
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}
