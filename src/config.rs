//! Configuration management for the triage service

use crate::ensemble::policy::LabelPolicy;
use crate::types::decision::RiskLevel;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "FLOCK_TRIAGE_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub labels: LabelsConfig,
    pub thresholds: ThresholdSettings,
    pub ensemble: EnsembleConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Canonical label set and per-label policy
#[derive(Debug, Clone, Deserialize)]
pub struct LabelsConfig {
    /// Label names in canonical order (tie-break order)
    pub canonical: Vec<String>,
    /// Name of the healthy label
    pub healthy: String,
    /// Severity and recommended action per disease label
    #[serde(default)]
    pub catalog: Vec<LabelPolicy>,
}

/// Calibration thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdSettings {
    /// Minimum healthy probability for a no-isolation call
    pub healthy: f64,
    /// Minimum top-label probability below which the result is untrusted
    pub uncertainty: f64,
}

/// Ensemble composition
#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleConfig {
    /// Member names in the order their outputs arrive
    pub members: Vec<String>,
    /// Fusion weights; equal weighting when absent
    #[serde(default)]
    pub weights: Option<HashMap<String, f64>>,
    /// Device the inference layer runs on (reported only)
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_device() -> String {
    "auto".to_string()
}

/// Request pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum requests processed concurrently
    pub workers: usize,
    /// Request source: a file path, or "-" for stdin
    #[serde(default = "default_stream")]
    pub input: String,
    /// Response sink: a file path, or "-" for stdout
    #[serde(default = "default_stream")]
    pub output: String,
    /// Seconds between metrics summaries; 0 disables them
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

fn default_stream() -> String {
    "-".to_string()
}

fn default_report_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `FLOCK_TRIAGE_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, with `FLOCK_TRIAGE__*`
    /// environment overrides layered on top
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("FLOCK_TRIAGE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

fn default_catalog() -> Vec<LabelPolicy> {
    vec![
        LabelPolicy {
            label: "coccidiosis".to_string(),
            severity: RiskLevel::Medium,
            action: "Isolate, start anticoccidial treatment and check litter moisture"
                .to_string(),
        },
        LabelPolicy {
            label: "newcastle_disease".to_string(),
            severity: RiskLevel::High,
            action: "Isolate immediately and report to a veterinarian".to_string(),
        },
        LabelPolicy {
            label: "salmonella".to_string(),
            severity: RiskLevel::High,
            action: "Isolate, consult a veterinarian and wear protection when handling"
                .to_string(),
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            labels: LabelsConfig {
                canonical: vec![
                    "coccidiosis".to_string(),
                    "healthy".to_string(),
                    "newcastle_disease".to_string(),
                    "salmonella".to_string(),
                ],
                healthy: "healthy".to_string(),
                catalog: default_catalog(),
            },
            thresholds: ThresholdSettings {
                healthy: 0.80,
                uncertainty: 0.50,
            },
            ensemble: EnsembleConfig {
                members: vec![
                    "efficientnet_b0".to_string(),
                    "resnet50".to_string(),
                    "mobilenet_v3".to_string(),
                ],
                weights: None,
                device: default_device(),
            },
            pipeline: PipelineConfig {
                workers: 4,
                input: default_stream(),
                output: default_stream(),
                report_interval_secs: default_report_interval(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.labels.canonical.len(), 4);
        assert_eq!(config.labels.healthy, "healthy");
        assert_eq!(config.thresholds.healthy, 0.80);
        assert_eq!(config.thresholds.uncertainty, 0.50);
        assert_eq!(config.ensemble.members.len(), 3);
        assert!(config.ensemble.weights.is_none());
        assert_eq!(config.pipeline.workers, 4);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[labels]
canonical = ["healthy", "coccidiosis"]
healthy = "healthy"

[[labels.catalog]]
label = "coccidiosis"
severity = "medium"
action = "Isolate and treat"

[thresholds]
healthy = 0.9
uncertainty = 0.6

[ensemble]
members = ["a", "b"]
weights = {{ a = 0.7, b = 0.3 }}

[pipeline]
workers = 2

[logging]
level = "debug"
format = "pretty"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.labels.canonical, vec!["healthy", "coccidiosis"]);
        assert_eq!(config.labels.catalog[0].severity, RiskLevel::Medium);
        assert_eq!(config.thresholds.uncertainty, 0.6);
        let weights = config.ensemble.weights.unwrap();
        assert_eq!(weights.get("a"), Some(&0.7));
        assert_eq!(config.ensemble.device, "auto");
        assert_eq!(config.pipeline.input, "-");
        assert_eq!(config.pipeline.report_interval_secs, 30);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load_from_path("/nonexistent/flock-triage.toml").is_err());
    }
}
