//! Ensemble fusion and the safety decision policy

pub mod aggregator;
pub mod engine;
pub mod policy;

pub use aggregator::{AgreementSummary, EnsembleAggregator, FusedResult};
pub use engine::{HealthReport, TriageEngine};
pub use policy::{ActionCatalog, SafetyPolicy, ThresholdConfig};
