//! Type definitions for the triage engine

pub mod decision;
pub mod label;
pub mod probability;
pub mod request;

pub use decision::{Classification, Decision, RiskLevel, SafetyEvaluation};
pub use label::LabelSet;
pub use probability::{LabelScore, MemberOutput, ProbabilityVector};
pub use request::{RequestMode, TriageRequest, TriageResponse};
