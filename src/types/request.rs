//! Request and response envelopes exchanged with the triage service

use crate::ensemble::engine::HealthReport;
use crate::types::decision::{Decision, DecisionSummary, SafetyEvaluation};
use crate::types::probability::MemberOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response shape requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// Reduced decision shape
    #[default]
    Predict,
    /// Reduced shape plus fused result and member vectors
    Detailed,
    /// Safe / isolate verdict with reason
    Safety,
    /// Engine readiness; no member outputs needed
    Health,
}

/// One triage request: the ensemble's outputs for a single image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageRequest {
    /// Caller-supplied identifier, echoed in the response
    #[serde(default)]
    pub request_id: Option<String>,

    #[serde(default)]
    pub mode: RequestMode,

    /// One output per ensemble member, in member order
    #[serde(default)]
    pub members: Vec<MemberOutput>,
}

impl TriageRequest {
    pub fn new(mode: RequestMode, members: Vec<MemberOutput>) -> Self {
        Self {
            request_id: None,
            mode,
            members,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Detailed shape: the reduced fields plus the full decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedDecision {
    #[serde(flatten)]
    pub summary: DecisionSummary,
    pub details: Decision,
}

/// Payload of a response, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseBody {
    Prediction(DecisionSummary),
    Detailed(DetailedDecision),
    Safety(SafetyEvaluation),
    Health(HealthReport),
    /// Malformed input; no decision was made
    Rejected { error_kind: String, message: String },
    /// Request line could not be parsed at all
    Invalid { message: String },
}

impl ResponseBody {
    pub fn is_rejected(&self) -> bool {
        matches!(self, ResponseBody::Rejected { .. } | ResponseBody::Invalid { .. })
    }
}

/// Response envelope written for every request line
#[derive(Debug, Clone, Serialize)]
pub struct TriageResponse {
    pub request_id: String,
    pub processed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl TriageResponse {
    /// Wrap a body, generating a request id when the caller gave none
    pub fn new(request_id: Option<String>, body: ResponseBody) -> Self {
        Self {
            request_id: request_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            processed_at: Utc::now(),
            body,
        }
    }
}
