//! Request handling: turns request envelopes into engine calls

use crate::ensemble::engine::TriageEngine;
use crate::error::EngineError;
use crate::metrics::TriageMetrics;
use crate::types::request::{
    DetailedDecision, RequestMode, ResponseBody, TriageRequest, TriageResponse,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shared request handler; cheap to clone into worker tasks
#[derive(Clone)]
pub struct RequestHandler {
    engine: Arc<TriageEngine>,
    metrics: Arc<TriageMetrics>,
}

impl RequestHandler {
    pub fn new(engine: Arc<TriageEngine>, metrics: Arc<TriageMetrics>) -> Self {
        Self { engine, metrics }
    }

    /// Handle one raw request line. Unparseable lines get an `invalid` response.
    pub fn handle_line(&self, line: &str) -> TriageResponse {
        match serde_json::from_str::<TriageRequest>(line) {
            Ok(request) => self.handle(request),
            Err(e) => {
                warn!(error = %e, "Failed to deserialize triage request");
                self.metrics.record_rejection(std::time::Duration::ZERO);
                TriageResponse::new(
                    None,
                    ResponseBody::Invalid {
                        message: e.to_string(),
                    },
                )
            }
        }
    }

    /// Handle one parsed request
    pub fn handle(&self, request: TriageRequest) -> TriageResponse {
        let start_time = Instant::now();
        let TriageRequest {
            request_id,
            mode,
            members,
        } = request;

        if mode == RequestMode::Health {
            return TriageResponse::new(request_id, ResponseBody::Health(self.engine.health()));
        }

        let body = match self.engine.decide(&members) {
            Ok(decision) => {
                let processing_time = start_time.elapsed();
                self.metrics.record_decision(&decision, processing_time);

                if decision.should_isolate {
                    info!(
                        request_id = ?request_id,
                        classification = %decision.classification,
                        risk_level = %decision.risk_level,
                        confidence = decision.confidence,
                        processing_time_us = processing_time.as_micros(),
                        "Isolation recommended"
                    );
                } else {
                    debug!(
                        request_id = ?request_id,
                        confidence = decision.confidence,
                        processing_time_us = processing_time.as_micros(),
                        "Bird cleared"
                    );
                }

                match mode {
                    RequestMode::Safety => ResponseBody::Safety(decision.safety()),
                    RequestMode::Detailed => ResponseBody::Detailed(DetailedDecision {
                        summary: decision.summary(),
                        details: decision,
                    }),
                    _ => ResponseBody::Prediction(decision.summary()),
                }
            }
            Err(e) => {
                self.metrics.record_rejection(start_time.elapsed());
                warn!(
                    request_id = ?request_id,
                    error_kind = e.kind(),
                    error = %e,
                    "Triage request rejected"
                );
                rejected(&e)
            }
        };

        TriageResponse::new(request_id, body)
    }

    pub fn engine(&self) -> &TriageEngine {
        &self.engine
    }

    pub fn metrics(&self) -> &TriageMetrics {
        &self.metrics
    }
}

fn rejected(error: &EngineError) -> ResponseBody {
    ResponseBody::Rejected {
        error_kind: error.kind().to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::types::decision::SafetyStatus;
    use crate::types::probability::MemberOutput;
    use std::sync::atomic::Ordering;

    fn handler() -> RequestHandler {
        let engine = TriageEngine::from_config(&AppConfig::default()).unwrap();
        RequestHandler::new(Arc::new(engine), Arc::new(TriageMetrics::new()))
    }

    fn members(scores: [f64; 4]) -> Vec<MemberOutput> {
        let output = MemberOutput::anonymous(&[
            ("coccidiosis", scores[0]),
            ("healthy", scores[1]),
            ("newcastle_disease", scores[2]),
            ("salmonella", scores[3]),
        ]);
        vec![output.clone(), output.clone(), output]
    }

    #[test]
    fn test_predict_request() {
        let handler = handler();
        let request = TriageRequest::new(RequestMode::Predict, members([0.05, 0.90, 0.03, 0.02]))
            .with_request_id("img-1");

        let response = handler.handle(request);
        assert_eq!(response.request_id, "img-1");
        match response.body {
            ResponseBody::Prediction(summary) => {
                assert!(!summary.should_isolate);
                assert_eq!(summary.classification.as_str(), "healthy");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_detailed_request_includes_members() {
        let handler = handler();
        let request =
            TriageRequest::new(RequestMode::Detailed, members([0.70, 0.20, 0.05, 0.05]));

        let json = serde_json::to_value(handler.handle(request)).unwrap();
        assert_eq!(json["kind"], "detailed");
        assert_eq!(json["classification"], "coccidiosis");
        assert_eq!(json["should_isolate"], true);
        assert_eq!(json["details"]["fused"]["members"].as_array().unwrap().len(), 3);
        assert_eq!(json["details"]["rule"], "disease");
    }

    #[test]
    fn test_safety_request() {
        let handler = handler();
        let request = TriageRequest::new(RequestMode::Safety, members([0.30, 0.35, 0.20, 0.15]));

        match handler.handle(request).body {
            ResponseBody::Safety(safety) => {
                assert!(!safety.is_safe);
                assert_eq!(safety.status, SafetyStatus::Isolate);
                assert!(safety.reason.contains("below uncertainty threshold"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_health_request() {
        let handler = handler();
        let response = handler.handle(TriageRequest::new(RequestMode::Health, Vec::new()));
        match response.body {
            ResponseBody::Health(health) => assert!(health.model_loaded),
            other => panic!("unexpected body {:?}", other),
        }
        assert_eq!(handler.metrics().decisions_made.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_malformed_members_rejected() {
        let handler = handler();
        let request = TriageRequest::new(RequestMode::Predict, members([0.5, 0.5, 0.2, 0.1]));

        match handler.handle(request).body {
            ResponseBody::Rejected { error_kind, .. } => {
                assert_eq!(error_kind, "invalid_probability")
            }
            other => panic!("unexpected body {:?}", other),
        }
        assert_eq!(handler.metrics().rejections.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_wrong_member_count_rejected() {
        let handler = handler();
        let mut outputs = members([0.05, 0.90, 0.03, 0.02]);
        outputs.pop();

        match handler.handle(TriageRequest::new(RequestMode::Predict, outputs)).body {
            ResponseBody::Rejected { error_kind, .. } => assert_eq!(error_kind, "shape_mismatch"),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_line() {
        let handler = handler();
        let response = handler.handle_line("{not json");
        assert!(response.body.is_rejected());
        assert!(matches!(response.body, ResponseBody::Invalid { .. }));
    }
}
