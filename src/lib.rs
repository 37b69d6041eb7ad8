//! Flock Triage Library
//!
//! Safety-first ensemble decision engine for poultry fecal-image triage.
//! Fuses per-model probability vectors and turns the result into a
//! conservative isolate / no-isolate decision.

pub mod config;
pub mod consumer;
pub mod ensemble;
pub mod error;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod producer;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestReader;
pub use ensemble::engine::TriageEngine;
pub use error::EngineError;
pub use handler::RequestHandler;
pub use producer::ResponseWriter;
pub use types::{decision::Decision, probability::MemberOutput, request::TriageRequest};
