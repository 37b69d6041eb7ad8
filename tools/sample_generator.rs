//! Sample Request Generator
//!
//! Emits synthetic ensemble outputs as NDJSON triage requests for exercising
//! the decision service without running the classifiers.

use flock_triage::config::AppConfig;
use flock_triage::types::label::LabelSet;
use flock_triage::types::probability::{LabelScore, MemberOutput};
use flock_triage::types::request::{RequestMode, TriageRequest};
use rand::Rng;
use std::io::Write;
use tracing::info;

/// Kind of image a generated request imitates
#[derive(Debug, Clone, Copy)]
enum Profile {
    /// Every member confidently healthy
    Healthy,
    /// Every member leans to the same disease
    Diseased,
    /// Members disagree and spread their mass
    Ambiguous,
}

/// Random member-output generator over the configured ensemble
struct SampleGenerator {
    rng: rand::rngs::ThreadRng,
    labels: LabelSet,
    diseases: Vec<usize>,
    members: Vec<String>,
    request_counter: u64,
}

impl SampleGenerator {
    fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let labels = LabelSet::new(config.labels.canonical.clone(), &config.labels.healthy)?;
        let diseases = (0..labels.len()).filter(|&i| !labels.is_healthy(i)).collect();

        Ok(Self {
            rng: rand::thread_rng(),
            labels,
            diseases,
            members: config.ensemble.members.clone(),
            request_counter: 0,
        })
    }

    fn generate(&mut self, profile: Profile, mode: RequestMode) -> TriageRequest {
        self.request_counter += 1;

        let disease = self.random_disease();
        let members = self
            .members
            .clone()
            .into_iter()
            .map(|member| {
                let favourite = match profile {
                    Profile::Healthy => {
                        Some((self.labels.healthy_index(), self.rng.gen_range(0.82..0.99)))
                    }
                    Profile::Diseased => Some((disease, self.rng.gen_range(0.60..0.95))),
                    Profile::Ambiguous => None,
                };
                MemberOutput {
                    member: Some(member),
                    probabilities: self.distribution(favourite),
                }
            })
            .collect();

        TriageRequest::new(mode, members).with_request_id(format!("img_{:08}", self.request_counter))
    }

    /// Random distribution, optionally pinning one label's mass
    fn distribution(&mut self, favourite: Option<(usize, f64)>) -> Vec<LabelScore> {
        let mut raw: Vec<f64> = (0..self.labels.len())
            .map(|_| self.rng.gen_range(0.05..1.0))
            .collect();

        match favourite {
            Some((index, mass)) => {
                raw[index] = 0.0;
                let rest: f64 = raw.iter().sum();
                for value in raw.iter_mut() {
                    *value = *value / rest * (1.0 - mass);
                }
                raw[index] = mass;
            }
            None => {
                let total: f64 = raw.iter().sum();
                for value in raw.iter_mut() {
                    *value /= total;
                }
            }
        }

        self.labels
            .iter()
            .zip(raw)
            .map(|(label, p)| LabelScore::new(label, p))
            .collect()
    }

    fn random_disease(&mut self) -> usize {
        self.diseases[self.rng.gen_range(0..self.diseases.len())]
    }
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid NDJSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_generator=info".parse()?),
        )
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let count: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100);
    let disease_rate: f64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(0.2);
    let ambiguous_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let config_path = args.get(4);

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::default(),
    };

    info!(
        count = count,
        disease_rate = disease_rate,
        ambiguous_rate = ambiguous_rate,
        members = ?config.ensemble.members,
        "Generating sample triage requests"
    );

    let mut generator = SampleGenerator::new(&config)?;
    let mut rng = rand::thread_rng();
    let modes = [RequestMode::Predict, RequestMode::Detailed, RequestMode::Safety];

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let (mut healthy, mut diseased, mut ambiguous) = (0u64, 0u64, 0u64);
    for _ in 0..count {
        let roll: f64 = rng.gen();
        let profile = if roll < ambiguous_rate {
            ambiguous += 1;
            Profile::Ambiguous
        } else if roll < ambiguous_rate + disease_rate {
            diseased += 1;
            Profile::Diseased
        } else {
            healthy += 1;
            Profile::Healthy
        };
        let mode = modes[rng.gen_range(0..modes.len())];

        let request = generator.generate(profile, mode);
        serde_json::to_writer(&mut out, &request)?;
        out.write_all(b"\n")?;
    }

    info!(
        healthy = healthy,
        diseased = diseased,
        ambiguous = ambiguous,
        "Completed"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_label_set_without_disease() {
        let mut config = AppConfig::default();
        config.labels.canonical = vec!["healthy".to_string()];
        config.labels.healthy = "healthy".to_string();

        assert!(SampleGenerator::new(&config).is_err());
    }

    #[test]
    fn test_rejects_unknown_healthy_label() {
        let mut config = AppConfig::default();
        config.labels.healthy = "normal".to_string();

        assert!(SampleGenerator::new(&config).is_err());
    }

    #[test]
    fn test_diseased_requests_favour_a_disease() {
        let config = AppConfig::default();
        let mut generator = SampleGenerator::new(&config).unwrap();

        for _ in 0..20 {
            let request = generator.generate(Profile::Diseased, RequestMode::Predict);
            assert_eq!(request.members.len(), config.ensemble.members.len());
            for member in &request.members {
                let (top, _) = member
                    .probabilities
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.probability.total_cmp(&b.1.probability))
                    .unwrap();
                assert!(!generator.labels.is_healthy(top));
                let total: f64 = member.probabilities.iter().map(|s| s.probability).sum();
                assert!((total - 1.0).abs() < 1e-9);
            }
        }
    }
}
