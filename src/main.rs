//! Flock Triage - Main Entry Point
//!
//! Reads ensemble member outputs as NDJSON, runs the safety-first decision
//! engine on each request, and writes one JSON response per line.
//! Requests are processed in parallel against a single shared engine.

use anyhow::{Context, Result};
use flock_triage::{
    config::AppConfig,
    consumer::RequestReader,
    ensemble::engine::TriageEngine,
    handler::RequestHandler,
    logging,
    metrics::{MetricsReporter, TriageMetrics},
    producer::ResponseWriter,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    logging::init(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        modes = "predict, detailed, safety, health",
        "Starting Flock Triage decision service"
    );

    // Build the engine once; an invalid calibration stops startup here
    let engine = Arc::new(
        TriageEngine::from_config(&config).context("Invalid triage engine configuration")?,
    );
    let health = engine.health();
    info!(
        status = %health.status,
        model_loaded = health.model_loaded,
        device = %health.device,
        members = ?health.members,
        "Engine ready"
    );

    let metrics = Arc::new(TriageMetrics::new());
    let handler = RequestHandler::new(engine, metrics.clone());

    if config.pipeline.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let mut reader = RequestReader::open(&config.pipeline.input).await?;
    let writer = ResponseWriter::open(&config.pipeline.output).await?;

    let num_workers = config.pipeline.workers.max(1);
    info!(
        workers = num_workers,
        input = %reader.source(),
        output = %writer.target(),
        "Starting request processing loop"
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    while let Some(line) = reader.next_request().await? {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let handler = handler.clone();
        let writer = writer.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let response = handler.handle_line(&line);

            if let Err(e) = writer.publish(&response).await {
                error!(
                    request_id = %response.request_id,
                    error = %e,
                    "Failed to write triage response"
                );
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let stats = handler.metrics().get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} req/s", handler.metrics().get_throughput()),
                    avg_latency_us = stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    // Wait for in-flight requests before shutting down
    let _all = semaphore
        .acquire_many(num_workers as u32)
        .await
        .context("Worker semaphore closed")?;

    writer.close().await?;

    info!(
        processed = processed_count.load(Ordering::Relaxed),
        "Input exhausted, shutting down"
    );
    metrics.print_summary();

    Ok(())
}
