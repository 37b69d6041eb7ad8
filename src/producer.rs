//! NDJSON response sink

use crate::types::request::TriageResponse;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::debug;

type Sink = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes one JSON response per line; clones share the same sink
#[derive(Clone)]
pub struct ResponseWriter {
    sink: Arc<Mutex<BufWriter<Sink>>>,
    target: String,
}

impl ResponseWriter {
    /// Open a response sink; "-" means stdout
    pub async fn open(target: &str) -> Result<Self> {
        let sink: Sink = if target == "-" {
            Box::new(tokio::io::stdout())
        } else {
            let file = File::create(target)
                .await
                .with_context(|| format!("Failed to create response sink {}", target))?;
            Box::new(file)
        };
        Ok(Self::from_writer(sink, target))
    }

    /// Wrap an already-open writer
    pub fn from_writer(sink: Sink, target: &str) -> Self {
        Self {
            sink: Arc::new(Mutex::new(BufWriter::new(sink))),
            target: target.to_string(),
        }
    }

    /// Write a response line
    pub async fn publish(&self, response: &TriageResponse) -> Result<()> {
        let mut payload = serde_json::to_vec(response)?;
        payload.push(b'\n');

        let mut sink = self.sink.lock().await;
        sink.write_all(&payload).await?;
        sink.flush().await?;

        debug!(
            request_id = %response.request_id,
            "Published triage response"
        );

        Ok(())
    }

    /// Flush and shut down the sink
    pub async fn close(&self) -> Result<()> {
        let mut sink = self.sink.lock().await;
        sink.shutdown().await.context("Failed to close response sink")
    }

    /// Get the target name
    pub fn target(&self) -> &str {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::request::ResponseBody;

    #[tokio::test]
    async fn test_writes_one_line_per_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.ndjson");
        let target = path.to_str().unwrap();

        let writer = ResponseWriter::open(target).await.unwrap();
        let responses: Vec<TriageResponse> = (0..3)
            .map(|i| {
                TriageResponse::new(
                    Some(format!("img-{}", i)),
                    ResponseBody::Invalid {
                        message: "test".to_string(),
                    },
                )
            })
            .collect();
        for response in &responses {
            writer.publish(response).await.unwrap();
        }
        writer.close().await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["request_id"], "img-0");
        assert_eq!(first["kind"], "invalid");
        assert_eq!(writer.target(), target);
    }
}
