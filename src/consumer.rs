//! NDJSON request source: one triage request per line

use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::info;

/// Reads request lines from a file or stdin
pub struct RequestReader {
    lines: Lines<Box<dyn AsyncBufRead + Send + Unpin>>,
    source: String,
}

impl RequestReader {
    /// Open a request source; "-" means stdin
    pub async fn open(source: &str) -> Result<Self> {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = if source == "-" {
            Box::new(BufReader::new(tokio::io::stdin()))
        } else {
            let file = File::open(source)
                .await
                .with_context(|| format!("Failed to open request source {}", source))?;
            Box::new(BufReader::new(file))
        };

        info!(source = %source, "Reading triage requests");
        Ok(Self::from_reader(reader, source))
    }

    /// Wrap an already-open reader
    pub fn from_reader(reader: Box<dyn AsyncBufRead + Send + Unpin>, source: &str) -> Self {
        Self {
            lines: reader.lines(),
            source: source.to_string(),
        }
    }

    /// Next non-blank line, or `None` at end of input
    pub async fn next_request(&mut self) -> Result<Option<String>> {
        while let Some(line) = self
            .lines
            .next_line()
            .await
            .context("Failed to read request line")?
        {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Get the source name
    pub fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_skips_blank_lines() {
        let input: &'static [u8] = b"{\"mode\":\"health\"}\n\n   \n{\"members\":[]}\n";
        let mut reader = RequestReader::from_reader(Box::new(BufReader::new(input)), "memory");

        assert_eq!(
            reader.next_request().await.unwrap().as_deref(),
            Some("{\"mode\":\"health\"}")
        );
        assert_eq!(
            reader.next_request().await.unwrap().as_deref(),
            Some("{\"members\":[]}")
        );
        assert!(reader.next_request().await.unwrap().is_none());
        assert_eq!(reader.source(), "memory");
    }

    #[tokio::test]
    async fn test_missing_file() {
        assert!(RequestReader::open("/nonexistent/requests.ndjson").await.is_err());
    }
}
