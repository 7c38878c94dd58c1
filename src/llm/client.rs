use anyhow::{anyhow, Result};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::Write;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::infra::TimingSink;
use crate::prompts;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Empty Ollama host provided")]
    EmptyHost,
}

/// Request body for POST /api/generate.
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// One newline-delimited chunk of a streamed /api/generate response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Streaming client for an Ollama inference endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    model: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            model: model.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Run one streaming analysis of `error_log` and return the fully
    /// assembled response text.
    ///
    /// Tokens are echoed to `console` as they arrive; connection and
    /// streaming durations go to `perf` when a sink is supplied. An empty
    /// host is the only hard error. Every runtime failure (connection,
    /// non-2xx status, mid-stream error) is logged, reported on `console`,
    /// and collapsed to `Ok("")` — partial output is discarded.
    pub async fn analyze<W: Write>(
        &self,
        error_log: &str,
        console: &mut W,
        perf: Option<&dyn TimingSink>,
    ) -> Result<String> {
        if self.host.trim().is_empty() {
            error!("Empty Ollama host provided.");
            return Err(ClientError::EmptyHost.into());
        }

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompts::analysis_prompt(error_log),
            stream: true,
        };
        let url = format!("{}/api/generate", self.host.trim_end_matches('/'));
        info!("Sending request to Ollama: {} (model={})", url, self.model);

        let connect_start = Instant::now();
        let resp = match self.http.post(&url).json(&request).send().await {
            Ok(resp) => {
                record(
                    perf,
                    format!(
                        "Time to connect to Ollama: {:.4} sec",
                        connect_start.elapsed().as_secs_f64()
                    ),
                );
                resp
            }
            Err(e) => {
                record(
                    perf,
                    format!(
                        "Time to connect to Ollama (FAILED): {:.4} sec",
                        connect_start.elapsed().as_secs_f64()
                    ),
                );
                error!("Connection to Ollama FAILED: {e}");
                let _ = writeln!(console, "\n❌ Connection error: {e}");
                return Ok(String::new());
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("Ollama returned status {status}: {body}");
            let _ = writeln!(console, "\n❌ Ollama API error: {status}");
            let _ = writeln!(console, "{body}");
            return Ok(String::new());
        }

        let stream_start = Instant::now();
        match consume_stream(resp.bytes_stream(), console).await {
            Ok(full_output) => {
                let stream_elapsed = stream_start.elapsed().as_secs_f64();
                let total_elapsed = connect_start.elapsed().as_secs_f64();
                record(
                    perf,
                    format!("Time to stream response: {stream_elapsed:.4} sec"),
                );
                record(perf, format!("Total analysis time: {total_elapsed:.4} sec"));

                let _ = writeln!(
                    console,
                    "\n\n⏱️ Total analysis time: {total_elapsed:.2} seconds"
                );
                let _ = writeln!(console, "✅ Streaming complete.\n");

                info!("========== AI ANALYSIS START ==========");
                for line in full_output.lines() {
                    info!("{line}");
                }
                info!("=========== AI ANALYSIS END ===========");

                Ok(full_output)
            }
            Err(e) => {
                record(
                    perf,
                    format!(
                        "Time to stream response (FAILED): {:.4} sec",
                        stream_start.elapsed().as_secs_f64()
                    ),
                );
                error!("Error during streaming: {e}");
                let _ = writeln!(console, "\n❌ Unexpected error: {e}");
                Ok(String::new())
            }
        }
    }
}

fn record(perf: Option<&dyn TimingSink>, message: String) {
    if let Some(sink) = perf {
        sink.record(&message);
    }
}

/// Consume a newline-delimited JSON stream of generation chunks.
///
/// Every non-empty `response` fragment is written to `console`, flushed
/// immediately, and appended to the aggregate. Blank lines are skipped and
/// malformed lines are dropped with a debug log; only a transport or
/// console-write failure aborts the stream.
async fn consume_stream<S, B, E, W>(stream: S, console: &mut W) -> Result<String>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    W: Write,
{
    futures_util::pin_mut!(stream);

    let mut full_output = String::new();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| anyhow!("stream read failed: {e}"))?;
        buffer.push_str(&String::from_utf8_lossy(bytes.as_ref()));

        while let Some(pos) = buffer.find('\n') {
            let line: String = buffer.drain(..=pos).collect();
            handle_line(line.trim(), console, &mut full_output)?;
        }
    }

    // A well-behaved server newline-terminates every chunk, but accept a
    // final unterminated line too.
    let tail = std::mem::take(&mut buffer);
    handle_line(tail.trim(), console, &mut full_output)?;

    Ok(full_output)
}

fn handle_line<W: Write>(line: &str, console: &mut W, full_output: &mut String) -> Result<()> {
    if line.is_empty() {
        return Ok(());
    }
    let chunk: GenerateChunk = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!("Failed to parse chunk: {e}: {line}");
            return Ok(());
        }
    };
    if let Some(token) = chunk.response.filter(|t| !t.is_empty()) {
        console.write_all(token.as_bytes())?;
        console.flush()?;
        full_output.push_str(&token);
    }
    if chunk.done {
        debug!("Stream reported done.");
    }
    Ok(())
}
