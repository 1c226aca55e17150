use std::time::Duration;

use async_stream::try_stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::EngineArgs;
use crate::errors::EngineError;
use crate::metrics::ABORTED_REQUESTS;
use crate::models::SamplingParams;

const ABORT_TIMEOUT: Duration = Duration::from_secs(5);

// One decoded line of the engine's newline-delimited output stream.
// `outputs` is positional (one entry per submitted prompt) and `text` is
// cumulative; the line carrying `finished: true` is the last one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOutput {
    pub outputs: Vec<CompletionOutput>,
    #[serde(default)]
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutput {
    pub text: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl RequestOutput {
    pub fn texts(&self) -> Vec<String> {
        self.outputs.iter().map(|o| o.text.clone()).collect()
    }

    pub fn joined_text(&self) -> String {
        self.outputs
            .iter()
            .map(|o| o.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Serialize)]
struct EngineGenerateRequest<'a> {
    request_id: &'a str,
    prompts: &'a [String],
    sampling: &'a SamplingParams,
}

#[derive(Serialize)]
struct AbortRequest<'a> {
    request_id: &'a str,
}

// Client for the external inference engine. Cheap to clone.
#[derive(Clone)]
pub struct EngineClient {
    http: reqwest::Client,
    base_url: String,
}

impl EngineClient {
    pub fn new(args: &EngineArgs) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(args.engine_connect_timeout))
            .build()?;
        Ok(Self {
            http,
            base_url: args.engine_url.trim_end_matches('/').to_string(),
        })
    }

    // Submit the templated prompts and decode the engine's NDJSON reply
    // incrementally, yielding each output as soon as its line arrives.
    pub async fn generate(
        &self,
        prompts: &[String],
        sampling: &SamplingParams,
        request_id: &str,
    ) -> Result<BoxStream<'static, Result<RequestOutput, EngineError>>, EngineError> {
        let response = self
            .http
            .post(format!("{}/generate", self.base_url))
            .json(&EngineGenerateRequest {
                request_id,
                prompts,
                sampling,
            })
            .send()
            .await?
            .error_for_status()?;

        let mut body = response.bytes_stream();
        let stream = try_stream! {
            let mut buf: Vec<u8> = Vec::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                buf.extend_from_slice(&chunk);
                for line in drain_lines(&mut buf) {
                    let output: RequestOutput = serde_json::from_slice(&line)?;
                    yield output;
                }
            }
            // engines are not required to newline-terminate the last line
            if !buf.iter().all(u8::is_ascii_whitespace) {
                let output: RequestOutput = serde_json::from_slice(&buf)?;
                yield output;
            }
        };
        Ok(stream.boxed())
    }

    // Cancel an in-flight generation. Keyed by request id on the engine side.
    pub async fn abort(&self, request_id: &str) -> Result<(), EngineError> {
        ABORTED_REQUESTS.inc();
        self.http
            .post(format!("{}/abort", self.base_url))
            .json(&AbortRequest { request_id })
            .timeout(ABORT_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// Aborts the engine request when dropped while still armed. The streaming
// branch parks one of these in the body stream: if the client goes away the
// body is dropped mid-stream and the engine side gets cancelled too.
pub struct AbortGuard {
    engine: EngineClient,
    request_id: String,
    armed: bool,
}

impl AbortGuard {
    pub fn new(engine: EngineClient, request_id: String) -> Self {
        Self {
            engine,
            request_id,
            armed: true,
        }
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let engine = self.engine.clone();
        let request_id = std::mem::take(&mut self.request_id);
        tokio::spawn(async move {
            if let Err(err) = engine.abort(&request_id).await {
                warn!(%request_id, error = %err, "abort after disconnect failed");
            }
        });
    }
}

fn drain_lines(buf: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
        let mut line: Vec<u8> = buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}
