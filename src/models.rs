use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::errors::{ApiError, GenerateError};

// Sampling configuration forwarded verbatim to the engine. Unset fields are
// left off the wire so the engine applies its own defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SamplingParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_eos: Option<bool>,
}

// Incoming /generate payload. `prompt` and `stream` are popped out of the
// raw object; everything left over is sampling configuration.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub stream: bool,
    pub sampling: SamplingParams,
}

impl GenerateRequest {
    pub fn from_value(body: Value) -> Result<Self, ApiError> {
        let Value::Object(mut fields) = body else {
            return Err(ApiError::InvalidBody);
        };

        let prompt = match fields.remove("prompt") {
            Some(Value::String(s)) => s,
            _ => return Err(ApiError::MissingPrompt),
        };

        let stream = match fields.remove("stream") {
            Some(Value::Bool(b)) => b,
            None => false,
            Some(_) => return Err(ApiError::InvalidStreamFlag),
        };

        let sampling = serde_json::from_value(Value::Object(fields))
            .map_err(ApiError::InvalidSamplingParams)?;

        Ok(Self {
            prompt,
            stream,
            sampling,
        })
    }
}

// Non-streaming response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
}

// One streamed chunk: cumulative text per source sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub text: Vec<String>,
}

// Queued request - holds the templated prompts + response channel.
pub struct QueuedGeneration {
    pub request_id: String,
    pub prompts: Vec<String>,
    pub sampling: SamplingParams,
    pub response_tx: oneshot::Sender<Result<GenerateResponse, GenerateError>>,
}
