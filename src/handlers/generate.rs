use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::engine::AbortGuard;
use crate::errors::{ApiError, EngineError};
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL, STREAM_CHUNKS};
use crate::models::{GenerateRequest, QueuedGeneration, StreamChunk};
use crate::state::AppState;
use crate::{prompt, sentence};

// POST /generate. The body carries `prompt`, an optional `stream` flag, and
// any further fields as sampling parameters. The prompt is split into
// sentences, each sentence templated into a translation prompt, and the
// batch handed to the engine under a fresh request id.
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    REQUEST_TOTAL.inc();

    let request = GenerateRequest::from_value(body)?;
    let request_id = Uuid::new_v4().to_string();

    let sentences = sentence::split_sentences(&request.prompt);
    let prompts = prompt::build_prompts(&sentences);
    debug!(%request_id, ?prompts, "assembled translation prompts");

    if request.stream {
        stream_response(&state, prompts, &request, request_id).await
    } else {
        batch_response(&state, prompts, request, request_id).await
    }
}

// Streaming branch: every engine output becomes one NUL-terminated JSON
// chunk, forwarded as soon as it arrives. The guard rides inside the body
// stream so a client disconnect cancels the engine request.
async fn stream_response(
    state: &AppState,
    prompts: Vec<String>,
    request: &GenerateRequest,
    request_id: String,
) -> Result<Response, ApiError> {
    let outputs = state
        .engine
        .generate(&prompts, &request.sampling, &request_id)
        .await
        .map_err(|err| ApiError::Generate(err.into()))?;

    let mut guard = AbortGuard::new(state.engine.clone(), request_id);
    let chunks = outputs.map(move |item| -> Result<Bytes, EngineError> {
        let output = item?;
        if output.finished {
            guard.disarm();
        }
        STREAM_CHUNKS.inc();
        let mut bytes = serde_json::to_vec(&StreamChunk {
            text: output.texts(),
        })?;
        bytes.push(0);
        Ok(Bytes::from(bytes))
    });

    Ok(Body::from_stream(chunks).into_response())
}

// Non-streaming branch: round-trip through the generation queue and reply
// with the space-joined final texts.
async fn batch_response(
    state: &AppState,
    prompts: Vec<String>,
    request: GenerateRequest,
    request_id: String,
) -> Result<Response, ApiError> {
    let start_time = Instant::now();
    let (response_tx, response_rx) = oneshot::channel();

    state
        .queue_tx
        .send(QueuedGeneration {
            request_id,
            prompts,
            sampling: request.sampling,
            response_tx,
        })
        .await
        .map_err(|_| ApiError::QueueUnavailable)?;

    // the worker drops the channel without replying only when it saw the
    // client disconnect and aborted the generation
    let result = response_rx
        .await
        .map_err(|_| ApiError::ClientDisconnected)?;
    let response = result?;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok(Json(response).into_response())
}
