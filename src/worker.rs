use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{EngineClient, RequestOutput};
use crate::errors::GenerateError;
use crate::models::{GenerateResponse, QueuedGeneration};

// Dispatches queued non-streaming generations. The engine schedules its own
// work, so each request gets its own task instead of holding the queue.
pub async fn generation_worker(mut rx: mpsc::Receiver<QueuedGeneration>, engine: EngineClient) {
    info!("generation worker started");

    while let Some(queued) = rx.recv().await {
        let engine = engine.clone();
        tokio::spawn(async move {
            run_generation(engine, queued).await;
        });
    }

    info!("generation worker stopped");
}

// The non-streaming loop: consume the engine stream to completion, keeping
// the latest output. Once per iteration, check whether the requester is
// still there; if not, abort the engine side exactly once and stop reading.
async fn run_generation(engine: EngineClient, queued: QueuedGeneration) {
    let QueuedGeneration {
        request_id,
        prompts,
        sampling,
        response_tx,
    } = queued;

    let mut stream = match engine.generate(&prompts, &sampling, &request_id).await {
        Ok(stream) => stream,
        Err(err) => {
            let _ = response_tx.send(Err(GenerateError::Engine(err)));
            return;
        }
    };

    let mut final_output: Option<RequestOutput> = None;
    while let Some(item) = stream.next().await {
        if response_tx.is_closed() {
            // client went away; the 499 has no connection left to ride on
            debug!(%request_id, "client disconnected, aborting generation");
            if let Err(err) = engine.abort(&request_id).await {
                warn!(%request_id, error = %err, "abort call failed");
            }
            return;
        }
        match item {
            Ok(output) => final_output = Some(output),
            Err(err) => {
                let _ = response_tx.send(Err(GenerateError::Engine(err)));
                return;
            }
        }
    }

    let result = match final_output {
        Some(output) => Ok(GenerateResponse {
            text: output.joined_text(),
        }),
        None => Err(GenerateError::EmptyStream),
    };
    let _ = response_tx.send(result);
}
