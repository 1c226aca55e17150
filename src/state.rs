use tokio::sync::mpsc;

use crate::engine::EngineClient;
use crate::models::QueuedGeneration;

// App's shared state.
pub struct AppState {
    pub engine: EngineClient,
    pub queue_tx: mpsc::Sender<QueuedGeneration>,
}
