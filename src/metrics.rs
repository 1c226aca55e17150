use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of generate requests").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "gateway_request_latency_seconds",
        "Non-streaming request latency in seconds"
    )
    .unwrap();
    pub static ref ABORTED_REQUESTS: Counter = register_counter!(
        "gateway_aborted_requests_total",
        "Generations aborted after the client disconnected"
    )
    .unwrap();
    pub static ref STREAM_CHUNKS: Counter = register_counter!(
        "gateway_stream_chunks_total",
        "Chunks emitted on streaming responses"
    )
    .unwrap();
}
