use axum::http::StatusCode;

// Health check. 200 with an empty body, unconditionally.
pub async fn health_handler() -> StatusCode {
    StatusCode::OK
}
