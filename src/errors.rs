use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// nginx's "client closed request"; logged, never actually delivered.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("engine sent malformed output: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("engine returned no output")]
    EmptyStream,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body must be a JSON object")]
    InvalidBody,
    #[error("request must include a string `prompt` field")]
    MissingPrompt,
    #[error("`stream` must be a boolean")]
    InvalidStreamFlag,
    #[error("invalid sampling parameters: {0}")]
    InvalidSamplingParams(#[source] serde_json::Error),
    #[error("client disconnected before generation finished")]
    ClientDisconnected,
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("generation queue unavailable")]
    QueueUnavailable,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody
            | ApiError::MissingPrompt
            | ApiError::InvalidStreamFlag
            | ApiError::InvalidSamplingParams(_) => StatusCode::BAD_REQUEST,
            ApiError::ClientDisconnected => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Generate(GenerateError::Engine(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Generate(GenerateError::EmptyStream) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::QueueUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::InvalidBody.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::ClientDisconnected.status().as_u16(), 499);
        assert_eq!(
            ApiError::Generate(GenerateError::EmptyStream).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::QueueUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
