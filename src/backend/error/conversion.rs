/**
 * Error Conversion
 *
 * All backend errors implement `IntoResponse` from Axum, allowing them to be
 * returned directly from handlers and middleware. Error responses are JSON:
 *
 * ```json
 * {
 *   "error": "Attach rejected for n1: registered for /topics/4",
 *   "status": 422
 * }
 * ```
 */

use crate::backend::error::types::BackendError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!("[Server] Request failed: {}", message);
        }

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        let mut response = (status, body.to_string()).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        response
    }
}
