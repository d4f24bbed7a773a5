use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;

/// HTTP level failure of the mutate endpoint. These are the only cases where
/// no AdmissionReview envelope is sent back.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = axum::Json(json!({
            "status": self.status.as_u16(),
            "message": self.message,
        }));

        (self.status, body).into_response()
    }
}
