//! Mapping of domain errors onto HTTP responses.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use tracing::error;

use crate::CommerceError;

impl CommerceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ProductNotFound(_) | Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::EmptyCart | Self::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::OrderFinalized | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CommerceError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Storage details stay in the logs.
        let message = match &self {
            Self::Conflict(_) => "Concurrent update, please retry".to_string(),
            Self::OrderFinalized | Self::Storage(_) => {
                error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
