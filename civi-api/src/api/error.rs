//! API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Query API errors
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// A required query parameter is missing
    Unprocessable(String),
    Database(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "missing_parameter"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
        }
    }
}

impl From<civi_common::Error> for ApiError {
    fn from(err: civi_common::Error) -> Self {
        match err {
            civi_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            civi_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Database(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Unprocessable(msg) => msg,
            ApiError::Database(msg) => {
                error!("Query failed: {}", msg);
                format!("Database error: {}", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_errors_map_to_status() {
        let not_found: ApiError = civi_common::Error::NotFound("run".to_string()).into();
        assert_eq!(not_found.status_and_code().0, StatusCode::NOT_FOUND);

        let invalid: ApiError = civi_common::Error::InvalidInput("Unknown pillar: x".to_string()).into();
        assert_eq!(invalid.status_and_code().0, StatusCode::BAD_REQUEST);

        let internal: ApiError = civi_common::Error::Internal("boom".to_string()).into();
        assert_eq!(internal.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
