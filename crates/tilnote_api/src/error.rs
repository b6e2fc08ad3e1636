//! Domain error to HTTP response mapping.
//!
//! # Invariants
//! - This is the only place a `CoreError` kind becomes a status code.
//! - `Internal` details are logged, never returned to the client.

use axum::extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use serde_json::json;
use tilnote_core::{CoreError, FieldError};

#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden => StatusCode::FORBIDDEN,
            CoreError::NotFound { .. } | CoreError::Conflict { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(value: CoreError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.0.code();
        let body = match self.0 {
            CoreError::Validation(fields) => json!({ "code": code, "detail": fields }),
            CoreError::Unauthenticated => {
                let body = json!({ "code": code, "detail": "Could not validate credentials" });
                return (
                    status,
                    [(header::WWW_AUTHENTICATE, "Bearer")],
                    Json(body),
                )
                    .into_response();
            }
            CoreError::Forbidden => json!({ "code": code, "detail": "Not enough permissions" }),
            CoreError::NotFound { entity, .. } => {
                json!({ "code": code, "detail": format!("{entity} not found") })
            }
            CoreError::Conflict { entity, .. } => {
                json!({ "code": code, "detail": format!("{entity} already exists") })
            }
            CoreError::Internal(message) => {
                error!(
                    "event=http_error module=api status=error error_code=internal error={}",
                    message
                );
                json!({ "code": code, "detail": "Internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

fn rejected(field: &str, message: String) -> ApiError {
    ApiError(CoreError::Validation(vec![FieldError::new(field, message)]))
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        rejected("body", value.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(value: FormRejection) -> Self {
        rejected("body", value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        rejected("query", value.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        rejected("path", value.body_text())
    }
}
