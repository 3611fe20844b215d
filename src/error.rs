use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::models::Status;

/// Per-field validation failures, keyed by the wire name of the field.
pub type FieldErrors = BTreeMap<String, String>;

/// ErrorResponse
///
/// Envelope written for every failed request. `fields` is only present for
/// validation failures.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub status: Status,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

/// ApiError
///
/// The HTTP-facing error taxonomy. Internal causes (store or token failures)
/// are logged where they happen; only the message below reaches the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to decode request")]
    Decode,

    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    #[error("{0}")]
    InvalidId(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("forbidden")]
    Forbidden,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    Storage(&'static str),

    /// A multi-step write stopped half way. Earlier writes are left in place.
    #[error("{0}")]
    ConsistencyGap(&'static str),

    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn validation(fields: FieldErrors) -> Self {
        let message = fields
            .iter()
            .map(|(field, reason)| format!("field {field} {reason}"))
            .collect::<Vec<_>>()
            .join(", ");
        Self::Validation { message, fields }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode | Self::Validation { .. } | Self::InvalidId(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(_) | Self::ConsistencyGap(_) | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(op = "decode", error = %rejection.body_text(), "failed to decode request body");
        Self::Decode
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.to_string();
        let fields = match self {
            Self::Validation { fields, .. } => Some(fields),
            _ => None,
        };

        (
            status,
            Json(ErrorResponse {
                status: Status::Error,
                error,
                fields,
            }),
        )
            .into_response()
    }
}
