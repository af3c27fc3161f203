//! Error types and their HTTP representations.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tinypaste_common::ErrorBody;
use tracing::error;

use crate::render;

/// Failure talking to or reading from a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to kv service failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("kv service returned an error: {0}")]
    Service(String),
    #[error("kv service returned an unexpected reply: {0}")]
    UnexpectedReply(String),
    #[error("stored record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[cfg(feature = "rocksdb")]
    #[error("rocksdb error: {0}")]
    Rocks(#[from] rocksdb::Error),
    #[cfg(feature = "rocksdb")]
    #[error("failed to (de)serialize record: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Malformed create request. Names the offending field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

impl ValidationError {
    pub const fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

/// Errors from the JSON API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("paste not found or unavailable")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: e.message.to_string(),
                    field: Some(e.field.to_string()),
                },
            ),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: "Paste not found or unavailable".to_string(),
                    field: None,
                },
            ),
            Self::Store(e) => {
                error!("Storage backend failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "Internal Server Error".to_string(),
                        field: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Errors from the HTML pages.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("paste not found or unavailable")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => (StatusCode::NOT_FOUND, render::not_found_page()).into_response(),
            Self::Store(e) => {
                error!("Storage backend failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    render::error_page("Internal Server Error"),
                )
                    .into_response()
            }
        }
    }
}
