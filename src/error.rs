// src/error.rs

use std::fmt;
use std::io;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

/// Custom error type for otwatch operations
/// Note: Some variants may be unused currently but kept for completeness
#[derive(Debug)]
#[allow(dead_code)]
pub enum OtwatchError {
    /// IO-related errors
    IoError(io::Error),
    /// Configuration errors
    ConfigError(String),
    /// Rejected ingestion payloads (bad engine tag, missing timestamp, ...)
    IngestError(String),
    /// Threat/analysis store errors
    StoreError(String),
    /// Subscriber hub errors
    BroadcastError(String),
    /// API-related errors
    ApiError(String),
}

impl fmt::Display for OtwatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtwatchError::IoError(e) => write!(f, "IO error: {}", e),
            OtwatchError::ConfigError(e) => write!(f, "Config error: {}", e),
            OtwatchError::IngestError(e) => write!(f, "Ingest error: {}", e),
            OtwatchError::StoreError(e) => write!(f, "Store error: {}", e),
            OtwatchError::BroadcastError(e) => write!(f, "Broadcast error: {}", e),
            OtwatchError::ApiError(e) => write!(f, "API error: {}", e),
        }
    }
}

impl std::error::Error for OtwatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OtwatchError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl IntoResponse for OtwatchError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            OtwatchError::IoError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("IO error: {}", e),
            ),
            OtwatchError::ConfigError(e) => {
                (StatusCode::BAD_REQUEST, format!("Config error: {}", e))
            }
            OtwatchError::IngestError(e) => {
                (StatusCode::BAD_REQUEST, format!("Ingest error: {}", e))
            }
            OtwatchError::StoreError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Store error: {}", e),
            ),
            OtwatchError::BroadcastError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Broadcast error: {}", e),
            ),
            OtwatchError::ApiError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("API error: {}", e),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<io::Error> for OtwatchError {
    fn from(err: io::Error) -> Self {
        OtwatchError::IoError(err)
    }
}

impl From<serde_json::Error> for OtwatchError {
    fn from(err: serde_json::Error) -> Self {
        OtwatchError::ConfigError(format!("JSON parsing error: {}", err))
    }
}

impl From<String> for OtwatchError {
    fn from(err: String) -> Self {
        OtwatchError::StoreError(err)
    }
}

/// Result type for otwatch operations
pub type Result<T> = std::result::Result<T, OtwatchError>;
