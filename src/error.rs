// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Spotify rejected the token (HTTP 401, or `invalid_grant` on refresh).
    #[error("Spotify rejected credentials: {0}")]
    SpotifyUnauthorized(String),

    #[error("Spotify API error: HTTP {status}: {body}")]
    SpotifyApi { status: u16, body: String },

    /// The request never produced a usable response (network, decoding).
    #[error("Spotify request failed: {0}")]
    SpotifyRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the caller should refresh the access token and try again.
    pub fn is_spotify_unauthorized(&self) -> bool {
        matches!(self, AppError::SpotifyUnauthorized(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::MissingParameter(name) => (
                StatusCode::BAD_REQUEST,
                "missing_parameter",
                Some(format!("Missing required parameter: {}", name)),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::SpotifyUnauthorized(msg) => {
                tracing::warn!(error = %msg, "Spotify authorization failed");
                (StatusCode::UNAUTHORIZED, "spotify_unauthorized", None)
            }
            AppError::SpotifyApi { status, body } => (
                StatusCode::BAD_GATEWAY,
                "spotify_error",
                Some(format!("HTTP {}: {}", status, body)),
            ),
            AppError::SpotifyRequest(msg) => {
                (StatusCode::BAD_GATEWAY, "spotify_error", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
