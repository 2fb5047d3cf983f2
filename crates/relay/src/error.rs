// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for the relay HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayError {
    BadRequest,
    UpstreamError,
    Internal,
}

impl RelayError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::UpstreamError => 502,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// A failed call to an upstream service (identity provider or trip gateway).
///
/// `status` carries the HTTP status when the service answered; it is `None`
/// for transport failures (DNS, connect, reset, timeout).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// Transport-level failure with no response status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    /// Definitive client-class rejection (4xx). Everything else is retryable.
    pub fn is_rejection(&self) -> bool {
        matches!(self.status, Some(400..=499))
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e.status().map(|s| s.as_u16()), e.to_string())
    }
}

impl From<tonic::Status> for UpstreamError {
    fn from(status: tonic::Status) -> Self {
        let http = match status.code() {
            tonic::Code::InvalidArgument => Some(400),
            tonic::Code::Unauthenticated => Some(401),
            tonic::Code::PermissionDenied => Some(403),
            tonic::Code::NotFound => Some(404),
            tonic::Code::Unavailable => Some(503),
            _ => None,
        };
        Self::new(http, format!("{:?}: {}", status.code(), status.message()))
    }
}

/// Failure to obtain an account from the pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("no accounts available and auto-register not configured")]
    NoAccountsAvailable,
    #[error("registration failed: {0:#}")]
    Registration(anyhow::Error),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
