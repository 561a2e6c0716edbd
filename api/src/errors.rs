// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::admission::AdmissionError;
use crate::lifecycle::AuthError;
use crate::provider::ProviderError;

/// Failures of the identity, submission and bucket stores.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("unique constraint violated on {0}")]
    UniqueViolation(&'static str),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out")]
    Timeout,
}

impl From<redis::RedisError> for StoreError {
    fn from(source: redis::RedisError) -> Self {
        if source.is_timeout() {
            StoreError::Timeout
        } else {
            StoreError::Unavailable(source.to_string())
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AppError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },
    #[error("service unavailable")]
    ServiceUnavailable { retry_after: Option<Duration> },
    #[error("upstream error: {0}")]
    Upstream(ProviderError),
    #[error("internal server error")]
    InternalServerError,
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;

        let (status, message) = match self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::RateLimited {
                retry_after: wait,
            } => {
                retry_after = Some(wait);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too many requests".to_string(),
                )
            }
            Self::ServiceUnavailable { retry_after: wait } => {
                retry_after = wait;
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
            Self::Upstream(error) => {
                retry_after = error.retry_after();
                (error.status_code(), error.public_message().to_string())
            }
            Self::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            ),
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({"code": status.as_u16(), "message": message}));

        let mut response = (status, body).into_response();
        if let Some(wait) = retry_after {
            // whole seconds, rounded up so clients never retry early
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<AuthError> for AppError {
    fn from(source: AuthError) -> Self {
        match source {
            AuthError::DuplicateIdentity(field) => {
                AppError::Conflict(format!("{field} already exists"))
            }
            // deliberately indistinguishable to the caller
            AuthError::UnknownIdentity | AuthError::BadCredential | AuthError::InvalidCredential => {
                tracing::debug!("[api] authentication failed: {}", source);
                AppError::Unauthenticated
            }
            AuthError::Store(StoreError::UniqueViolation(field)) => {
                AppError::Conflict(format!("{field} already exists"))
            }
            AuthError::Store(error) => {
                tracing::error!("[api] identity store failure: {:?}", error);
                AppError::ServiceUnavailable { retry_after: None }
            }
            AuthError::Vault(error) => {
                tracing::error!("[api] vault failure: {:?}", error);
                AppError::InternalServerError
            }
            AuthError::Internal(error) => {
                tracing::error!("[api] internal failure: {}", error);
                AppError::InternalServerError
            }
        }
    }
}

impl From<AdmissionError> for AppError {
    fn from(source: AdmissionError) -> Self {
        match source {
            AdmissionError::RateLimitExceeded { retry_after } => AppError::RateLimited { retry_after },
            AdmissionError::StoreUnavailable(error) => {
                tracing::error!("[api] admission store failure: {:?}", error);
                AppError::ServiceUnavailable { retry_after: None }
            }
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(source: ProviderError) -> Self {
        AppError::Upstream(source)
    }
}

impl From<StoreError> for AppError {
    fn from(source: StoreError) -> Self {
        tracing::error!("[api] store failure: {:?}", source);
        match source {
            StoreError::UniqueViolation(field) => AppError::Conflict(format!("{field} already exists")),
            StoreError::Unavailable(_) | StoreError::Timeout => {
                AppError::ServiceUnavailable { retry_after: None }
            }
        }
    }
}
