// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::submissions::Sex;

/// The patient-reported fields forwarded for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymptomReport {
    pub age: u32,
    pub sex: Sex,
    pub symptoms: String,
    pub duration: String,
    pub severity: u8,
    pub additional_notes: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider rejected our credentials")]
    Auth,
    #[error("provider rate limit reached")]
    RateLimited { retry_after: Option<Duration> },
    #[error("transient provider failure: {0}")]
    Transient(String),
    #[error("provider timed out")]
    Timeout,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. } | ProviderError::Transient(_) | ProviderError::Timeout
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProviderError::Auth => StatusCode::BAD_GATEWAY,
            ProviderError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ProviderError::RateLimited { .. }
            | ProviderError::Transient(_)
            | ProviderError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Message safe to return to API clients.
    pub fn public_message(&self) -> &'static str {
        match self {
            ProviderError::Auth => "Analysis provider misconfigured",
            ProviderError::RateLimited { .. } => "Analysis provider is busy, retry later",
            ProviderError::Timeout => "Analysis provider timed out",
            ProviderError::Transient(_) | ProviderError::Unavailable(_) => {
                "Analysis provider unavailable"
            }
        }
    }

    /// Text stored on the submission when analysis could not be completed.
    pub fn fallback_analysis(&self, report: &SymptomReport) -> String {
        match self {
            ProviderError::Auth => "Analysis temporarily unavailable (server configuration).".to_string(),
            ProviderError::RateLimited { .. } => {
                "Analysis delayed due to service load; please check back shortly.".to_string()
            }
            ProviderError::Transient(_) | ProviderError::Timeout | ProviderError::Unavailable(_) => {
                let preview: String = report
                    .symptoms
                    .chars()
                    .take(crate::constants::FALLBACK_NOTES_PREVIEW)
                    .collect();
                format!("Unable to complete automated analysis. Patient reports: {preview}.")
            }
        }
    }
}

/// Downstream service that turns a report into free-text analysis.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, report: &SymptomReport) -> Result<String, ProviderError>;
}

/// Used when no provider is configured: every submission is stored as
/// `not_completed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredProvider;

#[async_trait]
impl AnalysisProvider for UnconfiguredProvider {
    async fn analyze(&self, _report: &SymptomReport) -> Result<String, ProviderError> {
        Err(ProviderError::Unavailable(
            "no analysis provider configured".to_string(),
        ))
    }
}
