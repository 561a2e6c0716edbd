// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP route handlers for the symptom-intake API.
//!
//! | Method | Path | Handler | Description |
//! |--------|------|---------|-------------|
//! | GET | `/health` | [`health`] | Health check endpoint |
//! | POST | `/auth/signup` | [`signup`] | Register a new identity |
//! | POST | `/auth/signin` | [`signin`] | Exchange a password for an API key |
//! | POST | `/auth/revoke` | [`revoke`] | Invalidate the caller's API key |
//! | POST | `/symptom-check` | [`symptom_check`] | Submit symptoms for analysis |
//! | GET | `/symptom-history` | [`symptom_history`] | Last completed submissions |
//!
//! The last three sit behind [`crate::gate::admit`].

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::application::AppState;
use crate::constants::HISTORY_PAGE_SIZE;
use crate::errors::AppError;
use crate::gate::AuthenticatedIdentity;
use crate::models::{
    HistoryResponse, SigninRequest, SigninResponse, SignupRequest, SymptomCheckRequest,
    SymptomCheckResponse,
};
use crate::provider::SymptomReport;
use crate::submissions::{Submission, SubmissionStatus};

/// Health check endpoint.
///
/// ```json
/// {"status": "ok"}
/// ```
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

fn validate<T: Validate>(request: &T) -> Result<(), AppError> {
    request.validate().map_err(|e| {
        tracing::debug!("[api] validation failed: {}", e);
        AppError::ValidationError(e.to_string())
    })
}

/// Registers a new identity. The API key is only revealed by [`signin`].
///
/// # Errors
///
/// - [`AppError::ValidationError`] - malformed email, username or password
/// - [`AppError::Conflict`] - username or email already registered
#[tracing::instrument(skip(state, request), fields(username = %request.username))]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<StatusCode, AppError> {
    validate(&request)?;

    state
        .credentials
        .issue(&request.email, &request.username, &request.password)
        .await?;

    Ok(StatusCode::CREATED)
}

/// Verifies the password and returns the current API key, rotating it first
/// when it has expired or been revoked.
///
/// Unknown usernames and wrong passwords produce the same 401.
#[tracing::instrument(skip(state, request), fields(username = %request.username))]
pub async fn signin(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SigninRequest>,
) -> Result<Json<SigninResponse>, AppError> {
    validate(&request).map_err(|_| AppError::Unauthenticated)?;

    let signed_in = state
        .credentials
        .authenticate_and_refresh(&request.username, &request.password)
        .await?;

    tracing::debug!(
        "[api] signin for {} (rotated: {})",
        signed_in.identity.id,
        signed_in.rotated
    );

    Ok(Json(SigninResponse {
        user_id: signed_in.identity.id.to_string(),
        username: signed_in.identity.username.clone(),
        api_key: signed_in.api_key.expose().to_string(),
    }))
}

#[tracing::instrument(skip(state, caller), fields(id = %caller.id))]
pub async fn revoke(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedIdentity>,
) -> Result<StatusCode, AppError> {
    state.credentials.revoke(caller.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stores the submission, asks the analysis provider and records the outcome.
///
/// When the provider fails the submission is kept as `not_completed` with a
/// fallback analysis before the failure is reported to the caller.
#[tracing::instrument(skip(state, caller, request), fields(id = %caller.id))]
pub async fn symptom_check(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedIdentity>,
    Json(request): Json<SymptomCheckRequest>,
) -> Result<(StatusCode, Json<SymptomCheckResponse>), AppError> {
    validate(&request)?;

    let report = SymptomReport::from(request);
    let submission = state
        .submissions
        .insert(Submission {
            id: Uuid::new_v4(),
            user_id: caller.id,
            age: report.age,
            sex: report.sex,
            symptoms: report.symptoms.clone(),
            duration: report.duration.clone(),
            severity: report.severity,
            additional_notes: report.additional_notes.clone(),
            analysis: None,
            status: SubmissionStatus::InReview,
            submitted_at: state.clock.now(),
        })
        .await?;

    let (analysis, status, failure) = match state.provider.analyze(&report).await {
        Ok(analysis) => (analysis, SubmissionStatus::Completed, None),
        Err(e) => {
            if e.is_retryable() {
                tracing::warn!("[api] analysis failed for {}: {}", submission.id, e);
            } else {
                tracing::error!("[api] analysis failed for {}: {}", submission.id, e);
            }
            (
                e.fallback_analysis(&report),
                SubmissionStatus::NotCompleted,
                Some(e),
            )
        }
    };

    let submission = state
        .submissions
        .complete(submission.id, analysis, status)
        .await?
        .ok_or(AppError::InternalServerError)?;

    if let Some(e) = failure {
        return Err(AppError::from(e));
    }

    Ok((
        StatusCode::CREATED,
        Json(SymptomCheckResponse::from(submission)),
    ))
}

#[tracing::instrument(skip(state, caller), fields(id = %caller.id))]
pub async fn symptom_history(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedIdentity>,
) -> Result<Json<HistoryResponse>, AppError> {
    let history = state
        .submissions
        .list_completed(caller.id, HISTORY_PAGE_SIZE, 0)
        .await?;

    Ok(Json(HistoryResponse {
        user_id: caller.id.to_string(),
        history: history.into_iter().map(SymptomCheckResponse::from).collect(),
    }))
}
