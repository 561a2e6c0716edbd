// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;
use zeroize::ZeroizeOnDrop;

use crate::constants::{
    MAX_AGE, MAX_DURATION_LENGTH, MAX_EMAIL_LENGTH, MAX_NOTES_LENGTH, MAX_PASSWORD_LENGTH,
    MAX_SEVERITY, MAX_SYMPTOMS_LENGTH, MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH, MIN_SEVERITY,
    MIN_USERNAME_LENGTH,
};
use crate::provider::SymptomReport;
use crate::submissions::{Sex, Submission, SubmissionStatus};

#[derive(Clone, Deserialize, Validate, ZeroizeOnDrop)]
pub struct SignupRequest {
    #[validate(email)]
    #[validate(length(max = "MAX_EMAIL_LENGTH"))]
    pub email: String,

    #[validate(length(min = "MIN_USERNAME_LENGTH", max = "MAX_USERNAME_LENGTH"))]
    #[validate(custom(function = "validate_username"))]
    pub username: String,

    #[validate(length(min = "MIN_PASSWORD_LENGTH", max = "MAX_PASSWORD_LENGTH"))]
    pub password: String,
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Deserialize, Validate, ZeroizeOnDrop)]
pub struct SigninRequest {
    #[validate(length(min = 1, max = "MAX_USERNAME_LENGTH"))]
    pub username: String,

    #[validate(length(min = 1, max = "MAX_PASSWORD_LENGTH"))]
    pub password: String,
}

impl fmt::Debug for SigninRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigninRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Carries the plaintext API key back to the client exactly once.
#[derive(Clone, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct SigninResponse {
    pub user_id: String,
    pub username: String,
    pub api_key: String,
}

impl fmt::Debug for SigninResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigninResponse")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SymptomCheckRequest {
    #[validate(range(max = "MAX_AGE"))]
    pub age: u32,

    pub sex: Sex,

    #[validate(length(min = 1, max = "MAX_SYMPTOMS_LENGTH"))]
    pub symptoms: String,

    #[validate(length(min = 1, max = "MAX_DURATION_LENGTH"))]
    pub duration: String,

    #[validate(range(min = "MIN_SEVERITY", max = "MAX_SEVERITY"))]
    pub severity: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = "MAX_NOTES_LENGTH"))]
    pub additional_notes: Option<String>,
}

impl From<SymptomCheckRequest> for SymptomReport {
    fn from(request: SymptomCheckRequest) -> Self {
        SymptomReport {
            age: request.age,
            sex: request.sex,
            symptoms: request.symptoms,
            duration: request.duration,
            severity: request.severity,
            additional_notes: request.additional_notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomInput {
    pub age: u32,
    pub sex: Sex,
    pub symptoms: String,
    pub duration: String,
    pub severity: u8,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomCheckResponse {
    pub id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub input: SymptomInput,
    pub analysis: Option<String>,
    pub status: SubmissionStatus,
}

impl From<Submission> for SymptomCheckResponse {
    fn from(submission: Submission) -> Self {
        SymptomCheckResponse {
            id: submission.id.to_string(),
            user_id: submission.user_id.to_string(),
            timestamp: submission.submitted_at,
            input: SymptomInput {
                age: submission.age,
                sex: submission.sex,
                symptoms: submission.symptoms,
                duration: submission.duration,
                severity: submission.severity,
                additional_notes: submission.additional_notes,
            },
            analysis: submission.analysis,
            status: submission.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub history: Vec<SymptomCheckResponse>,
}

/// Letters, digits, `_`, `-` and `.`
fn validate_username(username: &str) -> Result<(), validator::ValidationError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
    if !username.chars().all(allowed) {
        return Err(validator::ValidationError::new("invalid_username"));
    }
    Ok(())
}
