// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    InReview,
    Completed,
    NotCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub age: u32,
    pub sex: Sex,
    pub symptoms: String,
    pub duration: String,
    pub severity: u8,
    pub additional_notes: Option<String>,
    pub analysis: Option<String>,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn insert(&self, submission: Submission) -> Result<Submission, StoreError>;

    /// Records the analysis outcome. `None` when the submission is unknown.
    async fn complete(
        &self,
        id: Uuid,
        analysis: String,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>, StoreError>;

    /// Completed submissions of one user, newest first.
    async fn list_completed(
        &self,
        user_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Submission>, StoreError>;
}

#[derive(Default)]
pub struct MemorySubmissionStore {
    submissions: RwLock<Vec<Submission>>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn insert(&self, submission: Submission) -> Result<Submission, StoreError> {
        let mut submissions = self.submissions.write().await;
        if submissions.iter().any(|s| s.id == submission.id) {
            return Err(StoreError::UniqueViolation("id"));
        }
        submissions.push(submission.clone());
        Ok(submission)
    }

    async fn complete(
        &self,
        id: Uuid,
        analysis: String,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>, StoreError> {
        let mut submissions = self.submissions.write().await;
        Ok(submissions.iter_mut().find(|s| s.id == id).map(|s| {
            s.analysis = Some(analysis);
            s.status = status;
            s.clone()
        }))
    }

    async fn list_completed(
        &self,
        user_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Submission>, StoreError> {
        let submissions = self.submissions.read().await;
        let mut completed: Vec<Submission> = submissions
            .iter()
            .filter(|s| s.user_id == user_id && s.status == SubmissionStatus::Completed)
            .cloned()
            .collect();
        completed.sort_by_key(|s| Reverse(s.submitted_at));
        Ok(completed.into_iter().skip(offset).take(limit).collect())
    }
}
