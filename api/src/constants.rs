// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

use crate::admission::EndpointLimit;

pub const USER_ID_HEADER: &str = "user-id";
pub const API_KEY_HEADER: &str = "api-key";

pub const MAX_BODY_SIZE: usize = 1024 * 1024; // 1 MB
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const RATE_LIMIT_KEY_PREFIX: &str = "rate_limit";
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);
pub const DEFAULT_BUCKET_IDLE_TTL: Duration = Duration::from_secs(3600); // 1 hour
pub const BUCKET_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const BUCKET_SHARDS: usize = 16;

/// 5 requests per minute, shared by the text and OCR symptom checks
pub const SYMPTOM_CHECK_LIMIT: EndpointLimit = EndpointLimit::per_minute("post_symptom_check", 5);
/// 10 requests per minute
pub const SYMPTOM_HISTORY_LIMIT: EndpointLimit =
    EndpointLimit::per_minute("get_symptom_history", 10);
pub const REVOKE_CREDENTIAL_LIMIT: EndpointLimit =
    EndpointLimit::per_minute("post_revoke_credential", 5);

pub const HISTORY_PAGE_SIZE: usize = 10;
pub const FALLBACK_NOTES_PREVIEW: usize = 300;

// Validation constants for signup / signin
pub const MIN_USERNAME_LENGTH: u64 = 3;
pub const MAX_USERNAME_LENGTH: u64 = 64;
pub const MAX_EMAIL_LENGTH: u64 = 254;
pub const MIN_PASSWORD_LENGTH: u64 = 8;
pub const MAX_PASSWORD_LENGTH: u64 = 256;

// Validation constants for symptom submissions
pub const MAX_AGE: u32 = 130;
pub const MIN_SEVERITY: u8 = 1;
pub const MAX_SEVERITY: u8 = 10;
pub const MAX_SYMPTOMS_LENGTH: u64 = 4096;
pub const MAX_DURATION_LENGTH: u64 = 128;
pub const MAX_NOTES_LENGTH: u64 = 4096;
