// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use clap::{ArgAction, Parser};
use intake_vault::VaultPolicy;
use intake_vault::constants::{
    DEFAULT_CREDENTIAL_EXPIRE_DAYS, DEFAULT_PASSWORD_ITERATIONS, MAX_PASSWORD_ITERATIONS,
};

use crate::admission::{AdmissionSettings, FailurePolicy};
use crate::constants::{DEFAULT_BUCKET_IDLE_TTL, DEFAULT_STORE_TIMEOUT};

#[derive(Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct ServiceOptions {
    #[arg(long, default_value = "127.0.0.1", env("INTAKE_HTTP_HOST"))]
    pub host: String,
    #[arg(long, default_value = "8080", env("INTAKE_HTTP_PORT"))]
    pub port: u16,
    /// 32-byte AES-256-GCM key, base64 encoded
    #[arg(
        long,
        env("INTAKE_CREDENTIAL_KEY"),
        hide_env_values = true,
        required_unless_present = "generate_key"
    )]
    pub credential_key: Option<String>,
    #[arg(long, default_value = "3", env("INTAKE_CREDENTIAL_EXPIRE_DAYS"))]
    pub credential_expire_days: u32,
    #[arg(
        long,
        default_value = "29000",
        env("INTAKE_PASSWORD_ITERATIONS"),
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_PASSWORD_ITERATIONS))
    )]
    pub password_iterations: u32,
    /// Shared bucket store; buckets stay in process memory when unset
    #[arg(long, env("INTAKE_REDIS_URL"), hide_env_values = true)]
    pub redis_url: Option<String>,
    #[arg(long, default_value = "250", env("INTAKE_STORE_TIMEOUT_MS"))]
    pub store_timeout_ms: u64,
    #[arg(long, value_enum, default_value_t = FailurePolicy::Closed, env("INTAKE_ADMISSION_FAILURE"))]
    pub admission_failure: FailurePolicy,
    #[arg(long, default_value = "3600", env("INTAKE_BUCKET_IDLE_TTL_SECS"))]
    pub bucket_idle_ttl_secs: u64,
    /// Print a fresh credential key and exit
    #[arg(long, default_value = "false", action = ArgAction::SetTrue)]
    pub generate_key: bool,
}

impl ServiceOptions {
    pub fn vault_policy(&self) -> VaultPolicy {
        VaultPolicy {
            password_iterations: NonZeroU32::new(self.password_iterations)
                .unwrap_or(VaultPolicy::default().password_iterations),
            credential_expire_days: self.credential_expire_days,
        }
    }

    pub fn admission_settings(&self) -> AdmissionSettings {
        AdmissionSettings {
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            idle_ttl: Duration::from_secs(self.bucket_idle_ttl_secs),
            failure_policy: self.admission_failure,
        }
    }
}

// hand-written so secrets never reach the startup log
impl fmt::Debug for ServiceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credential_key", &self.credential_key.as_ref().map(|_| "[REDACTED]"))
            .field("credential_expire_days", &self.credential_expire_days)
            .field("password_iterations", &self.password_iterations)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("admission_failure", &self.admission_failure)
            .field("bucket_idle_ttl_secs", &self.bucket_idle_ttl_secs)
            .finish()
    }
}

impl Default for ServiceOptions {
    fn default() -> Self {
        ServiceOptions {
            host: "127.0.0.1".to_string(),
            port: 8080,
            credential_key: None,
            credential_expire_days: DEFAULT_CREDENTIAL_EXPIRE_DAYS,
            password_iterations: DEFAULT_PASSWORD_ITERATIONS,
            redis_url: None,
            store_timeout_ms: u64::try_from(DEFAULT_STORE_TIMEOUT.as_millis()).unwrap_or(250),
            admission_failure: FailurePolicy::Closed,
            bucket_idle_ttl_secs: DEFAULT_BUCKET_IDLE_TTL.as_secs(),
            generate_key: false,
        }
    }
}
