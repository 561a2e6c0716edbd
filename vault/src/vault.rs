// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::num::NonZeroU32;

use chrono::{DateTime, TimeDelta, Utc};

use crate::cipher::{CredentialCipher, CredentialKey};
use crate::constants::{DEFAULT_CREDENTIAL_EXPIRE_DAYS, DEFAULT_PASSWORD_ITERATIONS};
use crate::credential::ApiKey;
use crate::errors::VaultError;
use crate::password;

/// Tunables that are fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy)]
pub struct VaultPolicy {
    pub password_iterations: NonZeroU32,
    pub credential_expire_days: u32,
}

impl Default for VaultPolicy {
    fn default() -> Self {
        Self {
            password_iterations: NonZeroU32::new(DEFAULT_PASSWORD_ITERATIONS)
                .unwrap_or(NonZeroU32::MIN),
            credential_expire_days: DEFAULT_CREDENTIAL_EXPIRE_DAYS,
        }
    }
}

/// Stateless credential operations keyed by process configuration.
///
/// A `Vault` holds no mutable state and can be shared behind an `Arc`
/// across any number of tasks without synchronization.
#[derive(Debug)]
pub struct Vault {
    cipher: CredentialCipher,
    policy: VaultPolicy,
}

impl Vault {
    pub fn new(key: &CredentialKey, policy: VaultPolicy) -> Result<Self, VaultError> {
        Ok(Self {
            cipher: CredentialCipher::new(key)?,
            policy,
        })
    }

    pub fn policy(&self) -> VaultPolicy {
        self.policy
    }

    pub fn hash_password(&self, plain: &str) -> Result<String, VaultError> {
        password::hash_password(plain, self.policy.password_iterations)
    }

    pub fn verify_password(&self, plain: &str, digest: &str) -> Result<bool, VaultError> {
        password::verify_password(plain, digest)
    }

    pub fn generate_credential(&self) -> Result<ApiKey, VaultError> {
        ApiKey::generate()
    }

    pub fn encrypt(&self, secret: &ApiKey) -> Result<String, VaultError> {
        self.cipher.encrypt(secret)
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<ApiKey, VaultError> {
        self.cipher.decrypt(ciphertext)
    }

    /// `now + days`, where `days` falls back to the configured policy.
    pub fn expiration_from(&self, now: DateTime<Utc>, days: Option<u32>) -> DateTime<Utc> {
        expiration_from(now, days.unwrap_or(self.policy.credential_expire_days))
    }
}

/// Saturates at the maximum representable timestamp.
pub fn expiration_from(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now.checked_add_signed(TimeDelta::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
