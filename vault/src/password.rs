// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! One-way password hashing.
//!
//! Digests use PBKDF2-HMAC-SHA256 in passlib's modular crypt format:
//!
//! ```text
//! $pbkdf2-sha256$<iterations>$<ab64 salt>$<ab64 checksum>
//! ```
//!
//! so records written by earlier deployments keep verifying. Comparison is
//! delegated to `aws_lc_rs::pbkdf2::verify`, which runs in constant time.

use std::num::NonZeroU32;

use aws_lc_rs::pbkdf2::{self, PBKDF2_HMAC_SHA256};

use crate::constants::{
    MAX_PASSWORD_ITERATIONS, PASSWORD_HASH_LENGTH, PASSWORD_SALT_LENGTH, PASSWORD_SCHEME,
};
use crate::errors::VaultError;
use crate::utils::{ab64_decode, ab64_encode, random_bytes};

/// Hashes a plaintext password with a fresh random salt.
pub fn hash_password(plain: &str, iterations: NonZeroU32) -> Result<String, VaultError> {
    let salt: [u8; PASSWORD_SALT_LENGTH] = random_bytes()?;
    let mut checksum = [0u8; PASSWORD_HASH_LENGTH];
    pbkdf2::derive(
        PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        plain.as_bytes(),
        &mut checksum,
    );

    Ok(format!(
        "${}${}${}${}",
        PASSWORD_SCHEME,
        iterations,
        ab64_encode(&salt),
        ab64_encode(&checksum)
    ))
}

/// Checks a plaintext password against a stored digest.
///
/// Returns `Ok(false)` on mismatch. Errors only when the digest itself
/// cannot be parsed.
pub fn verify_password(plain: &str, digest: &str) -> Result<bool, VaultError> {
    let parsed = ParsedDigest::parse(digest)?;
    Ok(pbkdf2::verify(
        PBKDF2_HMAC_SHA256,
        parsed.iterations,
        &parsed.salt,
        plain.as_bytes(),
        &parsed.checksum,
    )
    .is_ok())
}

struct ParsedDigest {
    iterations: NonZeroU32,
    salt: Vec<u8>,
    checksum: Vec<u8>,
}

impl ParsedDigest {
    fn parse(digest: &str) -> Result<Self, VaultError> {
        // leading '$' yields an empty first segment
        let mut parts = digest.split('$');
        if parts.next() != Some("") || parts.next() != Some(PASSWORD_SCHEME) {
            return Err(VaultError::MalformedDigest);
        }

        let iterations = parts
            .next()
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|count| *count <= MAX_PASSWORD_ITERATIONS)
            .and_then(NonZeroU32::new)
            .ok_or(VaultError::MalformedDigest)?;
        let salt = parts
            .next()
            .and_then(ab64_decode)
            .ok_or(VaultError::MalformedDigest)?;
        let checksum = parts
            .next()
            .and_then(ab64_decode)
            .filter(|checksum| !checksum.is_empty() && checksum.len() <= 64)
            .ok_or(VaultError::MalformedDigest)?;

        if parts.next().is_some() {
            return Err(VaultError::MalformedDigest);
        }

        Ok(Self {
            iterations,
            salt,
            checksum,
        })
    }
}
