// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

/// Raw entropy behind every API key; hex encoding doubles it to 64 characters.
pub const API_KEY_BYTES: usize = 32;
pub const API_KEY_LENGTH: usize = API_KEY_BYTES * 2;

/// AES-256-GCM key size.
pub const CREDENTIAL_KEY_LENGTH: usize = 32;

pub const TOKEN_VERSION: u8 = 0x01;
pub const TOKEN_AAD: &[u8] = b"intake.credential.v1";

pub const PASSWORD_SCHEME: &str = "pbkdf2-sha256";
pub const PASSWORD_SALT_LENGTH: usize = 16;
pub const PASSWORD_HASH_LENGTH: usize = 32;
/// passlib's historical default for `pbkdf2_sha256`
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 29_000;
/// Upper bound accepted when parsing stored digests
pub const MAX_PASSWORD_ITERATIONS: u32 = 10_000_000;

pub const DEFAULT_CREDENTIAL_EXPIRE_DAYS: u32 = 3;
