// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # Intake Vault
//!
//! Credential primitives for the symptom-intake API.
//!
//! Everything in this crate is pure, CPU-bound computation over process
//! configuration: no I/O, no async, no shared mutable state.
//!
//! - [`password`]: PBKDF2-HMAC-SHA256 hashing in passlib's modular crypt format
//! - [`credential`]: opaque 64-character API keys, zeroized on drop
//! - [`cipher`]: AES-256-GCM sealing of API keys for storage at rest
//! - [`vault`]: the [`Vault`] facade combining the above with expiry policy

pub mod cipher;
pub mod constants;
pub mod credential;
pub mod errors;
pub mod password;
pub mod utils;
pub mod vault;

pub use cipher::{CredentialCipher, CredentialKey};
pub use credential::ApiKey;
pub use errors::VaultError;
pub use vault::{Vault, VaultPolicy, expiration_from};
