// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

/// Failures raised by the credential vault.
///
/// [`VaultError::CorruptCredential`] is recoverable by design of the callers:
/// the signin path rotates the key and the request path rejects the caller.
/// Only [`VaultError::InvalidKey`] is expected to be fatal, and only at startup.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("credential ciphertext failed verification")]
    CorruptCredential,
    #[error("malformed password digest")]
    MalformedDigest,
    #[error("invalid credential key: {0}")]
    InvalidKey(String),
    #[error("unable to encrypt credential")]
    Encrypt,
    #[error("secure random generator failed")]
    Random,
}
