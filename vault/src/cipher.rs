// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Authenticated encryption of API keys at rest.
//!
//! Keys are sealed with AES-256-GCM under a single process-wide key. The
//! stored token is URL-safe base64 (no padding) over:
//!
//! ```text
//! +-------------+--------------+--------------------------+
//! | version (1) | nonce (12)   | ciphertext || tag (16)   |
//! +-------------+--------------+--------------------------+
//! ```
//!
//! Opening fails closed: anything that does not authenticate under the
//! current key is reported as [`VaultError::CorruptCredential`].

use std::fmt;

use aws_lc_rs::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use data_encoding::{BASE64, BASE64URL_NOPAD};
use zeroize::Zeroize;

use crate::constants::{CREDENTIAL_KEY_LENGTH, TOKEN_AAD, TOKEN_VERSION};
use crate::credential::ApiKey;
use crate::errors::VaultError;
use crate::utils::{base64_decode_any, random_bytes};

/// Raw key material for [`CredentialCipher`], zeroized on drop.
#[derive(Clone, Zeroize, zeroize::ZeroizeOnDrop)]
pub struct CredentialKey([u8; CREDENTIAL_KEY_LENGTH]);

impl CredentialKey {
    /// Parses a 32-byte key from standard or URL-safe base64.
    pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
        let mut decoded = base64_decode_any(encoded)
            .ok_or_else(|| VaultError::InvalidKey("key is not valid base64".to_string()))?;

        let result = <[u8; CREDENTIAL_KEY_LENGTH]>::try_from(decoded.as_slice())
            .map(Self)
            .map_err(|_| {
                VaultError::InvalidKey(format!(
                    "expected {} bytes, found {}",
                    CREDENTIAL_KEY_LENGTH,
                    decoded.len()
                ))
            });

        decoded.zeroize();
        result
    }

    pub fn generate() -> Result<Self, VaultError> {
        Ok(Self(random_bytes()?))
    }

    /// Standard padded base64, the form accepted by `--credential-key`.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }
}

impl fmt::Debug for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialKey([REDACTED])")
    }
}

/// Seals and opens API keys under one process-wide key.
pub struct CredentialCipher {
    key: LessSafeKey,
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher {
    pub fn new(key: &CredentialKey) -> Result<Self, VaultError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &key.0)
            .map_err(|_| VaultError::InvalidKey("rejected by AES-256-GCM".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
        })
    }

    pub fn encrypt(&self, secret: &ApiKey) -> Result<String, VaultError> {
        let nonce_bytes: [u8; NONCE_LEN] = random_bytes()?;

        let mut in_out = secret.expose().as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(TOKEN_AAD),
                &mut in_out,
            )
            .map_err(|_| VaultError::Encrypt)?;

        let mut token = Vec::with_capacity(1 + NONCE_LEN + in_out.len());
        token.push(TOKEN_VERSION);
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&in_out);

        Ok(BASE64URL_NOPAD.encode(&token))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<ApiKey, VaultError> {
        let token = BASE64URL_NOPAD
            .decode(ciphertext.as_bytes())
            .map_err(|_| VaultError::CorruptCredential)?;

        let (version, rest) = token
            .split_first()
            .ok_or(VaultError::CorruptCredential)?;
        if *version != TOKEN_VERSION || rest.len() < NONCE_LEN {
            return Err(VaultError::CorruptCredential);
        }

        let (nonce_bytes, sealed) = rest.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| VaultError::CorruptCredential)?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(TOKEN_AAD), &mut in_out)
            .map_err(|_| VaultError::CorruptCredential)?;

        let result = String::from_utf8(plaintext.to_vec())
            .map(ApiKey::from)
            .map_err(|_| VaultError::CorruptCredential);

        in_out.zeroize();
        result
    }
}
