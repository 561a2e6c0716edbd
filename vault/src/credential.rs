// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::fmt;

use aws_lc_rs::constant_time::verify_slices_are_equal;
use data_encoding::HEXLOWER;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::API_KEY_BYTES;
use crate::errors::VaultError;
use crate::utils::random_bytes;

/// A plaintext API key.
///
/// The value is wiped from memory on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    /// Draws a new key from the system CSPRNG: 32 bytes, lowercase hex.
    pub fn generate() -> Result<Self, VaultError> {
        let mut raw: [u8; API_KEY_BYTES] = random_bytes()?;
        let key = Self(HEXLOWER.encode(&raw));
        raw.zeroize();
        Ok(key)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a caller-supplied value.
    pub fn matches(&self, supplied: &str) -> bool {
        verify_slices_are_equal(self.0.as_bytes(), supplied.as_bytes()).is_ok()
    }
}

impl From<String> for ApiKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::constants::API_KEY_LENGTH;
    use std::collections::HashSet;

    #[test]
    fn test_generate_is_64_lowercase_hex() {
        let key = ApiKey::generate().unwrap();
        assert_eq!(key.expose().len(), API_KEY_LENGTH);
        assert!(
            key.expose()
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn test_generate_never_repeats() {
        let keys: HashSet<String> = (0..256)
            .map(|_| ApiKey::generate().unwrap().expose().to_string())
            .collect();
        assert_eq!(keys.len(), 256);
    }

    #[test]
    fn test_matches() {
        let key = ApiKey::from("abc123".to_string());
        assert!(key.matches("abc123"));
        assert!(!key.matches("abc124"));
        assert!(!key.matches("abc12"));
        assert!(!key.matches(""));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = ApiKey::generate().unwrap();
        let printed = format!("{key:?}");
        assert!(!printed.contains(key.expose()));
        assert!(printed.contains("REDACTED"));
    }
}
