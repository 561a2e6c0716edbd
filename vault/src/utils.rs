// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use aws_lc_rs::rand::{SecureRandom, SystemRandom};
use data_encoding::{BASE64_NOPAD, BASE64URL_NOPAD};

use crate::errors::VaultError;

#[inline]
pub fn random_bytes<const N: usize>() -> Result<[u8; N], VaultError> {
    let mut buf = [0u8; N];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| VaultError::Random)?;
    Ok(buf)
}

/// Decodes standard or URL-safe base64, with or without padding.
#[inline]
pub fn base64_decode_any(input: &str) -> Option<Vec<u8>> {
    let trimmed = input.trim().trim_end_matches('=');
    BASE64URL_NOPAD
        .decode(trimmed.as_bytes())
        .or_else(|_| BASE64_NOPAD.decode(trimmed.as_bytes()))
        .ok()
}

/// passlib's "adapted base64": unpadded standard base64 with `.` in place of `+`.
#[inline]
pub fn ab64_encode(input: &[u8]) -> String {
    BASE64_NOPAD.encode(input).replace('+', ".")
}

#[inline]
pub fn ab64_decode(input: &str) -> Option<Vec<u8>> {
    BASE64_NOPAD
        .decode(input.replace('.', "+").as_bytes())
        .ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_decode_any_accepts_both_alphabets() {
        // 0xfb 0xff encodes to "+/8" in standard and "-_8" in URL-safe base64
        assert_eq!(base64_decode_any("+/8=").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(base64_decode_any("-_8").unwrap(), vec![0xfb, 0xff]);
        assert!(base64_decode_any("not base64!").is_none());
    }

    #[test]
    fn test_ab64_uses_dot_instead_of_plus() {
        let encoded = ab64_encode(&[0xfb, 0xff]);
        assert_eq!(encoded, "./8");
        assert_eq!(ab64_decode(&encoded).unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn test_random_bytes_differ() {
        let a: [u8; 16] = random_bytes().unwrap();
        let b: [u8; 16] = random_bytes().unwrap();
        assert_ne!(a, b);
    }
}
