//! Cryptographic Utilities

use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate cryptographically secure random bytes
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Random lowercase hex string of `2 * byte_len` characters
pub fn random_hex(byte_len: usize) -> String {
    hex::encode(random_bytes(byte_len))
}

/// URL-safe base64 without padding (safe inside cookie values)
pub fn to_base64url(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn from_base64url(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::URL_SAFE_NO_PAD.decode(s)
}

/// Compute HMAC-SHA256
pub fn hmac_sha256(key: &[u8; 32], data: &[u8]) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Verify an HMAC-SHA256 tag in constant time
pub fn verify_hmac_sha256(key: &[u8; 32], data: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(key) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(tag).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_hex() {
        let s = random_hex(4);
        assert_eq!(s.len(), 8);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(random_hex(16), random_hex(16));
    }

    #[test]
    fn test_base64url_is_cookie_safe() {
        let data = [0xfbu8, 0xff, 0xfe, 0x00, 0x10];
        let encoded = to_base64url(&data);
        assert!(!encoded.contains(['+', '/', '=', ';']));
        assert_eq!(from_base64url(&encoded).unwrap(), data);
    }

    #[test]
    fn test_hmac_rfc4231_case_2_prefix() {
        // RFC 4231 test case 2 uses a 4-byte key; HMAC pads it with zeros,
        // so the same key zero-extended to 32 bytes yields the same tag.
        let mut key = [0u8; 32];
        key[..4].copy_from_slice(b"Jefe");
        let tag = hmac_sha256(&key, b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_hmac() {
        let key = [42u8; 32];
        let tag = hmac_sha256(&key, b"visitor");
        assert!(verify_hmac_sha256(&key, b"visitor", &tag));
        assert!(!verify_hmac_sha256(&key, b"visitor2", &tag));
        assert!(!verify_hmac_sha256(&[43u8; 32], b"visitor", &tag));
        assert!(!verify_hmac_sha256(&key, b"visitor", &tag[..16]));
    }
}
