//! HMAC-SHA256 helper shared by both signing schemes.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag in bytes.
pub const TAG_LEN: usize = 32;

/// HMAC-SHA256 over the concatenation of `parts`.
///
/// Parts are fed in order without separators.
pub fn hmac_sha256(
    key: &[u8],
    parts: &[&[u8]],
) -> Result<[u8; TAG_LEN], hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_are_concatenated() {
        let split = hmac_sha256(b"key", &[b"1700000000", b"GET", b"/orders"]).unwrap();
        let joined = hmac_sha256(b"key", &[b"1700000000GET/orders"]).unwrap();
        assert_eq!(split, joined);
    }

    #[test]
    fn test_key_changes_tag() {
        let a = hmac_sha256(b"key-a", &[b"payload"]).unwrap();
        let b = hmac_sha256(b"key-b", &[b"payload"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rfc4231_case_2() {
        // RFC 4231 test case 2
        let tag = hmac_sha256(b"Jefe", &[b"what do ya want for nothing?"]).unwrap();
        assert_eq!(
            hex::encode(tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
