//! Keyed digest over a handshake nonce (HMAC-SHA256, hex encoded).

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Random bytes per nonce.
pub const NONCE_LEN: usize = 32;

/// Bytes in an HMAC-SHA256 tag.
const TAG_LEN: usize = 32;

/// Issues a fresh hex-encoded nonce.
pub(crate) fn new_nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn tag(secret: &[u8], nonce: &str) -> Result<Vec<u8>, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|err| AuthError::malformed(format!("invalid shared secret: {err}")))?;
    mac.update(nonce.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Computes the client's answer to a challenge: `hex(HMAC-SHA256(secret, nonce))`.
///
/// # Example
/// ```
/// let a = petitionvisor::sign_nonce(b"secret", "abcd").unwrap();
/// let b = petitionvisor::sign_nonce(b"secret", "abcd").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub fn sign_nonce(secret: &[u8], nonce: &str) -> Result<String, AuthError> {
    tag(secret, nonce).map(hex::encode)
}

/// Checks a client digest in constant time.
pub(crate) fn verify(secret: &[u8], nonce: &str, digest: &str) -> Result<(), AuthError> {
    let provided = hex::decode(digest)
        .map_err(|err| AuthError::malformed(format!("digest is not valid hex: {err}")))?;
    if provided.len() != TAG_LEN {
        return Err(AuthError::malformed(format!(
            "digest has {} bytes, expected {TAG_LEN}",
            provided.len()
        )));
    }
    let expected = tag(secret, nonce)?;
    if bool::from(expected.ct_eq(provided.as_slice())) {
        Ok(())
    } else {
        Err(AuthError::DigestMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_are_fresh_hex() {
        let a = new_nonce();
        let b = new_nonce();
        assert_eq!(a.len(), NONCE_LEN * 2);
        assert!(hex::decode(&a).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn matching_secret_verifies() {
        let nonce = new_nonce();
        let digest = sign_nonce(b"k", &nonce).unwrap();
        assert_eq!(verify(b"k", &nonce, &digest), Ok(()));
    }

    #[test]
    fn wrong_secret_is_a_mismatch() {
        let nonce = new_nonce();
        let digest = sign_nonce(b"wrong", &nonce).unwrap();
        assert_eq!(verify(b"k", &nonce, &digest), Err(AuthError::DigestMismatch));
    }

    #[test]
    fn garbage_digest_is_malformed() {
        let nonce = new_nonce();
        assert!(matches!(
            verify(b"k", &nonce, "not-hex"),
            Err(AuthError::MalformedHandshake { .. })
        ));
        assert!(matches!(
            verify(b"k", &nonce, "abcd"),
            Err(AuthError::MalformedHandshake { .. })
        ));
    }
}
