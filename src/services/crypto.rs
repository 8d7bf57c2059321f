use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::errors::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 for refresh tokens and return as hexadecimal string
pub fn hmac_sha256_token(key: &str, token: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(token.as_bytes());
    let result = mac.finalize();
    format!("{:x}", result.into_bytes())
}

/// Hash a password with bcrypt at the given cost factor.
pub fn hash_password(password: &str, rounds: u32) -> Result<String, AuthError> {
    let hash = bcrypt::hash(password, rounds)?;
    Ok(hash)
}

/// Verify a password against a stored bcrypt hash.
///
/// Returns false for a mismatch; an error only for a malformed stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let matched = bcrypt::verify(password, stored_hash)?;
    Ok(matched)
}

/// Generate a hex-encoded token from `n_bytes` of cryptographically secure
/// randomness. 32 bytes yields a 64-character string.
pub fn generate_token_hex(n_bytes: usize) -> String {
    let mut buf = vec![0u8; n_bytes];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}
