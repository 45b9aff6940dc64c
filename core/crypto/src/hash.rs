//! Hashing, randomness and the interim key-agreement stand-in.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use pqbridge_common::{Error, Result};

/// Output size of [`sha256`] (256 bits).
pub const HASH_SIZE: usize = 32;

/// Default length of [`generate_nonce`].
pub const DEFAULT_NONCE_LENGTH: usize = 32;

/// Upper bound on a single [`generate_nonce`] request.
pub const MAX_NONCE_LENGTH: usize = 1024 * 1024;

/// Bytes of local key material mixed into [`derive_shared_secret`].
pub const SHARED_SECRET_LOCAL_BYTES: usize = 32;

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; HASH_SIZE] {
    Sha256::digest(data).into()
}

/// Lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// HMAC-SHA256 of `message` under `key`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<[u8; HASH_SIZE]> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("HMAC key rejected: {}", e)))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time equality of two byte slices.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Cryptographically secure random bytes.
///
/// # Errors
/// - Returns error if `length` exceeds [`MAX_NONCE_LENGTH`]
pub fn generate_nonce(length: usize) -> Result<Vec<u8>> {
    if length > MAX_NONCE_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Requested {} random bytes, maximum is {}",
            length, MAX_NONCE_LENGTH
        )));
    }
    let mut bytes = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut bytes);
    Ok(bytes)
}

/// Placeholder key agreement: `SHA-256(local[..32] || remote_public)`.
///
/// Both sides only agree if they feed the same inputs, and the result has
/// no forward secrecy. It stands in until a real KEM is plugged in.
///
/// # Errors
/// - Returns error if `local_key_material` is shorter than 32 bytes
pub fn derive_shared_secret(local_key_material: &[u8], remote_public_key: &[u8]) -> Result<[u8; HASH_SIZE]> {
    if local_key_material.len() < SHARED_SECRET_LOCAL_BYTES {
        return Err(Error::InvalidInput(format!(
            "Local key material must be at least {} bytes, got {}",
            SHARED_SECRET_LOCAL_BYTES,
            local_key_material.len()
        )));
    }

    let mut hasher = Sha256::new();
    hasher.update(&local_key_material[..SHARED_SECRET_LOCAL_BYTES]);
    hasher.update(remote_public_key);
    Ok(hasher.finalize().into())
}
