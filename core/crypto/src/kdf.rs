//! Key derivation: PBKDF2 password stretching and HMAC secret combining.

use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::hash::hmac_sha256;
use crate::keys::{SymmetricKey, KEY_LENGTH};
use pqbridge_common::{Error, Result};

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Lowest iteration count accepted by [`Pbkdf2Params::checked`].
pub const MIN_ITERATIONS: u32 = 10_000;

/// Parameters for PBKDF2-HMAC-SHA256 key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pbkdf2Params {
    /// Number of HMAC iterations.
    pub iterations: u32,
}

impl Pbkdf2Params {
    /// Minimum acceptable work factor for interactive use.
    pub fn interactive() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Higher work factor for keys protecting long-term storage.
    pub fn sensitive() -> Self {
        Self {
            iterations: 600_000,
        }
    }

    /// Build parameters, rejecting iteration counts below [`MIN_ITERATIONS`].
    pub fn checked(iterations: u32) -> Result<Self> {
        if iterations < MIN_ITERATIONS {
            return Err(Error::InvalidInput(format!(
                "Iteration count {} is below the minimum of {}",
                iterations, MIN_ITERATIONS
            )));
        }
        Ok(Self { iterations })
    }
}

impl Default for Pbkdf2Params {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Derive a symmetric key from a password and salt using PBKDF2-HMAC-SHA256.
///
/// # Preconditions
/// - `password` must not be empty
/// - `salt` should be random and stored alongside anything the key protects
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns error if password is empty or iterations is zero
pub fn derive_key_from_password(password: &[u8], salt: &[u8], iterations: u32) -> Result<SymmetricKey> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }
    if iterations == 0 {
        return Err(Error::InvalidInput("Iteration count must be positive".to_string()));
    }

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key_bytes);

    let key = SymmetricKey::from_bytes(key_bytes);
    zeroize::Zeroize::zeroize(&mut key_bytes);
    Ok(key)
}

/// Mix two independently derived secrets into one.
///
/// Computes HMAC-SHA256 with `secret_a` as the key and `secret_b` as the
/// message. Output is always 32 bytes.
pub fn combine_secrets(secret_a: &[u8], secret_b: &[u8]) -> Result<[u8; 32]> {
    hmac_sha256(secret_a, secret_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    // PBKDF2 test vectors use low counts so the suite stays fast.
    const TEST_ITERATIONS: u32 = 1_000;

    #[test]
    fn test_derive_key_deterministic() {
        let salt = [42u8; 32];

        let key1 = derive_key_from_password(b"test-password-123", &salt, TEST_ITERATIONS).unwrap();
        let key2 = derive_key_from_password(b"test-password-123", &salt, TEST_ITERATIONS).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let key1 = derive_key_from_password(b"pw", &[1u8; 32], TEST_ITERATIONS).unwrap();
        let key2 = derive_key_from_password(b"pw", &[2u8; 32], TEST_ITERATIONS).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_iterations() {
        let salt = [3u8; 32];
        let key1 = derive_key_from_password(b"pw", &salt, TEST_ITERATIONS).unwrap();
        let key2 = derive_key_from_password(b"pw", &salt, TEST_ITERATIONS + 1).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_rfc6070_style_vector() {
        // PBKDF2-HMAC-SHA256("password", "salt", 1), first 32 bytes.
        let key = derive_key_from_password(b"password", b"salt", 1).unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn test_derive_key_rejects_bad_input() {
        assert!(derive_key_from_password(b"", &[0u8; 32], TEST_ITERATIONS).is_err());
        assert!(derive_key_from_password(b"pw", &[0u8; 32], 0).is_err());
    }

    #[test]
    fn test_params_checked() {
        assert!(Pbkdf2Params::checked(MIN_ITERATIONS).is_ok());
        assert!(Pbkdf2Params::checked(MIN_ITERATIONS - 1).is_err());
        assert_eq!(Pbkdf2Params::default().iterations, DEFAULT_ITERATIONS);
        assert!(Pbkdf2Params::sensitive().iterations > Pbkdf2Params::interactive().iterations);
    }

    #[test]
    fn test_combine_secrets() {
        let a = [1u8; 32];
        let b = [2u8; 32];

        let combined = combine_secrets(&a, &b).unwrap();
        assert_eq!(combined.len(), 32);
        assert_eq!(combined, combine_secrets(&a, &b).unwrap());
        assert_ne!(combined, combine_secrets(&b, &a).unwrap());
        assert_ne!(&combined[..], &a[..]);
        assert_ne!(&combined[..], &b[..]);
    }

    #[test]
    fn test_combine_secrets_known_vector() {
        // RFC 4231 test case 2.
        let out = combine_secrets(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            hex::encode(out),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
