//! Key types with secure memory handling.
//!
//! Symmetric key material zeroizes on drop. Asymmetric key pairs carry
//! both their exported DER forms and the provider's parsed key object;
//! the parsed object never leaves the process.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::provider::CryptoProvider;
use pqbridge_common::{Error, Result, SensitiveBytes};

/// Length of symmetric keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of generated salts in bytes.
pub const SALT_LENGTH: usize = 32;

/// 256-bit key for the AEAD cipher.
///
/// Ephemeral: the caller generates, uses and drops it. Nothing in this
/// crate stores it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: [u8; KEY_LENGTH],
}

impl SymmetricKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Create a key from a slice.
    ///
    /// # Errors
    /// - Returns error if the slice is not KEY_LENGTH bytes
    pub fn from_slice(key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LENGTH] = key.try_into().map_err(|_| {
            Error::InvalidKey(format!(
                "Invalid key length: expected {}, got {}",
                KEY_LENGTH,
                key.len()
            ))
        })?;
        Ok(Self { key })
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

/// Salt for password-based key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_LENGTH]);

impl Salt {
    /// Generate a random salt.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut salt = [0u8; SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}

/// What an asymmetric key pair is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPurpose {
    Encryption,
    Signing,
}

/// Provider key objects owned by the bridge that produced them.
///
/// Not serializable: only the exported DER forms may cross a process
/// boundary.
pub(crate) struct EngineHandle<P: CryptoProvider> {
    pub(crate) public: P::PublicKey,
    pub(crate) private: P::PrivateKey,
}

impl<P: CryptoProvider> Clone for EngineHandle<P> {
    fn clone(&self) -> Self {
        Self {
            public: self.public.clone(),
            private: self.private.clone(),
        }
    }
}

/// Asymmetric key pair with exported and parsed forms.
pub struct KeyPair<P: CryptoProvider> {
    purpose: KeyPurpose,
    public_key: Vec<u8>,
    private_key: SensitiveBytes,
    handle: EngineHandle<P>,
}

impl<P: CryptoProvider> KeyPair<P> {
    pub(crate) fn new(
        purpose: KeyPurpose,
        public_key: Vec<u8>,
        private_key: SensitiveBytes,
        handle: EngineHandle<P>,
    ) -> Self {
        Self {
            purpose,
            public_key,
            private_key,
            handle,
        }
    }

    /// Purpose this pair was generated for.
    pub fn purpose(&self) -> KeyPurpose {
        self.purpose
    }

    /// Public key in SPKI DER encoding.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Private key in PKCS#8 DER encoding.
    pub fn private_key(&self) -> &[u8] {
        self.private_key.as_bytes()
    }

    /// Public key as standard base64 of the SPKI DER.
    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(&self.public_key)
    }

    /// Parsed public key, usable with the `*_with` bridge operations.
    pub fn public_handle(&self) -> &P::PublicKey {
        &self.handle.public
    }

    pub(crate) fn private_handle(&self) -> &P::PrivateKey {
        &self.handle.private
    }
}

impl<P: CryptoProvider> Clone for KeyPair<P> {
    fn clone(&self) -> Self {
        Self {
            purpose: self.purpose,
            public_key: self.public_key.clone(),
            private_key: self.private_key.clone(),
            handle: self.handle.clone(),
        }
    }
}

impl<P: CryptoProvider> fmt::Debug for KeyPair<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("purpose", &self.purpose)
            .field("public_key_len", &self.public_key.len())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Key pair for asymmetric encryption. Not usable for signing.
pub struct EncryptionKeyPair<P: CryptoProvider>(pub(crate) KeyPair<P>);

/// Key pair for signatures. Not usable for encryption.
pub struct SigningKeyPair<P: CryptoProvider>(pub(crate) KeyPair<P>);

macro_rules! purpose_wrapper {
    ($name:ident) => {
        impl<P: CryptoProvider> std::ops::Deref for $name<P> {
            type Target = KeyPair<P>;

            fn deref(&self) -> &KeyPair<P> {
                &self.0
            }
        }

        impl<P: CryptoProvider> Clone for $name<P> {
            fn clone(&self) -> Self {
                Self(self.0.clone())
            }
        }

        impl<P: CryptoProvider> fmt::Debug for $name<P> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }
    };
}

purpose_wrapper!(EncryptionKeyPair);
purpose_wrapper!(SigningKeyPair);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_key_generate() {
        let key1 = SymmetricKey::generate();
        let key2 = SymmetricKey::generate();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_symmetric_key_from_slice() {
        assert!(SymmetricKey::from_slice(&[7u8; KEY_LENGTH]).is_ok());
        assert!(matches!(
            SymmetricKey::from_slice(&[7u8; 16]),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn test_symmetric_key_debug_redacted() {
        let key = SymmetricKey::from_bytes([9u8; KEY_LENGTH]);
        assert_eq!(format!("{:?}", key), "SymmetricKey([REDACTED])");
    }

    #[test]
    fn test_salt_generate() {
        let salt1 = Salt::generate();
        let salt2 = Salt::generate();

        assert_ne!(salt1.as_bytes(), salt2.as_bytes());
    }
}
