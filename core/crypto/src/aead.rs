//! Authenticated encryption using AES-256-GCM.
//!
//! The public API keeps the nonce and the authentication tag separate from
//! the ciphertext. The nonce is always generated here, never supplied by
//! the caller.

use aes_gcm::{
    aead::{generic_array::GenericArray, AeadInPlace, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::keys::{SymmetricKey, KEY_LENGTH};
use pqbridge_common::{Error, Result};

/// Nonce size for AES-GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Output of a symmetric encryption.
///
/// `iv` is always [`NONCE_SIZE`] bytes and `tag` always [`TAG_SIZE`] bytes.
/// Serialized form carries all three fields as standard base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "b64_array")]
    pub iv: [u8; NONCE_SIZE],
    #[serde(with = "b64_array")]
    pub tag: [u8; TAG_SIZE],
}

impl EncryptedEnvelope {
    /// Encode as JSON for handing to a transport.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON, checking iv and tag lengths.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Encrypt plaintext using AES-256-GCM.
///
/// # Postconditions
/// - A fresh random 12-byte nonce is used for every call
/// - `ciphertext.len() == plaintext.len()`
///
/// # Errors
/// - Returns error if encryption fails
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
    let mut iv = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(&tag);

    Ok(EncryptedEnvelope {
        ciphertext: buffer,
        iv,
        tag: tag_bytes,
    })
}

/// Decrypt ciphertext using AES-256-GCM.
///
/// # Preconditions
/// - `key` must be exactly KEY_LENGTH bytes
/// - `iv` must be NONCE_SIZE bytes, `tag` must be TAG_SIZE bytes
///
/// # Errors
/// - `InvalidInput` if any length is wrong
/// - `AuthenticationFailure` if the tag does not verify; no partial
///   plaintext is ever returned
pub fn decrypt(key: &[u8], ciphertext: &[u8], iv: &[u8], tag: &[u8]) -> Result<Vec<u8>> {
    if key.len() != KEY_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    if iv.len() != NONCE_SIZE {
        return Err(Error::InvalidInput(format!(
            "Invalid nonce length: expected {}, got {}",
            NONCE_SIZE,
            iv.len()
        )));
    }
    if tag.len() != TAG_SIZE {
        return Err(Error::InvalidInput(format!(
            "Invalid tag length: expected {}, got {}",
            TAG_SIZE,
            tag.len()
        )));
    }

    let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
    let mut buffer = ciphertext.to_vec();

    match cipher.decrypt_in_place_detached(
        GenericArray::from_slice(iv),
        b"",
        &mut buffer,
        GenericArray::from_slice(tag),
    ) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            // Buffer holds unauthenticated plaintext at this point.
            zeroize::Zeroize::zeroize(&mut buffer);
            Err(Error::AuthenticationFailure)
        }
    }
}

/// Decrypt an envelope produced by [`encrypt`].
pub fn decrypt_envelope(key: &SymmetricKey, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
    decrypt(key.as_bytes(), &envelope.ciphertext, &envelope.iv, &envelope.tag)
}

mod b64 {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

mod b64_array {
    use super::*;

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        s: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        d: D,
    ) -> std::result::Result<[u8; N], D::Error> {
        let encoded = String::deserialize(d)?;
        let bytes = STANDARD.decode(encoded).map_err(serde::de::Error::custom)?;
        <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
            serde::de::Error::custom(format!("expected {} bytes, got {}", N, bytes.len()))
        })
    }
}
