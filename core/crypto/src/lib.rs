//! Cryptographic bridge for PQBridge.
//!
//! This module provides:
//! - A forward-compatible facade ([`CryptoBridge`]) whose API is shaped for
//!   post-quantum algorithms while classical ones stand in
//! - Authenticated encryption using AES-256-GCM with a detached tag
//! - Password stretching with PBKDF2 and secret mixing with HMAC
//! - A pluggable asymmetric [`CryptoProvider`] with an RSA stand-in
//!
//! # Security Guarantees
//! - Symmetric key material is zeroized on drop
//! - No plaintext or key material is ever logged
//! - Signature verification never returns an error, only `false`

pub mod aead;
pub mod bridge;
pub mod classical;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod provider;

pub use aead::{EncryptedEnvelope, NONCE_SIZE, TAG_SIZE};
pub use bridge::{CryptoBridge, KeyAgreementMode, SealedMessage, Signature};
pub use classical::{ClassicalProvider, RsaParams};
pub use hash::{constant_time_eq, hmac_sha256, sha256, sha256_hex, DEFAULT_NONCE_LENGTH, HASH_SIZE};
pub use kdf::{combine_secrets, derive_key_from_password, Pbkdf2Params, DEFAULT_ITERATIONS};
pub use keys::{EncryptionKeyPair, KeyPair, KeyPurpose, Salt, SigningKeyPair, SymmetricKey, KEY_LENGTH};
pub use provider::{AlgorithmSuite, Capabilities, CryptoProvider};
