//! Common error types for PQBridge.

use thiserror::Error;

/// Top-level error type for PQBridge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Key pair generation was rejected by the provider.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// AEAD tag verification failed. No plaintext is released.
    #[error("Authentication failed: ciphertext, key or nonce mismatch")]
    AuthenticationFailure,

    /// Asymmetric decryption failed (padding or key mismatch).
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Plaintext exceeds what the asymmetric scheme can carry.
    #[error("Message too long: {len} bytes exceeds maximum of {max}")]
    MessageTooLong { len: usize, max: usize },

    /// Key material could not be parsed or has the wrong shape.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The provider does not offer a required capability.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Other cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Audit data could not be sanitized.
    #[error("Sanitization error: {0}")]
    Sanitization(String),

    /// Background component is not running.
    #[error("Not running: {0}")]
    NotRunning(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
