//! Asymmetric provider trait definition.
//!
//! The provider is the seam where the classical stand-ins are swapped for
//! post-quantum schemes. The bridge only ever hands callers byte strings,
//! so replacing the provider changes no call site.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::keys::KeyPurpose;
use pqbridge_common::{Error, Result, SensitiveBytes};

/// Optional operations a provider may offer.
///
/// Declared once by the provider and checked when the bridge is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Public-key encryption (KEM or its stand-in).
    pub asymmetric_encryption: bool,
    /// Digital signatures.
    pub signatures: bool,
    /// Native key agreement. Without it the bridge uses the hash placeholder.
    pub key_agreement: bool,
}

impl Capabilities {
    /// What the bridge cannot work without.
    pub const REQUIRED: Capabilities = Capabilities {
        asymmetric_encryption: true,
        signatures: true,
        key_agreement: false,
    };

    /// Whether `self` offers everything `required` asks for.
    pub fn satisfies(&self, required: &Capabilities) -> bool {
        (!required.asymmetric_encryption || self.asymmetric_encryption)
            && (!required.signatures || self.signatures)
            && (!required.key_agreement || self.key_agreement)
    }
}

/// Human-readable names of the algorithms a provider implements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmSuite {
    /// Algorithm standing in for the post-quantum KEM.
    pub key_encapsulation: String,
    /// Algorithm standing in for the post-quantum signature.
    pub signature: String,
    pub aead: String,
    pub kdf: String,
    pub hash: String,
    /// True while classical algorithms stand in for PQC.
    pub interim: bool,
}

/// Provider of the asymmetric primitives behind the bridge.
///
/// Implementations must export public keys as SPKI DER and private keys as
/// PKCS#8 DER, and accept the same encodings on import.
#[async_trait]
pub trait CryptoProvider: Send + Sync + 'static {
    /// Parsed public key object.
    type PublicKey: Clone + Send + Sync + 'static;
    /// Parsed private key object.
    type PrivateKey: Clone + Send + Sync + 'static;

    /// Algorithms this provider implements.
    fn suite(&self) -> AlgorithmSuite;

    /// Operations this provider offers.
    fn capabilities(&self) -> Capabilities;

    /// Generate a fresh key pair for `purpose`.
    ///
    /// # Errors
    /// - `KeyGeneration` if the provider rejects its parameters
    async fn generate(&self, purpose: KeyPurpose) -> Result<(Self::PublicKey, Self::PrivateKey)>;

    /// Export a public key as SPKI DER.
    fn export_public(&self, key: &Self::PublicKey) -> Result<Vec<u8>>;

    /// Export a private key as PKCS#8 DER.
    fn export_private(&self, key: &Self::PrivateKey) -> Result<SensitiveBytes>;

    /// Parse an SPKI DER public key.
    fn import_public(&self, der: &[u8]) -> Result<Self::PublicKey>;

    /// Parse a PKCS#8 DER private key.
    fn import_private(&self, der: &[u8]) -> Result<Self::PrivateKey>;

    /// Derive the public key belonging to a private key.
    fn public_from_private(&self, key: &Self::PrivateKey) -> Self::PublicKey;

    /// Largest plaintext [`CryptoProvider::encrypt`] accepts under `key`.
    fn max_plaintext_len(&self, key: &Self::PublicKey) -> usize;

    /// Encrypt a short plaintext to `key`.
    async fn encrypt(&self, key: &Self::PublicKey, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a ciphertext produced by [`CryptoProvider::encrypt`].
    ///
    /// # Errors
    /// - `Decryption` on padding or key mismatch
    async fn decrypt(&self, key: &Self::PrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Sign `data`.
    async fn sign(&self, key: &Self::PrivateKey, data: &[u8]) -> Result<Vec<u8>>;

    /// Check `signature` over `data`. Errors describe why it did not verify.
    async fn verify(&self, key: &Self::PublicKey, data: &[u8], signature: &[u8]) -> Result<()>;

    /// Native key agreement, for providers declaring `key_agreement`.
    async fn agree(&self, _local: &Self::PrivateKey, _remote: &Self::PublicKey) -> Result<[u8; 32]> {
        Err(Error::Unsupported(format!(
            "{} does not offer key agreement",
            self.suite().key_encapsulation
        )))
    }
}
