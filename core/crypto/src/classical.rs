//! Classical stand-in provider: RSA-OAEP and RSA-PSS over SHA-256.
//!
//! RSA plays the role of ML-KEM and ML-DSA until those are available.
//! Keys export as SPKI / PKCS#8 DER, the same encodings the post-quantum
//! providers are expected to use.

use async_trait::async_trait;
use rsa::{
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    traits::PublicKeyParts,
    Oaep, Pss, RsaPrivateKey, RsaPublicKey,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::hash::{sha256, HASH_SIZE};
use crate::keys::KeyPurpose;
use crate::provider::{AlgorithmSuite, Capabilities, CryptoProvider};
use pqbridge_common::{Error, Result, SensitiveBytes};

/// Smallest modulus accepted for key generation.
pub const MIN_MODULUS_BITS: usize = 1024;

/// OAEP overhead with SHA-256: two digests plus two bytes.
pub const OAEP_OVERHEAD: usize = 2 * HASH_SIZE + 2;

/// RSA parameters for the classical provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaParams {
    /// Modulus size in bits.
    pub modulus_bits: usize,
}

impl Default for RsaParams {
    fn default() -> Self {
        Self { modulus_bits: 2048 }
    }
}

/// Provider backed by the `rsa` crate.
#[derive(Debug, Clone, Default)]
pub struct ClassicalProvider {
    params: RsaParams,
}

impl ClassicalProvider {
    /// Create a provider with the given RSA parameters.
    ///
    /// # Errors
    /// - Returns error if the modulus is below [`MIN_MODULUS_BITS`]
    pub fn new(params: RsaParams) -> Result<Self> {
        if params.modulus_bits < MIN_MODULUS_BITS {
            return Err(Error::KeyGeneration(format!(
                "Modulus of {} bits is below the minimum of {}",
                params.modulus_bits, MIN_MODULUS_BITS
            )));
        }
        Ok(Self { params })
    }

    /// RSA parameters in use.
    pub fn params(&self) -> RsaParams {
        self.params
    }
}

#[async_trait]
impl CryptoProvider for ClassicalProvider {
    type PublicKey = RsaPublicKey;
    type PrivateKey = RsaPrivateKey;

    fn suite(&self) -> AlgorithmSuite {
        AlgorithmSuite {
            key_encapsulation: format!("RSA-OAEP-{}-SHA256", self.params.modulus_bits),
            signature: format!("RSA-PSS-{}-SHA256", self.params.modulus_bits),
            aead: "AES-256-GCM".to_string(),
            kdf: "PBKDF2-HMAC-SHA256".to_string(),
            hash: "SHA-256".to_string(),
            interim: true,
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            asymmetric_encryption: true,
            signatures: true,
            key_agreement: false,
        }
    }

    async fn generate(&self, purpose: KeyPurpose) -> Result<(RsaPublicKey, RsaPrivateKey)> {
        let bits = self.params.modulus_bits;
        debug!(?purpose, bits, "Generating RSA key pair");

        // Prime search is CPU-bound; keep it off the async workers.
        let private = tokio::task::spawn_blocking(move || {
            RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        })
        .await
        .map_err(|e| Error::KeyGeneration(format!("Key generation task failed: {}", e)))?
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;

        let public = RsaPublicKey::from(&private);
        Ok((public, private))
    }

    fn export_public(&self, key: &RsaPublicKey) -> Result<Vec<u8>> {
        key.to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| Error::Crypto(format!("SPKI export failed: {}", e)))
    }

    fn export_private(&self, key: &RsaPrivateKey) -> Result<SensitiveBytes> {
        key.to_pkcs8_der()
            .map(|doc| SensitiveBytes::new(doc.as_bytes().to_vec()))
            .map_err(|e| Error::Crypto(format!("PKCS#8 export failed: {}", e)))
    }

    fn import_public(&self, der: &[u8]) -> Result<RsaPublicKey> {
        RsaPublicKey::from_public_key_der(der)
            .map_err(|e| Error::InvalidKey(format!("Not an SPKI RSA public key: {}", e)))
    }

    fn import_private(&self, der: &[u8]) -> Result<RsaPrivateKey> {
        RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| Error::InvalidKey(format!("Not a PKCS#8 RSA private key: {}", e)))
    }

    fn public_from_private(&self, key: &RsaPrivateKey) -> RsaPublicKey {
        RsaPublicKey::from(key)
    }

    fn max_plaintext_len(&self, key: &RsaPublicKey) -> usize {
        key.size().saturating_sub(OAEP_OVERHEAD)
    }

    async fn encrypt(&self, key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
        let max = self.max_plaintext_len(key);
        if plaintext.len() > max {
            return Err(Error::MessageTooLong {
                len: plaintext.len(),
                max,
            });
        }
        key.encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| Error::Crypto(format!("Asymmetric encryption failed: {}", e)))
    }

    async fn decrypt(&self, key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
        key.decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|e| Error::Decryption(e.to_string()))
    }

    async fn sign(&self, key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>> {
        let digest = sha256(data);
        key.sign_with_rng(&mut rand::thread_rng(), Pss::new::<Sha256>(), &digest)
            .map_err(|e| Error::Crypto(format!("Signing failed: {}", e)))
    }

    async fn verify(&self, key: &RsaPublicKey, data: &[u8], signature: &[u8]) -> Result<()> {
        let digest = sha256(data);
        key.verify(Pss::new::<Sha256>(), &digest, signature)
            .map_err(|e| Error::Crypto(format!("Signature rejected: {}", e)))
    }
}
