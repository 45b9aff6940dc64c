//! Forward-compatible cryptographic facade.
//!
//! Method names describe intent ("encrypt asymmetric", "generate signing
//! key pair"), never the concrete algorithm. Callers only see byte strings
//! and the opaque key pair types, so a post-quantum provider can replace
//! the classical one beneath this interface.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aead::{self, EncryptedEnvelope};
use crate::classical::{ClassicalProvider, RsaParams};
use crate::hash::{self, HASH_SIZE};
use crate::kdf::{self, Pbkdf2Params};
use crate::keys::{EncryptionKeyPair, EngineHandle, KeyPair, KeyPurpose, SigningKeyPair, SymmetricKey};
use crate::provider::{AlgorithmSuite, Capabilities, CryptoProvider};
use pqbridge_common::{Error, Result, SensitiveBytes};

/// Detached signature bytes.
///
/// Bound to one (data, private key) pair; does not embed the public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Decode a base64 signature.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        STANDARD
            .decode(encoded.trim())
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("Invalid base64 signature: {}", e)))
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Payload encrypted under a fresh symmetric key that is itself wrapped
/// with the recipient's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedMessage {
    /// Symmetric key encrypted to the recipient.
    #[serde(with = "b64_vec")]
    pub wrapped_key: Vec<u8>,
    /// Payload under the symmetric key.
    pub envelope: EncryptedEnvelope,
}

/// How [`CryptoBridge::derive_shared_secret`] is served, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAgreementMode {
    /// Provider implements key agreement natively.
    Native,
    /// Hash of local material and remote public key; no forward secrecy.
    HashPlaceholder,
}

/// Cryptographic facade over a [`CryptoProvider`].
///
/// Stateless apart from the provider; concurrent calls are independent.
pub struct CryptoBridge<P: CryptoProvider = ClassicalProvider> {
    provider: P,
    capabilities: Capabilities,
    key_agreement: KeyAgreementMode,
}

impl CryptoBridge<ClassicalProvider> {
    /// Bridge over the classical provider with default parameters.
    pub fn classical() -> Result<Self> {
        Self::new(ClassicalProvider::default())
    }

    /// Bridge over the classical provider with custom RSA parameters.
    pub fn with_params(params: RsaParams) -> Result<Self> {
        Self::new(ClassicalProvider::new(params)?)
    }
}

impl<P: CryptoProvider> CryptoBridge<P> {
    /// Build a bridge, checking the provider's capabilities once.
    ///
    /// # Errors
    /// - `Unsupported` if the provider lacks encryption or signatures
    pub fn new(provider: P) -> Result<Self> {
        let capabilities = provider.capabilities();
        if !capabilities.satisfies(&Capabilities::REQUIRED) {
            return Err(Error::Unsupported(format!(
                "Provider {} lacks required capabilities: {:?}",
                provider.suite().key_encapsulation,
                capabilities
            )));
        }

        let key_agreement = if capabilities.key_agreement {
            KeyAgreementMode::Native
        } else {
            KeyAgreementMode::HashPlaceholder
        };

        debug!(?capabilities, ?key_agreement, "Crypto bridge initialized");

        Ok(Self {
            provider,
            capabilities,
            key_agreement,
        })
    }

    /// Capabilities declared by the provider.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// How shared secrets are derived.
    pub fn key_agreement_mode(&self) -> KeyAgreementMode {
        self.key_agreement
    }

    /// Algorithms behind this bridge.
    pub fn info(&self) -> AlgorithmSuite {
        self.provider.suite()
    }

    /// Crate version.
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn generate_pair(&self, purpose: KeyPurpose) -> Result<KeyPair<P>> {
        let (public, private) = self.provider.generate(purpose).await?;
        let public_der = self.provider.export_public(&public)?;
        let private_der = self.provider.export_private(&private)?;
        Ok(KeyPair::new(
            purpose,
            public_der,
            private_der,
            EngineHandle { public, private },
        ))
    }

    /// Generate a key pair for asymmetric encryption.
    ///
    /// # Errors
    /// - `KeyGeneration` if the provider rejects its parameters
    pub async fn generate_encryption_key_pair(&self) -> Result<EncryptionKeyPair<P>> {
        self.generate_pair(KeyPurpose::Encryption)
            .await
            .map(EncryptionKeyPair)
    }

    /// Generate a key pair for signing.
    ///
    /// # Errors
    /// - `KeyGeneration` if the provider rejects its parameters
    pub async fn generate_signing_key_pair(&self) -> Result<SigningKeyPair<P>> {
        self.generate_pair(KeyPurpose::Signing).await.map(SigningKeyPair)
    }

    /// Parse an exported (SPKI DER) public key.
    pub fn import_public_key(&self, der: &[u8]) -> Result<P::PublicKey> {
        self.provider.import_public(der)
    }

    /// Parse an exported (PKCS#8 DER) private key.
    pub fn import_private_key(&self, der: &[u8]) -> Result<P::PrivateKey> {
        self.provider.import_private(der)
    }

    /// Rebuild an encryption key pair from its exported private key.
    pub fn import_encryption_key_pair(&self, private_der: &[u8]) -> Result<EncryptionKeyPair<P>> {
        self.import_pair(KeyPurpose::Encryption, private_der)
            .map(EncryptionKeyPair)
    }

    /// Rebuild a signing key pair from its exported private key.
    pub fn import_signing_key_pair(&self, private_der: &[u8]) -> Result<SigningKeyPair<P>> {
        self.import_pair(KeyPurpose::Signing, private_der)
            .map(SigningKeyPair)
    }

    fn import_pair(&self, purpose: KeyPurpose, private_der: &[u8]) -> Result<KeyPair<P>> {
        let private = self.provider.import_private(private_der)?;
        let public = self.provider.public_from_private(&private);
        let public_der = self.provider.export_public(&public)?;
        Ok(KeyPair::new(
            purpose,
            public_der,
            SensitiveBytes::new(private_der.to_vec()),
            EngineHandle { public, private },
        ))
    }

    /// Largest plaintext [`CryptoBridge::encrypt_asymmetric`] accepts for `public_key`.
    pub fn max_asymmetric_plaintext(&self, public_key: &[u8]) -> Result<usize> {
        let key = self.provider.import_public(public_key)?;
        Ok(self.provider.max_plaintext_len(&key))
    }

    /// Encrypt with the AEAD cipher under a fresh random nonce.
    pub async fn encrypt_symmetric(&self, plaintext: &[u8], key: &SymmetricKey) -> Result<EncryptedEnvelope> {
        aead::encrypt(key, plaintext)
    }

    /// Decrypt an AEAD ciphertext.
    ///
    /// # Errors
    /// - `AuthenticationFailure` on tampered ciphertext, wrong key or wrong iv
    pub async fn decrypt_symmetric(
        &self,
        ciphertext: &[u8],
        key: &SymmetricKey,
        iv: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>> {
        aead::decrypt(key.as_bytes(), ciphertext, iv, tag)
    }

    /// Encrypt a short secret to an exported public key.
    ///
    /// Not for bulk data: the plaintext is bounded by
    /// [`CryptoBridge::max_asymmetric_plaintext`] (190 bytes for the default
    /// 2048-bit stand-in). Use [`CryptoBridge::seal`] for larger payloads.
    ///
    /// # Errors
    /// - `InvalidKey` if the public key does not parse
    /// - `MessageTooLong` if the plaintext exceeds the bound
    pub async fn encrypt_asymmetric(&self, plaintext: &[u8], public_key: &[u8]) -> Result<Vec<u8>> {
        let key = self.provider.import_public(public_key)?;
        self.encrypt_asymmetric_with(plaintext, &key).await
    }

    /// [`CryptoBridge::encrypt_asymmetric`] with an already parsed key.
    pub async fn encrypt_asymmetric_with(&self, plaintext: &[u8], key: &P::PublicKey) -> Result<Vec<u8>> {
        let max = self.provider.max_plaintext_len(key);
        if plaintext.len() > max {
            return Err(Error::MessageTooLong {
                len: plaintext.len(),
                max,
            });
        }
        self.provider.encrypt(key, plaintext).await
    }

    /// Decrypt with an exported private key.
    ///
    /// # Errors
    /// - `Decryption` on padding or key mismatch
    pub async fn decrypt_asymmetric(&self, ciphertext: &[u8], private_key: &[u8]) -> Result<Vec<u8>> {
        let key = self.provider.import_private(private_key)?;
        self.provider.decrypt(&key, ciphertext).await
    }

    /// [`CryptoBridge::decrypt_asymmetric`] with an encryption key pair.
    pub async fn decrypt_asymmetric_with(
        &self,
        ciphertext: &[u8],
        key_pair: &EncryptionKeyPair<P>,
    ) -> Result<Vec<u8>> {
        self.provider
            .decrypt(key_pair.private_handle(), ciphertext)
            .await
    }

    /// Sign `data` with an exported private key.
    pub async fn sign(&self, data: &[u8], private_key: &[u8]) -> Result<Signature> {
        let key = self.provider.import_private(private_key)?;
        self.provider.sign(&key, data).await.map(Signature)
    }

    /// [`CryptoBridge::sign`] with a signing key pair.
    pub async fn sign_with(&self, data: &[u8], key_pair: &SigningKeyPair<P>) -> Result<Signature> {
        self.provider
            .sign(key_pair.private_handle(), data)
            .await
            .map(Signature)
    }

    /// Verify a signature against an exported public key.
    ///
    /// Never fails: malformed keys, malformed signatures and mismatches all
    /// yield `false`. The reason is logged at debug level.
    pub async fn verify(&self, signature: &[u8], data: &[u8], public_key: &[u8]) -> bool {
        match self.provider.import_public(public_key) {
            Ok(key) => self.verify_with(signature, data, &key).await,
            Err(e) => {
                debug!(error = %e, "Signature verification failed: unusable public key");
                false
            }
        }
    }

    /// [`CryptoBridge::verify`] with an already parsed key.
    pub async fn verify_with(&self, signature: &[u8], data: &[u8], key: &P::PublicKey) -> bool {
        match self.provider.verify(key, data, signature).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Signature verification failed");
                false
            }
        }
    }

    /// Combine local key material with a remote public key into 32 bytes.
    ///
    /// With the classical provider this is the hash placeholder
    /// `SHA-256(local[..32] || remote)`: no forward secrecy, and both sides
    /// must supply identical inputs to agree.
    pub async fn derive_shared_secret(
        &self,
        local_private_key_material: &[u8],
        remote_public_key: &[u8],
    ) -> Result<[u8; HASH_SIZE]> {
        match self.key_agreement {
            KeyAgreementMode::Native => {
                let local = self.provider.import_private(local_private_key_material)?;
                let remote = self.provider.import_public(remote_public_key)?;
                self.provider.agree(&local, &remote).await
            }
            KeyAgreementMode::HashPlaceholder => {
                hash::derive_shared_secret(local_private_key_material, remote_public_key)
            }
        }
    }

    /// Fresh random 256-bit key for the AEAD cipher.
    pub fn generate_symmetric_key(&self) -> SymmetricKey {
        SymmetricKey::generate()
    }

    /// Stretch a password with the default work factor.
    pub async fn derive_key_from_password(&self, password: &[u8], salt: &[u8]) -> Result<SymmetricKey> {
        self.derive_key_from_password_with(password, salt, Pbkdf2Params::default())
            .await
    }

    /// Stretch a password with explicit parameters.
    ///
    /// Callers protecting long-term storage should raise the iteration
    /// count as hardware improves.
    pub async fn derive_key_from_password_with(
        &self,
        password: &[u8],
        salt: &[u8],
        params: Pbkdf2Params,
    ) -> Result<SymmetricKey> {
        let password = SensitiveBytes::new(password.to_vec());
        let salt = salt.to_vec();
        tokio::task::spawn_blocking(move || {
            kdf::derive_key_from_password(password.as_bytes(), &salt, params.iterations)
        })
        .await
        .map_err(|e| Error::Crypto(format!("Key derivation task failed: {}", e)))?
    }

    /// Mix two secrets with HMAC-SHA256 (`secret_a` keys, `secret_b` is the message).
    pub async fn combine_secrets(&self, secret_a: &[u8], secret_b: &[u8]) -> Result<[u8; 32]> {
        kdf::combine_secrets(secret_a, secret_b)
    }

    /// Cryptographically secure random bytes. Synchronous.
    ///
    /// Use [`hash::DEFAULT_NONCE_LENGTH`] when no particular length is needed.
    pub fn generate_nonce(&self, length: usize) -> Result<Vec<u8>> {
        hash::generate_nonce(length)
    }

    /// SHA-256 digest.
    pub async fn hash(&self, data: &[u8]) -> [u8; HASH_SIZE] {
        hash::sha256(data)
    }

    /// Encrypt a payload of any size to an exported public key.
    pub async fn seal(&self, plaintext: &[u8], recipient_public_key: &[u8]) -> Result<SealedMessage> {
        let key = self.provider.import_public(recipient_public_key)?;
        self.seal_with(plaintext, &key).await
    }

    /// [`CryptoBridge::seal`] with an already parsed key.
    pub async fn seal_with(&self, plaintext: &[u8], recipient: &P::PublicKey) -> Result<SealedMessage> {
        let content_key = SymmetricKey::generate();
        let envelope = aead::encrypt(&content_key, plaintext)?;
        let wrapped_key = self
            .encrypt_asymmetric_with(content_key.as_bytes(), recipient)
            .await?;
        Ok(SealedMessage {
            wrapped_key,
            envelope,
        })
    }

    /// Open a [`SealedMessage`] with an exported private key.
    pub async fn open(&self, sealed: &SealedMessage, private_key: &[u8]) -> Result<Vec<u8>> {
        let key = self.provider.import_private(private_key)?;
        let content_key = SensitiveBytes::new(self.provider.decrypt(&key, &sealed.wrapped_key).await?);
        self.open_envelope(sealed, &content_key)
    }

    /// [`CryptoBridge::open`] with an encryption key pair.
    pub async fn open_with(&self, sealed: &SealedMessage, key_pair: &EncryptionKeyPair<P>) -> Result<Vec<u8>> {
        let content_key = SensitiveBytes::new(
            self.decrypt_asymmetric_with(&sealed.wrapped_key, key_pair)
                .await?,
        );
        self.open_envelope(sealed, &content_key)
    }

    fn open_envelope(&self, sealed: &SealedMessage, content_key: &SensitiveBytes) -> Result<Vec<u8>> {
        let content_key = SymmetricKey::from_slice(content_key.as_bytes()).map_err(|_| {
            warn!("Sealed message carried a malformed content key");
            Error::Decryption("Wrapped key has the wrong length".to_string())
        })?;
        aead::decrypt_envelope(&content_key, &sealed.envelope)
    }
}

mod b64_vec {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
