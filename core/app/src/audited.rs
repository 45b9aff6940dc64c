//! Crypto operations that audit their own outcome.
//!
//! Only lengths and error kinds reach the trail. Plaintext, keys and
//! signatures never do.

use serde_json::json;
use std::sync::Arc;

use pqbridge_audit::{AuditResult, LogContext, SecureAuditLogger, ThreatLevel};
use pqbridge_common::{Error, Result};
use pqbridge_crypto::{
    ClassicalProvider, CryptoBridge, CryptoProvider, EncryptedEnvelope, Signature, SigningKeyPair,
    SymmetricKey,
};

const COMPONENT: &str = "crypto";

/// Wraps the bridge so every call leaves a `security` record.
pub struct AuditedCrypto<P: CryptoProvider = ClassicalProvider> {
    crypto: Arc<CryptoBridge<P>>,
    audit: Arc<SecureAuditLogger>,
    session_id: Option<String>,
}

impl<P: CryptoProvider> AuditedCrypto<P> {
    pub fn new(crypto: Arc<CryptoBridge<P>>, audit: Arc<SecureAuditLogger>) -> Self {
        Self {
            crypto,
            audit,
            session_id: None,
        }
    }

    /// Attach a session id; only its hash is recorded.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn bridge(&self) -> &CryptoBridge<P> {
        &self.crypto
    }

    pub fn logger(&self) -> &SecureAuditLogger {
        &self.audit
    }

    fn context(&self, operation: &str) -> LogContext {
        let ctx = LogContext::new(COMPONENT, operation);
        match &self.session_id {
            Some(session) => ctx.session_id(session.clone()),
            None => ctx,
        }
    }

    fn record_failure(&self, operation: &str, error: &Error) {
        let threat = match error {
            Error::AuthenticationFailure => ThreatLevel::High,
            _ => ThreatLevel::ELEVATED,
        };
        self.audit.log_security_event(
            operation,
            AuditResult::Failure,
            &self.context(operation).threat_level(threat),
            Some(json!({ "error": error.to_string() })),
        );
    }

    /// Encrypt a message body under `key`.
    pub async fn encrypt_message(&self, plaintext: &[u8], key: &SymmetricKey) -> Result<EncryptedEnvelope> {
        const OP: &str = "encrypt_message";
        match self.crypto.encrypt_symmetric(plaintext, key).await {
            Ok(envelope) => {
                self.audit.log_security_event(
                    OP,
                    AuditResult::Success,
                    &self.context(OP).threat_level(ThreatLevel::Low),
                    Some(json!({ "plaintext_len": plaintext.len() })),
                );
                Ok(envelope)
            }
            Err(e) => {
                self.record_failure(OP, &e);
                Err(e)
            }
        }
    }

    /// Decrypt a message body. Authentication failures are recorded as high threat.
    pub async fn decrypt_message(&self, envelope: &EncryptedEnvelope, key: &SymmetricKey) -> Result<Vec<u8>> {
        const OP: &str = "decrypt_message";
        let result = self
            .crypto
            .decrypt_symmetric(&envelope.ciphertext, key, &envelope.iv, &envelope.tag)
            .await;
        match result {
            Ok(plaintext) => {
                self.audit.log_security_event(
                    OP,
                    AuditResult::Success,
                    &self.context(OP).threat_level(ThreatLevel::Low),
                    Some(json!({ "ciphertext_len": envelope.ciphertext.len() })),
                );
                Ok(plaintext)
            }
            Err(e) => {
                self.record_failure(OP, &e);
                Err(e)
            }
        }
    }

    /// Sign `data` with a signing key pair.
    pub async fn sign_message(&self, data: &[u8], key_pair: &SigningKeyPair<P>) -> Result<Signature> {
        const OP: &str = "sign_message";
        match self.crypto.sign_with(data, key_pair).await {
            Ok(signature) => {
                self.audit.log_security_event(
                    OP,
                    AuditResult::Success,
                    &self.context(OP).threat_level(ThreatLevel::Low),
                    Some(json!({ "data_len": data.len() })),
                );
                Ok(signature)
            }
            Err(e) => {
                self.record_failure(OP, &e);
                Err(e)
            }
        }
    }

    /// Verify a signature against an exported public key.
    ///
    /// A rejected signature is recorded as `BLOCKED` with high threat.
    pub async fn verify_message(&self, signature: &[u8], data: &[u8], public_key: &[u8]) -> bool {
        const OP: &str = "verify_message";
        let valid = self.crypto.verify(signature, data, public_key).await;
        let (result, threat) = if valid {
            (AuditResult::Success, ThreatLevel::Low)
        } else {
            (AuditResult::Blocked, ThreatLevel::High)
        };
        self.audit.log_security_event(
            OP,
            result,
            &self.context(OP).threat_level(threat),
            Some(json!({ "data_len": data.len() })),
        );
        valid
    }
}
