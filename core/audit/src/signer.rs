//! Tamper-evidence for audit records.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::record::AuditRecord;
use pqbridge_common::Result;
use pqbridge_crypto::{constant_time_eq, hmac_sha256};

/// Signs records with HMAC-SHA256 under a per-logger key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RecordSigner {
    key: [u8; 32],
}

impl RecordSigner {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Hex signature over everything in `record` except its signature.
    pub fn sign(&self, record: &AuditRecord) -> Result<String> {
        let bytes = record.signing_bytes()?;
        Ok(hex::encode(hmac_sha256(&self.key, &bytes)?))
    }

    /// Whether `record.signature` matches its content.
    pub fn verify(&self, record: &AuditRecord) -> bool {
        let Ok(expected) = self.sign(record) else {
            return false;
        };
        constant_time_eq(expected.as_bytes(), record.signature.as_bytes())
    }
}
