//! Process-wide security services.

use std::sync::Arc;
use tracing::info;

use crate::audited::AuditedCrypto;
use pqbridge_audit::{LogSink, LoggerConfig, MaintenanceHandle, SecureAuditLogger};
use pqbridge_common::Result;
use pqbridge_crypto::{ClassicalProvider, CryptoBridge, CryptoProvider, RsaParams};

/// The crypto bridge and audit logger, built once at startup and passed down.
pub struct SecurityServices<P: CryptoProvider = ClassicalProvider> {
    pub crypto: Arc<CryptoBridge<P>>,
    pub audit: Arc<SecureAuditLogger>,
}

impl<P: CryptoProvider> Clone for SecurityServices<P> {
    fn clone(&self) -> Self {
        Self {
            crypto: Arc::clone(&self.crypto),
            audit: Arc::clone(&self.audit),
        }
    }
}

impl<P: CryptoProvider> SecurityServices<P> {
    pub fn new(crypto: CryptoBridge<P>, audit: SecureAuditLogger) -> Self {
        Self {
            crypto: Arc::new(crypto),
            audit: Arc::new(audit),
        }
    }

    /// Crypto operations that record their own outcome.
    pub fn audited(&self) -> AuditedCrypto<P> {
        AuditedCrypto::new(Arc::clone(&self.crypto), Arc::clone(&self.audit))
    }
}

impl SecurityServices<ClassicalProvider> {
    /// Classical bridge with an in-memory logger. No background task.
    pub fn classical(config: LoggerConfig) -> Result<Self> {
        Ok(Self::new(CryptoBridge::classical()?, SecureAuditLogger::new(config)?))
    }

    /// Classical bridge with a logger whose maintenance task is running.
    ///
    /// Must be called from within a tokio runtime. Keep the handle and call
    /// [`MaintenanceHandle::shutdown`] before exit to flush the trail.
    pub fn start(
        params: RsaParams,
        config: LoggerConfig,
        sink: Option<Arc<dyn LogSink>>,
    ) -> Result<(Self, MaintenanceHandle)> {
        let crypto = Arc::new(CryptoBridge::with_params(params)?);
        let (audit, handle) = SecureAuditLogger::start(config, sink)?;

        info!(
            version = crypto.version(),
            environment = ?audit.config().environment,
            "Security services started"
        );

        Ok((Self { crypto, audit }, handle))
    }
}
