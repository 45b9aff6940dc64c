//! Audit record structure and logging context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use pqbridge_common::Classification;

/// Severity of a log entry, ordered from least to most important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Audit,
    Security,
}

impl LogLevel {
    /// Levels kept even in production deployments.
    pub fn always_logged(&self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Audit | LogLevel::Security)
    }

    /// Whether this level belongs to the security trail.
    pub fn is_security_trail(&self) -> bool {
        matches!(self, LogLevel::Audit | LogLevel::Security)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Audit => "audit",
            LogLevel::Security => "security",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the operation being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditResult {
    Success,
    Failure,
    Pending,
    Blocked,
}

/// Assessed threat associated with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Default for security events.
    pub const ELEVATED: ThreatLevel = ThreatLevel::Medium;
}

/// Signed, sanitized audit record.
///
/// Records are never edited after creation. `signature` covers every other
/// field; any later change is caught by integrity verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    /// Position in the logger's total order of accepted records.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub component: String,
    pub operation: String,
    pub classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id_hash: Option<String>,
    pub result: AuditResult,
    pub threat_level: ThreatLevel,
    /// Sanitized caller data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Set when the caller data could not be sanitized and was dropped.
    pub degraded: bool,
    /// Hex HMAC-SHA256 over [`AuditRecord::signing_bytes`].
    pub signature: String,
}

/// Every field except the signature, in a fixed order.
#[derive(Serialize)]
struct SignedFields<'a> {
    id: &'a Uuid,
    sequence: u64,
    timestamp: &'a DateTime<Utc>,
    level: LogLevel,
    message: &'a str,
    component: &'a str,
    operation: &'a str,
    classification: Classification,
    user_id_hash: &'a Option<String>,
    session_id_hash: &'a Option<String>,
    result: AuditResult,
    threat_level: ThreatLevel,
    metadata: &'a Option<serde_json::Value>,
    degraded: bool,
}

impl AuditRecord {
    /// Canonical bytes covered by the signature.
    pub fn signing_bytes(&self) -> pqbridge_common::Result<Vec<u8>> {
        let fields = SignedFields {
            id: &self.id,
            sequence: self.sequence,
            timestamp: &self.timestamp,
            level: self.level,
            message: &self.message,
            component: &self.component,
            operation: &self.operation,
            classification: self.classification,
            user_id_hash: &self.user_id_hash,
            session_id_hash: &self.session_id_hash,
            result: self.result,
            threat_level: self.threat_level,
            metadata: &self.metadata,
            degraded: self.degraded,
        };
        Ok(serde_json::to_vec(&fields)?)
    }
}

/// Who is logging, about what, and under which classification.
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    pub component: String,
    pub operation: String,
    /// Defaults to CONFIDENTIAL when unset.
    pub classification: Option<Classification>,
    /// Raw identifier; only its hash is stored.
    pub user_id: Option<String>,
    /// Raw identifier; only its hash is stored.
    pub session_id: Option<String>,
    pub result: Option<AuditResult>,
    pub threat_level: Option<ThreatLevel>,
}

impl LogContext {
    /// Create a context for `component` performing `operation`.
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn result(mut self, result: AuditResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn threat_level(mut self, threat_level: ThreatLevel) -> Self {
        self.threat_level = Some(threat_level);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Audit < LogLevel::Security);
    }

    #[test]
    fn test_always_logged_levels() {
        assert!(LogLevel::Security.always_logged());
        assert!(LogLevel::Audit.always_logged());
        assert!(LogLevel::Error.always_logged());
        assert!(!LogLevel::Warn.always_logged());
        assert!(!LogLevel::Debug.always_logged());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&AuditResult::Blocked).unwrap(), "\"BLOCKED\"");
        assert_eq!(serde_json::to_string(&LogLevel::Security).unwrap(), "\"security\"");
        assert_eq!(serde_json::to_string(&ThreatLevel::High).unwrap(), "\"high\"");
    }

    #[test]
    fn test_context_builder() {
        let ctx = LogContext::new("auth", "login")
            .classification(Classification::Secret)
            .user_id("alice")
            .result(AuditResult::Failure);

        assert_eq!(ctx.component, "auth");
        assert_eq!(ctx.operation, "login");
        assert_eq!(ctx.classification, Some(Classification::Secret));
        assert_eq!(ctx.user_id.as_deref(), Some("alice"));
        assert_eq!(ctx.result, Some(AuditResult::Failure));
        assert!(ctx.session_id.is_none());
    }
}
