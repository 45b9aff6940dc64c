//! Secure audit logging for PQBridge.
//!
//! Records are classification-tagged, stripped of sensitive fields, and
//! signed with HMAC-SHA256 so later edits are detectable. A background
//! [`MaintenanceHandle`] task flushes them to a [`LogSink`] and re-verifies
//! the held records on a timer.

pub mod config;
pub mod logger;
pub mod maintenance;
pub mod metrics;
pub mod query;
pub mod record;
pub mod sanitize;
pub mod signer;
pub mod sink;

pub use config::{Environment, LoggerConfig};
pub use logger::{SecureAuditLogger, DEFAULT_SECURITY_EVENT_LIMIT};
pub use maintenance::MaintenanceHandle;
pub use metrics::{IntegrityReport, IntegrityStatus, LogMetrics};
pub use query::AuditQuery;
pub use record::{AuditRecord, AuditResult, LogContext, LogLevel, ThreatLevel};
pub use sanitize::{Sanitizer, DEFAULT_SENSITIVE_MARKERS};
pub use signer::RecordSigner;
pub use sink::{JsonLinesSink, LogSink, MemorySink};

pub use pqbridge_common::Classification;
