//! Tamper-evident, privacy-preserving audit logger.
//!
//! Every accepted entry becomes an [`AuditRecord`] that is sanitized, signed,
//! and appended to a bounded in-memory buffer. Logging never fails from the
//! caller's point of view; problems are folded into degraded records and
//! counters instead.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::io;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::LoggerConfig;
use crate::maintenance::MaintenanceHandle;
use crate::metrics::{Counters, IntegrityReport, IntegrityStatus, LogMetrics};
use crate::query::AuditQuery;
use crate::record::{AuditRecord, AuditResult, LogContext, LogLevel, ThreatLevel};
use crate::sanitize::Sanitizer;
use crate::signer::RecordSigner;
use crate::sink::LogSink;
use pqbridge_common::{Classification, Error, Result};
use pqbridge_crypto::SymmetricKey;

/// Default number of records returned by [`SecureAuditLogger::get_security_events`].
pub const DEFAULT_SECURITY_EVENT_LIMIT: usize = 100;

#[derive(Default)]
struct Buffer {
    /// Held records, oldest first.
    records: VecDeque<AuditRecord>,
    /// Records not yet written to the sink, oldest first.
    pending: VecDeque<AuditRecord>,
    last_check: Option<IntegrityReport>,
    /// Compromised ids already escalated by the previous check.
    reported: HashSet<Uuid>,
}

/// Audit logger shared across the application.
///
/// Construct once and pass it down as `Arc<SecureAuditLogger>`.
pub struct SecureAuditLogger {
    config: LoggerConfig,
    sanitizer: Sanitizer,
    signer: RecordSigner,
    sink: Option<Arc<dyn LogSink>>,
    buffer: Mutex<Buffer>,
    next_sequence: AtomicU64,
    counters: Counters,
    flush_lock: tokio::sync::Mutex<()>,
}

impl SecureAuditLogger {
    /// Create a logger that keeps records in memory only.
    ///
    /// # Errors
    /// - `Config` if the configuration is invalid
    pub fn new(config: LoggerConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a logger that flushes to `sink`.
    pub fn with_sink(config: LoggerConfig, sink: Arc<dyn LogSink>) -> Result<Self> {
        Self::build(config, Some(sink))
    }

    fn build(config: LoggerConfig, sink: Option<Arc<dyn LogSink>>) -> Result<Self> {
        config.validate()?;

        let hash_key = SymmetricKey::generate();
        let signing_key = SymmetricKey::generate();
        let sanitizer = Sanitizer::new(*hash_key.as_bytes(), config.max_depth, &config.sensitive_markers);

        Ok(Self {
            sanitizer,
            signer: RecordSigner::new(*signing_key.as_bytes()),
            sink,
            buffer: Mutex::new(Buffer::default()),
            next_sequence: AtomicU64::new(1),
            counters: Counters::default(),
            flush_lock: tokio::sync::Mutex::new(()),
            config,
        })
    }

    /// Replace the random per-logger signing key.
    ///
    /// Use before the first record is logged; records signed under the old
    /// key would fail verification afterwards.
    pub fn with_signing_key(mut self, key: [u8; 32]) -> Self {
        self.signer = RecordSigner::new(key);
        self
    }

    /// Create a logger and start its maintenance task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: LoggerConfig,
        sink: Option<Arc<dyn LogSink>>,
    ) -> Result<(Arc<Self>, MaintenanceHandle)> {
        let logger = Arc::new(Self::build(config, sink)?);
        let handle = logger.spawn_maintenance();
        Ok((logger, handle))
    }

    /// Spawn the periodic flush and integrity task for this logger.
    pub fn spawn_maintenance(self: &Arc<Self>) -> MaintenanceHandle {
        MaintenanceHandle::spawn(
            Arc::downgrade(self),
            self.config.flush_interval(),
            self.config.integrity_check_interval(),
        )
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Production keeps only always-logged levels and top secret entries.
    /// Counts the entry as skipped when it is filtered out.
    fn skipped(&self, level: LogLevel, classification: Classification) -> bool {
        let skip = self.config.is_production()
            && !level.always_logged()
            && classification != Classification::TopSecret;
        if skip {
            self.counters.record_skipped();
        }
        skip
    }

    /// Record an event.
    ///
    /// Never blocks on I/O and never fails. Data that cannot be sanitized
    /// is dropped and the record is marked degraded.
    pub fn log(&self, level: LogLevel, message: &str, data: Option<Value>, context: &LogContext) {
        let classification = context.classification.unwrap_or_default();
        if self.skipped(level, classification) {
            return;
        }

        let (metadata, degraded) = match data.map(|d| self.sanitizer.sanitize(&d)).transpose() {
            Ok(metadata) => (metadata, false),
            Err(e) => {
                warn!(
                    component = %context.component,
                    operation = %context.operation,
                    "Audit data dropped: {}",
                    e
                );
                (None, true)
            }
        };

        self.append(level, message, context, classification, metadata, degraded);
    }

    /// Record an event whose data is any serializable value.
    pub fn log_serializable<T: Serialize + ?Sized>(
        &self,
        level: LogLevel,
        message: &str,
        data: &T,
        context: &LogContext,
    ) {
        match serde_json::to_value(data) {
            Ok(value) => self.log(level, message, Some(value), context),
            Err(e) => {
                let classification = context.classification.unwrap_or_default();
                if self.skipped(level, classification) {
                    return;
                }
                warn!(
                    component = %context.component,
                    "Audit data not serializable: {}",
                    e
                );
                self.append(level, message, context, classification, None, true);
            }
        }
    }

    /// Record a security event.
    ///
    /// Defaults to SECRET classification and elevated threat unless the
    /// context says otherwise.
    pub fn log_security_event(
        &self,
        event: &str,
        result: AuditResult,
        context: &LogContext,
        metadata: Option<Value>,
    ) {
        let mut ctx = context.clone();
        ctx.result = Some(result);
        ctx.classification.get_or_insert(Classification::Secret);
        ctx.threat_level.get_or_insert(ThreatLevel::ELEVATED);
        if ctx.operation.is_empty() {
            ctx.operation = event.to_string();
        }
        self.log(LogLevel::Security, event, metadata, &ctx);
    }

    /// Record a user action for the compliance trail. Always SECRET.
    pub fn log_audit_event(
        &self,
        action: &str,
        user_id: &str,
        result: AuditResult,
        context: &LogContext,
        metadata: Option<Value>,
    ) {
        let mut ctx = context.clone();
        ctx.operation = action.to_string();
        ctx.user_id = Some(user_id.to_string());
        ctx.result = Some(result);
        ctx.classification = Some(Classification::Secret);
        self.log(LogLevel::Audit, action, metadata, &ctx);
    }

    fn append(
        &self,
        level: LogLevel,
        message: &str,
        context: &LogContext,
        classification: Classification,
        metadata: Option<Value>,
        degraded: bool,
    ) {
        let mut record = AuditRecord {
            id: Uuid::new_v4(),
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            component: context.component.clone(),
            operation: context.operation.clone(),
            classification,
            user_id_hash: self.hash_identifier(context.user_id.as_deref()),
            session_id_hash: self.hash_identifier(context.session_id.as_deref()),
            result: context.result.unwrap_or(AuditResult::Success),
            threat_level: context.threat_level.unwrap_or(ThreatLevel::Low),
            metadata,
            degraded,
            signature: String::new(),
        };

        record.signature = match self.signer.sign(&record) {
            Ok(signature) => signature,
            Err(e) => {
                error!(sequence = record.sequence, "Audit record could not be signed: {}", e);
                return;
            }
        };

        if self.config.mirror_to_tracing && !self.config.is_production() {
            mirror(&record);
        }

        self.counters.record_accepted(level, degraded);

        let max = self.config.max_records;
        let mut buffer = self.buffer.lock();
        if self.sink.is_some() {
            buffer.pending.push_back(record.clone());
            while buffer.pending.len() > max {
                buffer.pending.pop_front();
            }
        }
        buffer.records.push_back(record);
        let mut evicted = 0;
        while buffer.records.len() > max {
            buffer.records.pop_front();
            evicted += 1;
        }
        drop(buffer);

        if evicted > 0 {
            self.counters.record_evicted(evicted);
        }
    }

    fn hash_identifier(&self, id: Option<&str>) -> Option<String> {
        id.and_then(|id| self.sanitizer.hash_identifier(id).ok())
    }

    /// Counters plus a fresh integrity check of every held record.
    pub fn get_metrics(&self) -> LogMetrics {
        let report = self.check_integrity();
        let buffered = self.buffer.lock().records.len();
        self.counters
            .snapshot(buffered, report.status, Some(report.checked_at))
    }

    /// Most recent `security`/`audit` records, newest first.
    pub fn get_security_events(&self, limit: usize) -> Vec<AuditRecord> {
        let buffer = self.buffer.lock();
        buffer
            .records
            .iter()
            .rev()
            .filter(|r| r.level.is_security_trail())
            .take(limit)
            .cloned()
            .collect()
    }

    /// All held records, oldest first, optionally limited to one classification.
    pub fn export_logs(&self, classification: Option<Classification>) -> Vec<AuditRecord> {
        let buffer = self.buffer.lock();
        buffer
            .records
            .iter()
            .filter(|r| classification.map_or(true, |c| r.classification == c))
            .cloned()
            .collect()
    }

    /// Held records matching `query`, newest first.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditRecord> {
        let buffer = self.buffer.lock();
        query.apply(buffer.records.iter())
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.buffer.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().records.is_empty()
    }

    /// Wipe every held record.
    ///
    /// Irreversible. A security record noting the wipe is logged right
    /// after, so the buffer then holds exactly that record. Records still
    /// queued for the sink are kept so the external trail stays complete.
    pub fn clear_logs(&self, reason: &str) {
        let cleared = {
            let mut buffer = self.buffer.lock();
            let cleared = buffer.records.len();
            buffer.records.clear();
            buffer.last_check = None;
            cleared
        };

        warn!(cleared, "Audit log cleared: {}", reason);

        self.log_security_event(
            "audit log cleared",
            AuditResult::Success,
            &LogContext::new("audit", "clear_logs").threat_level(ThreatLevel::High),
            Some(serde_json::json!({ "reason": reason, "cleared_records": cleared })),
        );
    }

    /// Write queued records to the sink.
    ///
    /// Returns the number of records written. On failure the batch is put
    /// back at the front of the queue for the next attempt. A write that
    /// outlasts `flush_timeout_secs` is abandoned and treated as failed.
    ///
    /// # Errors
    /// - `Io` with `TimedOut` if the sink did not answer in time
    /// - whatever the sink reports
    pub async fn flush_now(&self) -> Result<usize> {
        let Some(sink) = &self.sink else {
            return Ok(0);
        };

        let _guard = self.flush_lock.lock().await;
        let batch: Vec<AuditRecord> = self.buffer.lock().pending.drain(..).collect();
        if batch.is_empty() {
            return Ok(0);
        }

        let written = match timeout(self.config.flush_timeout(), sink.write_batch(&batch)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{} sink did not answer within {:?}", sink.name(), self.config.flush_timeout()),
            ))),
        };

        match written {
            Ok(()) => {
                debug!(sink = sink.name(), "Flushed {} audit records", batch.len());
                Ok(batch.len())
            }
            Err(e) => {
                warn!(sink = sink.name(), "Audit flush failed, {} records requeued: {}", batch.len(), e);
                self.counters.record_flush_failure();

                let mut buffer = self.buffer.lock();
                for record in batch.into_iter().rev() {
                    buffer.pending.push_front(record);
                }
                while buffer.pending.len() > self.config.max_records {
                    buffer.pending.pop_front();
                }
                Err(e)
            }
        }
    }

    /// Records waiting to be flushed.
    pub fn pending_flush(&self) -> usize {
        self.buffer.lock().pending.len()
    }

    /// Re-verify every held record and escalate any mismatch.
    ///
    /// Mismatches are never repaired. Each compromised record adds to the
    /// `integrity_violations` metric once, on the first pass that sees it.
    pub fn verify_integrity(&self) -> IntegrityReport {
        let report = self.check_integrity();
        let fresh = {
            let mut buffer = self.buffer.lock();
            let fresh = report
                .compromised_ids
                .iter()
                .filter(|id| !buffer.reported.contains(id))
                .count();
            buffer.reported = report.compromised_ids.iter().copied().collect();
            fresh
        };
        self.counters.record_integrity_violations(fresh);

        if !report.is_intact() {
            error!(
                compromised = report.compromised_ids.len(),
                new = fresh,
                checked = report.checked,
                "Audit log integrity violation: {:?}",
                report.compromised_ids
            );
        } else {
            debug!(checked = report.checked, "Audit log integrity intact");
        }
        report
    }

    fn check_integrity(&self) -> IntegrityReport {
        // Verify a snapshot so log() is not held up by the HMAC pass.
        let snapshot: Vec<AuditRecord> = self.buffer.lock().records.iter().cloned().collect();

        let compromised_ids: Vec<Uuid> = snapshot
            .iter()
            .filter(|r| !self.signer.verify(r))
            .map(|r| r.id)
            .collect();

        let report = IntegrityReport {
            status: if compromised_ids.is_empty() {
                IntegrityStatus::Intact
            } else {
                IntegrityStatus::Compromised
            },
            checked: snapshot.len(),
            compromised_ids,
            checked_at: Utc::now(),
        };

        self.buffer.lock().last_check = Some(report.clone());
        report
    }

    /// Result of the most recent integrity check, if any.
    pub fn last_integrity_report(&self) -> Option<IntegrityReport> {
        self.buffer.lock().last_check.clone()
    }

    #[cfg(test)]
    pub(crate) fn tamper_with(&self, index: usize, f: impl FnOnce(&mut AuditRecord)) {
        if let Some(record) = self.buffer.lock().records.get_mut(index) {
            f(record);
        }
    }
}

fn mirror(record: &AuditRecord) {
    macro_rules! emit {
        ($macro:ident) => {
            tracing::$macro!(
                target: "pqbridge_audit",
                sequence = record.sequence,
                component = %record.component,
                operation = %record.operation,
                classification = %record.classification,
                result = ?record.result,
                degraded = record.degraded,
                "{}",
                record.message
            )
        };
    }

    match record.level {
        LogLevel::Debug => emit!(debug),
        LogLevel::Info | LogLevel::Audit => emit!(info),
        LogLevel::Warn | LogLevel::Security => emit!(warn),
        LogLevel::Error => emit!(error),
    }
}

impl std::fmt::Debug for SecureAuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureAuditLogger")
            .field("config", &self.config)
            .field("sink", &self.sink.as_ref().map(|s| s.name()))
            .field("buffered", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicBool;

    fn logger() -> SecureAuditLogger {
        SecureAuditLogger::new(LoggerConfig {
            mirror_to_tracing: false,
            ..LoggerConfig::default()
        })
        .unwrap()
    }

    fn ctx() -> LogContext {
        LogContext::new("test", "op")
    }

    #[test]
    fn test_sanitizes_password_keeps_user() {
        let logger = logger();
        logger.log(
            LogLevel::Info,
            "login attempt",
            Some(json!({ "password": "secret123", "user": "alice" })),
            &ctx(),
        );

        let records = logger.export_logs(None);
        assert_eq!(records.len(), 1);
        let metadata = records[0].metadata.as_ref().unwrap();
        let password = metadata["password"].as_str().unwrap();
        assert_ne!(password, "secret123");
        assert!(!password.is_empty());
        assert_eq!(metadata["user"], "alice");
    }

    #[test]
    fn test_default_classification_confidential() {
        let logger = logger();
        logger.log(LogLevel::Info, "x", None, &ctx());
        assert_eq!(logger.export_logs(None)[0].classification, Classification::Confidential);
    }

    #[test]
    fn test_identifiers_hashed() {
        let logger = logger();
        logger.log(LogLevel::Info, "x", None, &ctx().user_id("alice").session_id("s-1"));

        let record = &logger.export_logs(None)[0];
        let user = record.user_id_hash.as_deref().unwrap();
        assert_ne!(user, "alice");
        assert_eq!(user.len(), 64);
        assert_ne!(record.session_id_hash.as_deref(), Some("s-1"));
    }

    #[test]
    fn test_integrity_intact_then_compromised() {
        let logger = logger();
        for i in 0..5 {
            logger.log(LogLevel::Info, &format!("event {}", i), Some(json!({ "i": i })), &ctx());
        }
        assert_eq!(logger.get_metrics().integrity_status, IntegrityStatus::Intact);

        logger.tamper_with(2, |r| r.component = "forged".to_string());

        let metrics = logger.get_metrics();
        assert_eq!(metrics.integrity_status, IntegrityStatus::Compromised);
        assert_eq!(metrics.integrity_violations, 0);

        let report = logger.verify_integrity();
        assert_eq!(report.checked, 5);
        assert_eq!(report.compromised_ids.len(), 1);
        assert_eq!(logger.get_metrics().integrity_violations, 1);

        // Never repaired, and not counted twice.
        assert!(!logger.verify_integrity().is_intact());
        assert_eq!(logger.get_metrics().integrity_violations, 1);

        logger.tamper_with(4, |r| r.message = "forged".to_string());
        assert_eq!(logger.verify_integrity().compromised_ids.len(), 2);
        assert_eq!(logger.get_metrics().integrity_violations, 2);
    }

    #[test]
    fn test_export_filters_by_classification() {
        let logger = logger();
        logger.log(LogLevel::Info, "a", None, &ctx().classification(Classification::Public));
        logger.log(LogLevel::Info, "b", None, &ctx().classification(Classification::Secret));
        logger.log_security_event("c", AuditResult::Success, &ctx(), None);
        logger.log(LogLevel::Info, "d", None, &ctx());

        let secret = logger.export_logs(Some(Classification::Secret));
        assert_eq!(secret.len(), 2);
        assert!(secret.iter().all(|r| r.classification == Classification::Secret));
        assert_eq!(logger.export_logs(None).len(), 4);
    }

    #[test]
    fn test_security_event_defaults() {
        let logger = logger();
        logger.log_security_event("key rotated", AuditResult::Success, &LogContext::new("keys", ""), None);

        let record = &logger.export_logs(None)[0];
        assert_eq!(record.level, LogLevel::Security);
        assert_eq!(record.classification, Classification::Secret);
        assert_eq!(record.threat_level, ThreatLevel::Medium);
        assert_eq!(record.operation, "key rotated");

        let top = ctx()
            .classification(Classification::TopSecret)
            .threat_level(ThreatLevel::Critical);
        logger.log_security_event("breach", AuditResult::Blocked, &top, None);
        let record = &logger.get_security_events(1)[0];
        assert_eq!(record.classification, Classification::TopSecret);
        assert_eq!(record.threat_level, ThreatLevel::Critical);
        assert_eq!(record.result, AuditResult::Blocked);
    }

    #[test]
    fn test_audit_event_forces_secret() {
        let logger = logger();
        logger.log_audit_event(
            "export",
            "bob",
            AuditResult::Failure,
            &ctx().classification(Classification::Public),
            Some(json!({ "sessionToken": "t" })),
        );

        let record = &logger.export_logs(None)[0];
        assert_eq!(record.level, LogLevel::Audit);
        assert_eq!(record.classification, Classification::Secret);
        assert_eq!(record.operation, "export");
        assert!(record.user_id_hash.is_some());
        assert_ne!(record.metadata.as_ref().unwrap()["sessionToken"], "t");
    }

    #[test]
    fn test_security_events_newest_first() {
        let logger = logger();
        logger.log(LogLevel::Info, "noise", None, &ctx());
        logger.log_security_event("first", AuditResult::Success, &ctx(), None);
        logger.log_audit_event("second", "u", AuditResult::Success, &ctx(), None);
        logger.log(LogLevel::Error, "more noise", None, &ctx());

        let events = logger.get_security_events(DEFAULT_SECURITY_EVENT_LIMIT);
        let messages: Vec<&str> = events.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "first"]);
        assert_eq!(logger.get_security_events(1).len(), 1);
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let logger = SecureAuditLogger::new(LoggerConfig {
            max_records: 3,
            mirror_to_tracing: false,
            ..LoggerConfig::default()
        })
        .unwrap();

        for i in 0..5 {
            logger.log(LogLevel::Info, &format!("{}", i), None, &ctx());
        }

        let messages: Vec<String> = logger.export_logs(None).into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["2", "3", "4"]);

        let metrics = logger.get_metrics();
        assert_eq!(metrics.total_logs, 5);
        assert_eq!(metrics.evicted_count, 2);
        assert_eq!(metrics.buffered, 3);
    }

    #[test]
    fn test_production_filter() {
        let logger = SecureAuditLogger::new(LoggerConfig::production()).unwrap();

        logger.log(LogLevel::Debug, "dropped", None, &ctx());
        logger.log(LogLevel::Info, "dropped", None, &ctx());
        logger.log(LogLevel::Warn, "dropped", None, &ctx());
        logger.log(LogLevel::Error, "kept", None, &ctx());
        logger.log(LogLevel::Audit, "kept", None, &ctx());
        logger.log_security_event("kept", AuditResult::Success, &ctx(), None);
        logger.log(LogLevel::Info, "kept", None, &ctx().classification(Classification::TopSecret));
        logger.log_serializable(LogLevel::Info, "dropped", &json!({ "a": 1 }), &ctx());
        logger.log_serializable(LogLevel::Info, "dropped", &NotSerializable, &ctx());
        logger.log_serializable(LogLevel::Error, "kept", &NotSerializable, &ctx());

        let records = logger.export_logs(None);
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.message == "kept"));
        assert_eq!(logger.get_metrics().skipped_count, 5);
    }

    #[test]
    fn test_too_deep_data_degrades() {
        let logger = SecureAuditLogger::new(LoggerConfig {
            max_depth: 1,
            mirror_to_tracing: false,
            ..LoggerConfig::default()
        })
        .unwrap();

        logger.log(LogLevel::Warn, "deep", Some(json!({ "a": { "b": { "c": 1 } } })), &ctx());

        let record = &logger.export_logs(None)[0];
        assert!(record.degraded);
        assert!(record.metadata.is_none());
        assert_eq!(record.message, "deep");
        assert_eq!(logger.get_metrics().degraded_count, 1);
        assert!(logger.verify_integrity().is_intact());
    }

    struct NotSerializable;

    impl Serialize for NotSerializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refused"))
        }
    }

    #[test]
    fn test_log_serializable() {
        #[derive(Serialize)]
        struct Login<'a> {
            user: &'a str,
            api_key: &'a str,
        }

        let logger = logger();
        logger.log_serializable(
            LogLevel::Info,
            "login",
            &Login {
                user: "carol",
                api_key: "k-123",
            },
            &ctx(),
        );
        logger.log_serializable(LogLevel::Info, "broken", &NotSerializable, &ctx());

        let records = logger.export_logs(None);
        let metadata = records[0].metadata.as_ref().unwrap();
        assert_eq!(metadata["user"], "carol");
        assert_ne!(metadata["api_key"], "k-123");
        assert!(records[1].degraded);
    }

    #[test]
    fn test_clear_logs_leaves_one_security_record() {
        let logger = logger();
        for _ in 0..4 {
            logger.log(LogLevel::Info, "x", None, &ctx());
        }

        logger.clear_logs("incident response");

        let records = logger.export_logs(None);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::Security);
        assert_eq!(records[0].message, "audit log cleared");
        assert_eq!(records[0].metadata.as_ref().unwrap()["cleared_records"], 4);
        assert_eq!(logger.get_metrics().total_logs, 5);
    }

    #[test]
    fn test_concurrent_log() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 50;

        let logger = Arc::new(logger());
        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let logger = Arc::clone(&logger);
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        logger.log(LogLevel::Info, &format!("{}-{}", t, i), Some(json!({ "i": i })), &ctx());
                    }
                });
            }
        });

        let records = logger.export_logs(None);
        assert_eq!(records.len(), THREADS * PER_THREAD);

        let sequences: HashSet<u64> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences.len(), THREADS * PER_THREAD);
        assert!(sequences.iter().all(|s| (1..=(THREADS * PER_THREAD) as u64).contains(s)));

        assert_eq!(logger.get_metrics().total_logs, (THREADS * PER_THREAD) as u64);
        assert!(logger.verify_integrity().is_intact());
    }

    #[test]
    fn test_sequence_increases() {
        let logger = logger();
        for _ in 0..3 {
            logger.log(LogLevel::Info, "x", None, &ctx());
        }
        let seqs: Vec<u64> = logger.export_logs(None).iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_injected_signing_key() {
        let logger = logger().with_signing_key([9u8; 32]);
        logger.log(LogLevel::Info, "x", None, &ctx());

        let record = &logger.export_logs(None)[0];
        assert!(RecordSigner::new([9u8; 32]).verify(record));
    }

    #[test]
    fn test_query() {
        let logger = logger();
        logger.log(LogLevel::Info, "a", None, &LogContext::new("crypto", "encrypt"));
        logger.log(LogLevel::Error, "b", None, &LogContext::new("crypto", "decrypt").result(AuditResult::Failure));
        logger.log(LogLevel::Error, "c", None, &LogContext::new("auth", "login"));

        let failures = logger.query(&AuditQuery::new().component("crypto").result(AuditResult::Failure));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message, "b");

        let errors = logger.query(&AuditQuery::new().min_level(LogLevel::Error));
        let messages: Vec<&str> = errors.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["c", "b"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = SecureAuditLogger::new(LoggerConfig {
            max_records: 0,
            ..LoggerConfig::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_flush_to_memory_sink() {
        let sink = Arc::new(MemorySink::new());
        let logger = SecureAuditLogger::with_sink(LoggerConfig::default(), sink.clone()).unwrap();

        logger.log(LogLevel::Info, "a", None, &ctx());
        logger.log(LogLevel::Info, "b", None, &ctx());
        assert_eq!(logger.pending_flush(), 2);

        assert_eq!(logger.flush_now().await.unwrap(), 2);
        assert_eq!(logger.pending_flush(), 0);
        assert_eq!(sink.len(), 2);
        // Flushing does not drop held records.
        assert_eq!(logger.len(), 2);

        assert_eq!(logger.flush_now().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_flush_without_sink_is_noop() {
        let logger = logger();
        logger.log(LogLevel::Info, "a", None, &ctx());
        assert_eq!(logger.flush_now().await.unwrap(), 0);
        assert_eq!(logger.pending_flush(), 0);
    }

    /// Fails until switched on, then records like a memory sink.
    #[derive(Default)]
    struct FlakySink {
        healthy: AtomicBool,
        inner: MemorySink,
    }

    #[async_trait]
    impl LogSink for FlakySink {
        async fn write_batch(&self, records: &[AuditRecord]) -> Result<()> {
            if !self.healthy.load(Ordering::SeqCst) {
                return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "down")));
            }
            self.inner.write_batch(records).await
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_failed_flush_requeues_in_order() {
        let sink = Arc::new(FlakySink::default());
        let logger = SecureAuditLogger::with_sink(LoggerConfig::default(), sink.clone()).unwrap();

        logger.log(LogLevel::Info, "1", None, &ctx());
        logger.log(LogLevel::Info, "2", None, &ctx());
        assert!(logger.flush_now().await.is_err());
        assert_eq!(logger.pending_flush(), 2);

        logger.log(LogLevel::Info, "3", None, &ctx());
        sink.healthy.store(true, Ordering::SeqCst);
        assert_eq!(logger.flush_now().await.unwrap(), 3);

        let messages: Vec<String> = sink.inner.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["1", "2", "3"]);
        assert_eq!(logger.get_metrics().flush_failures, 1);
    }

    /// Persists every batch but reports the first one as failed.
    #[derive(Default)]
    struct LostAckSink {
        failed_once: AtomicBool,
        inner: MemorySink,
    }

    #[async_trait]
    impl LogSink for LostAckSink {
        async fn write_batch(&self, records: &[AuditRecord]) -> Result<()> {
            self.inner.write_batch(records).await?;
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "ack lost")));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "lost-ack"
        }
    }

    #[tokio::test]
    async fn test_retry_after_partial_write_dedupes_on_sequence() {
        let sink = Arc::new(LostAckSink::default());
        let logger = SecureAuditLogger::with_sink(LoggerConfig::default(), sink.clone()).unwrap();

        logger.log(LogLevel::Info, "1", None, &ctx());
        logger.log(LogLevel::Info, "2", None, &ctx());
        assert!(logger.flush_now().await.is_err());

        logger.log(LogLevel::Info, "3", None, &ctx());
        assert_eq!(logger.flush_now().await.unwrap(), 3);

        let written = sink.inner.records();
        assert_eq!(written.len(), 5);

        let unique: std::collections::BTreeMap<u64, String> =
            written.into_iter().map(|r| (r.sequence, r.message)).collect();
        let messages: Vec<&str> = unique.values().map(String::as_str).collect();
        assert_eq!(messages, vec!["1", "2", "3"]);
    }

    /// Never finishes a write.
    struct StuckSink;

    #[async_trait]
    impl LogSink for StuckSink {
        async fn write_batch(&self, _: &[AuditRecord]) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "stuck"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_sink_times_out_and_requeues() {
        let logger = SecureAuditLogger::with_sink(LoggerConfig::default(), Arc::new(StuckSink)).unwrap();
        logger.log(LogLevel::Info, "a", None, &ctx());

        let started = tokio::time::Instant::now();
        let err = logger.flush_now().await.unwrap_err();
        assert!(matches!(&err, Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut));
        assert!(started.elapsed() >= logger.config().flush_timeout());

        assert_eq!(logger.pending_flush(), 1);
        assert_eq!(logger.get_metrics().flush_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_flush_does_not_block_log() {
        let config = LoggerConfig {
            mirror_to_tracing: false,
            ..LoggerConfig::default()
        };
        let logger = Arc::new(SecureAuditLogger::with_sink(config, Arc::new(StuckSink)).unwrap());
        logger.log(LogLevel::Info, "1", None, &ctx());

        let flushing = tokio::spawn({
            let logger = Arc::clone(&logger);
            async move { logger.flush_now().await }
        });
        tokio::task::yield_now().await;

        // The batch is in flight; logging carries on.
        assert_eq!(logger.pending_flush(), 0);
        logger.log(LogLevel::Info, "2", None, &ctx());
        logger.log_security_event("3", AuditResult::Success, &ctx(), None);
        assert_eq!(logger.len(), 3);
        assert_eq!(logger.pending_flush(), 2);

        assert!(flushing.await.unwrap().is_err());
        let pending: Vec<String> = logger.buffer.lock().pending.iter().map(|r| r.message.clone()).collect();
        assert_eq!(pending, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_requeue_bounded_by_capacity() {
        let sink = Arc::new(FlakySink::default());
        let config = LoggerConfig {
            max_records: 2,
            ..LoggerConfig::default()
        };
        let logger = SecureAuditLogger::with_sink(config, sink).unwrap();

        for i in 0..4 {
            logger.log(LogLevel::Info, &i.to_string(), None, &ctx());
        }
        assert_eq!(logger.pending_flush(), 2);
        assert!(logger.flush_now().await.is_err());
        assert_eq!(logger.pending_flush(), 2);
    }

    #[test]
    fn test_development_environment_default() {
        assert_eq!(logger().config().environment, Environment::Development);
    }
}
