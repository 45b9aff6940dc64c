//! Counters and integrity reporting for the audit logger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::record::LogLevel;

/// Outcome of re-verifying every held record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityStatus {
    Intact,
    Compromised,
}

/// Result of one integrity pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub status: IntegrityStatus,
    /// Number of records checked.
    pub checked: usize,
    /// Records whose signature no longer matches their content.
    pub compromised_ids: Vec<Uuid>,
    pub checked_at: DateTime<Utc>,
}

impl IntegrityReport {
    pub fn is_intact(&self) -> bool {
        self.status == IntegrityStatus::Intact
    }
}

/// Snapshot returned by [`crate::SecureAuditLogger::get_metrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMetrics {
    pub total_logs: u64,
    pub error_count: u64,
    pub warning_count: u64,
    pub security_events: u64,
    pub degraded_count: u64,
    pub evicted_count: u64,
    /// Records dropped by the production level filter.
    pub skipped_count: u64,
    pub flush_failures: u64,
    /// Distinct compromised records found by `verify_integrity`. A record
    /// still compromised on a later pass is not counted again.
    pub integrity_violations: u64,
    /// Records currently held in memory.
    pub buffered: usize,
    pub integrity_status: IntegrityStatus,
    pub last_integrity_check: Option<DateTime<Utc>>,
}

/// Lifetime counters, updated without taking the buffer lock.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    total: AtomicU64,
    errors: AtomicU64,
    warnings: AtomicU64,
    security: AtomicU64,
    degraded: AtomicU64,
    evicted: AtomicU64,
    skipped: AtomicU64,
    flush_failures: AtomicU64,
    integrity_violations: AtomicU64,
}

impl Counters {
    pub(crate) fn record_accepted(&self, level: LogLevel, degraded: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        match level {
            LogLevel::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            LogLevel::Warn => {
                self.warnings.fetch_add(1, Ordering::Relaxed);
            }
            LogLevel::Security => {
                self.security.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        if degraded {
            self.degraded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_evicted(&self, n: usize) {
        self.evicted.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_integrity_violations(&self, n: usize) {
        self.integrity_violations.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        buffered: usize,
        integrity_status: IntegrityStatus,
        last_integrity_check: Option<DateTime<Utc>>,
    ) -> LogMetrics {
        LogMetrics {
            total_logs: self.total.load(Ordering::Relaxed),
            error_count: self.errors.load(Ordering::Relaxed),
            warning_count: self.warnings.load(Ordering::Relaxed),
            security_events: self.security.load(Ordering::Relaxed),
            degraded_count: self.degraded.load(Ordering::Relaxed),
            evicted_count: self.evicted.load(Ordering::Relaxed),
            skipped_count: self.skipped.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            integrity_violations: self.integrity_violations.load(Ordering::Relaxed),
            buffered,
            integrity_status,
            last_integrity_check,
        }
    }
}
