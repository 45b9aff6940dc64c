//! Filtered views over held audit records.

use chrono::{DateTime, Utc};

use crate::record::{AuditRecord, AuditResult, LogLevel};
use pqbridge_common::Classification;

/// Filter for [`crate::SecureAuditLogger::query`]. Unset fields match all.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub min_level: Option<LogLevel>,
    pub component: Option<String>,
    pub operation: Option<String>,
    pub classification: Option<Classification>,
    pub result: Option<AuditResult>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn result(mut self, result: AuditResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.min_level.map_or(true, |l| record.level >= l)
            && self.component.as_deref().map_or(true, |c| record.component == c)
            && self.operation.as_deref().map_or(true, |o| record.operation == o)
            && self.classification.map_or(true, |c| record.classification == c)
            && self.result.map_or(true, |r| record.result == r)
            && self.since.map_or(true, |s| record.timestamp >= s)
    }

    /// Apply to records held oldest first; returns newest first.
    pub(crate) fn apply<'a, I>(&self, records: I) -> Vec<AuditRecord>
    where
        I: DoubleEndedIterator<Item = &'a AuditRecord>,
    {
        records
            .rev()
            .filter(|r| self.matches(r))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ThreatLevel;
    use chrono::Duration;
    use uuid::Uuid;

    fn record(sequence: u64, level: LogLevel, component: &str) -> AuditRecord {
        AuditRecord {
            id: Uuid::new_v4(),
            sequence,
            timestamp: Utc::now(),
            level,
            message: String::new(),
            component: component.to_string(),
            operation: "op".to_string(),
            classification: Classification::Confidential,
            user_id_hash: None,
            session_id_hash: None,
            result: AuditResult::Success,
            threat_level: ThreatLevel::Low,
            metadata: None,
            degraded: false,
            signature: String::new(),
        }
    }

    #[test]
    fn test_newest_first_with_limit() {
        let records: Vec<_> = (1..=5).map(|i| record(i, LogLevel::Info, "a")).collect();
        let out = AuditQuery::new().limit(2).apply(records.iter());
        let seqs: Vec<u64> = out.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![5, 4]);
    }

    #[test]
    fn test_filters_combine() {
        let records = vec![
            record(1, LogLevel::Debug, "auth"),
            record(2, LogLevel::Error, "auth"),
            record(3, LogLevel::Security, "crypto"),
            record(4, LogLevel::Audit, "auth"),
        ];

        let out = AuditQuery::new()
            .min_level(LogLevel::Error)
            .component("auth")
            .apply(records.iter());
        let seqs: Vec<u64> = out.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![4, 2]);
    }

    #[test]
    fn test_since_filter() {
        let mut old = record(1, LogLevel::Info, "a");
        old.timestamp = Utc::now() - Duration::hours(2);
        let recent = record(2, LogLevel::Info, "a");

        let query = AuditQuery::new().since(Utc::now() - Duration::hours(1));
        assert!(!query.matches(&old));
        assert!(query.matches(&recent));
    }
}
