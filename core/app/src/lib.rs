//! Application wiring for PQBridge.
//!
//! Builds the crypto bridge and the audit logger once and hands them out
//! together, so every layer shares the same instances without globals.

pub mod audited;
pub mod services;

pub use audited::AuditedCrypto;
pub use services::SecurityServices;
