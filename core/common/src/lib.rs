//! Common utilities and types shared across PQBridge modules.
//!
//! This module provides foundational types that are used by both the
//! cryptographic bridge and the audit logger.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Classification, SensitiveBytes};
