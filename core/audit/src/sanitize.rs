//! Sanitization of sensitive fields before they reach the audit trail.

use serde_json::{Map, Value};

use pqbridge_common::{Error, Result};
use pqbridge_crypto::hmac_sha256;

/// Field-name fragments that mark a value as sensitive.
///
/// Matched against the lowercased field name, so `privateKey`,
/// `PRIVATE_KEY` and `apiKey` all hit `key`.
pub const DEFAULT_SENSITIVE_MARKERS: &[&str] = &[
    "password",
    "token",
    "signature",
    "privatekey",
    "mnemonic",
    "wallet",
    "auth",
    "session",
    "credential",
    "secret",
    "key",
    "pin",
    "otp",
    "seed",
];

/// Hex characters of the keyed digest kept in a redaction marker.
const REDACTION_HEX_LEN: usize = 16;

/// Replaces sensitive values with a keyed one-way digest.
///
/// The digest is keyed per logger, so identical secrets still correlate
/// within one trail but low-entropy values cannot be looked up offline.
pub struct Sanitizer {
    markers: Vec<String>,
    hash_key: [u8; 32],
    max_depth: usize,
}

impl Sanitizer {
    /// Create a sanitizer with the default markers plus `extra_markers`.
    pub fn new(hash_key: [u8; 32], max_depth: usize, extra_markers: &[String]) -> Self {
        let mut markers: Vec<String> = DEFAULT_SENSITIVE_MARKERS.iter().map(|m| m.to_string()).collect();
        markers.extend(extra_markers.iter().map(|m| m.to_lowercase()));
        Self {
            markers,
            hash_key,
            max_depth,
        }
    }

    /// Whether a field with this name must be redacted.
    pub fn is_sensitive(&self, field: &str) -> bool {
        let lowered = field.to_lowercase();
        self.markers.iter().any(|m| lowered.contains(m.as_str()))
    }

    /// One-way digest of `value`, rendered as `[REDACTED:<hex>]`.
    pub fn hash_value(&self, value: &str) -> Result<String> {
        let digest = hmac_sha256(&self.hash_key, value.as_bytes())?;
        let hex = hex::encode(digest);
        Ok(format!("[REDACTED:{}]", &hex[..REDACTION_HEX_LEN]))
    }

    /// Hex digest of an identifier such as a user or session id.
    pub fn hash_identifier(&self, id: &str) -> Result<String> {
        Ok(hex::encode(hmac_sha256(&self.hash_key, id.as_bytes())?))
    }

    /// Sanitize a JSON value recursively.
    ///
    /// # Errors
    /// - `Sanitization` if nesting exceeds the configured depth
    pub fn sanitize(&self, value: &Value) -> Result<Value> {
        self.sanitize_at(value, 0)
    }

    fn sanitize_at(&self, value: &Value, depth: usize) -> Result<Value> {
        if depth > self.max_depth {
            return Err(Error::Sanitization(format!(
                "Nesting deeper than {} levels",
                self.max_depth
            )));
        }

        match value {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (field, inner) in map {
                    let sanitized = if self.is_sensitive(field) {
                        Value::String(self.hash_value(&string_form(inner))?)
                    } else {
                        self.sanitize_at(inner, depth + 1)?
                    };
                    out.insert(field.clone(), sanitized);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.sanitize_at(item, depth + 1))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }
}

fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new([7u8; 32], 8, &[])
    }

    #[test]
    fn test_password_redacted_user_kept() {
        let out = sanitizer()
            .sanitize(&json!({ "password": "secret123", "user": "alice" }))
            .unwrap();

        let password = out["password"].as_str().unwrap();
        assert_ne!(password, "secret123");
        assert!(!password.is_empty());
        assert!(password.starts_with("[REDACTED:"));
        assert_eq!(out["user"], "alice");
    }

    #[test]
    fn test_marker_matching_is_case_insensitive() {
        let s = sanitizer();
        assert!(s.is_sensitive("privateKey"));
        assert!(s.is_sensitive("PRIVATE_KEY"));
        assert!(s.is_sensitive("authToken"));
        assert!(s.is_sensitive("SessionId"));
        assert!(s.is_sensitive("otp"));
        assert!(!s.is_sensitive("user"));
        assert!(!s.is_sensitive("message"));
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let out = sanitizer()
            .sanitize(&json!({
                "request": {
                    "headers": [{ "authorization": "Bearer abc" }, { "accept": "json" }],
                    "body": { "walletAddress": "0xabc", "amount": 5 }
                }
            }))
            .unwrap();

        let headers = &out["request"]["headers"];
        assert_ne!(headers[0]["authorization"], "Bearer abc");
        assert_eq!(headers[1]["accept"], "json");
        assert_ne!(out["request"]["body"]["walletAddress"], "0xabc");
        assert_eq!(out["request"]["body"]["amount"], 5);
    }

    #[test]
    fn test_non_string_sensitive_values_hashed() {
        let out = sanitizer()
            .sanitize(&json!({ "pin": 1234, "seed": ["a", "b"] }))
            .unwrap();

        assert!(out["pin"].as_str().unwrap().starts_with("[REDACTED:"));
        assert!(out["seed"].as_str().unwrap().starts_with("[REDACTED:"));
    }

    #[test]
    fn test_hash_is_deterministic_per_key() {
        let a = Sanitizer::new([1u8; 32], 8, &[]);
        let b = Sanitizer::new([2u8; 32], 8, &[]);

        assert_eq!(a.hash_value("x").unwrap(), a.hash_value("x").unwrap());
        assert_ne!(a.hash_value("x").unwrap(), b.hash_value("x").unwrap());
        assert_ne!(a.hash_value("x").unwrap(), a.hash_value("y").unwrap());
    }

    #[test]
    fn test_extra_markers() {
        let s = Sanitizer::new([0u8; 32], 8, &["SSN".to_string()]);
        let out = s.sanitize(&json!({ "customer_ssn": "123-45-6789" })).unwrap();
        assert_ne!(out["customer_ssn"], "123-45-6789");
    }

    #[test]
    fn test_depth_limit() {
        let s = Sanitizer::new([0u8; 32], 2, &[]);
        assert!(s.sanitize(&json!({ "a": { "b": 1 } })).is_ok());

        let result = s.sanitize(&json!({ "a": { "b": { "c": { "d": 1 } } } }));
        assert!(matches!(result, Err(Error::Sanitization(_))));
    }

    #[test]
    fn test_scalars_pass_through() {
        let s = sanitizer();
        assert_eq!(s.sanitize(&json!("plain")).unwrap(), json!("plain"));
        assert_eq!(s.sanitize(&json!(null)).unwrap(), json!(null));
    }
}
