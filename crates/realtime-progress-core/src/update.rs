//! Stored value envelope for a session key.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a poller can observe under a session key.
///
/// Serialized as `{"state":"running","message":...}` while the session runs
/// and `{"state":"ended"}` once it has ended, so the terminal marker can never
/// be confused with a progress payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// Latest progress payload pushed by the running function.
    Running { message: Value },
    /// Terminal marker.
    Ended,
}

impl SessionUpdate {
    /// Wrap a progress payload.
    #[must_use]
    pub const fn running(message: Value) -> Self {
        Self::Running { message }
    }

    /// Returns `true` for the terminal marker.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }

    /// The progress payload, if any.
    #[must_use]
    pub const fn message(&self) -> Option<&Value> {
        match self {
            Self::Running { message } => Some(message),
            Self::Ended => None,
        }
    }

    /// Encode for the store.
    ///
    /// # Errors
    /// Returns error if the payload cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a raw stored value.
    ///
    /// # Errors
    /// Returns error if the value was not written by a reporter.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_terminal_marker_shape() {
        assert_eq!(SessionUpdate::Ended.encode().unwrap(), r#"{"state":"ended"}"#);
    }

    #[test]
    fn test_running_payload_shape() {
        let raw = SessionUpdate::running(json!({"n": 1})).encode().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, json!({"state": "running", "message": {"n": 1}}));
    }

    #[test]
    fn test_payload_that_looks_like_marker_is_not_terminal() {
        let update = SessionUpdate::running(json!({"state": "ended"}));
        let decoded = SessionUpdate::decode(&update.encode().unwrap()).unwrap();
        assert!(!decoded.is_terminal());
        assert_eq!(decoded.message(), Some(&json!({"state": "ended"})));
    }

    #[test]
    fn test_decode_rejects_foreign_values() {
        assert!(SessionUpdate::decode("not json").is_err());
        assert!(SessionUpdate::decode(r#"{"n":1}"#).is_err());
    }
}
