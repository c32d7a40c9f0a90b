//! Outgoing message envelopes.
//!
//! Every message written by the host is one JSON value on one line:
//!
//! ```text
//! {"ok":"asynchronous: hello"}
//! {"error":"bad input","name":"Error","stack":"Error: bad input"}
//! "Callback: bfoo"
//! ```
//!
//! # Example
//!
//! ```
//! use kernel_host::protocol::Envelope;
//!
//! let json = serde_json::to_string(&Envelope::ok("hi")).unwrap();
//! assert_eq!(json, r#"{"ok":"hi"}"#);
//!
//! let json = serde_json::to_string(&Envelope::callback("bfoo")).unwrap();
//! assert_eq!(json, r#""Callback: bfoo""#);
//! ```

use serde::Serialize;

use crate::error::HostError;

/// Prefix of the line asking the remote side to run a callback.
pub const CALLBACK_PREFIX: &str = "Callback: ";

/// A message written to the output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    /// Successful response.
    Ok {
        /// Response payload.
        ok: String,
    },
    /// Failed response.
    Error {
        /// Error message.
        error: String,
        /// Error kind.
        name: String,
        /// Trace, omitted when stack traces are disabled.
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
    /// Synchronous callback request, written as a JSON string.
    Callback(String),
}

impl Envelope {
    /// Build a success envelope.
    pub fn ok(payload: impl Into<String>) -> Self {
        Envelope::Ok { ok: payload.into() }
    }

    /// Build an error envelope from a host error.
    pub fn from_error(err: &HostError, no_stack: bool) -> Self {
        Envelope::Error {
            error: err.to_string(),
            name: err.name().to_string(),
            stack: (!no_stack).then(|| err.trace()),
        }
    }

    /// Build a callback request naming `token`.
    pub fn callback(token: &str) -> Self {
        Envelope::Callback(format!("{CALLBACK_PREFIX}{token}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(envelope: &Envelope) -> Value {
        serde_json::to_value(envelope).unwrap()
    }

    #[test]
    fn test_ok_envelope() {
        assert_eq!(to_value(&Envelope::ok("x")), json!({"ok": "x"}));
    }

    #[test]
    fn test_error_envelope_with_stack() {
        let err = HostError::handler("bad input");
        let value = to_value(&Envelope::from_error(&err, false));

        assert_eq!(value["error"], "bad input");
        assert_eq!(value["name"], "Error");
        assert_eq!(value["stack"], "Error: bad input");
    }

    #[test]
    fn test_error_envelope_without_stack() {
        let err = HostError::Interrupted;
        let value = to_value(&Envelope::from_error(&err, true));

        assert_eq!(
            value,
            json!({"error": "Interrupted before callback returned", "name": "InterruptedError"})
        );
    }

    #[test]
    fn test_callback_is_a_json_string() {
        assert_eq!(to_value(&Envelope::callback("t")), json!("Callback: t"));
    }

    #[test]
    fn test_serialized_envelope_is_single_line() {
        let err = HostError::handler("line one\nline two");
        let line = serde_json::to_string(&Envelope::from_error(&err, false)).unwrap();

        assert!(!line.contains('\n'));
    }
}
