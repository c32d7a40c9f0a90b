//! Host configuration.
//!
//! Options can be set through [`HostBuilder`](crate::HostBuilder) or loaded
//! from JSON, using the camelCase option names of the host protocol:
//!
//! ```
//! use kernel_host::HostConfig;
//!
//! let config = HostConfig::from_json(r#"{"debug": true, "noStack": true}"#).unwrap();
//! assert!(config.debug);
//! assert!(config.no_stack);
//! assert!(!config.debug_timing);
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::Result;
use crate::transport::DEFAULT_READ_CHUNK_SIZE;

/// Default delay before a deferred callback fires.
pub const DEFAULT_DEFER_DELAY: Duration = Duration::from_secs(1);

/// Configuration of the host engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    /// Mirror all traffic to the diagnostic stream.
    pub debug: bool,
    /// Log how long each top-level request took.
    pub debug_timing: bool,
    /// Omit the `stack` field from error envelopes.
    pub no_stack: bool,
    /// Size of a single read from the input endpoint.
    pub read_chunk_size: usize,
    /// Delay before a deferred callback fires.
    #[serde(rename = "deferDelayMs", deserialize_with = "duration_from_millis")]
    pub defer_delay: Duration,
}

impl HostConfig {
    /// Parse a configuration from JSON. Missing options keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            debug: false,
            debug_timing: false,
            no_stack: false,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            defer_delay: DEFAULT_DEFER_DELAY,
        }
    }
}

fn duration_from_millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert!(!config.debug);
        assert_eq!(config.read_chunk_size, 64 * 1024);
        assert_eq!(config.defer_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_from_json_overrides() {
        let config = HostConfig::from_json(
            r#"{"debugTiming": true, "readChunkSize": 2, "deferDelayMs": 250}"#,
        )
        .unwrap();

        assert!(config.debug_timing);
        assert_eq!(config.read_chunk_size, 2);
        assert_eq!(config.defer_delay, Duration::from_millis(250));
        assert!(!config.no_stack);
    }

    #[test]
    fn test_from_json_empty_object() {
        assert_eq!(HostConfig::from_json("{}").unwrap(), HostConfig::default());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = HostConfig::from_json("not json").unwrap_err();
        assert!(err.to_string().starts_with("JSON error"));
    }
}
