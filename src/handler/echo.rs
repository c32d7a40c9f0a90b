//! Default request handler.
//!
//! Echoes requests back, with two exceptions:
//! - requests starting with `b` perform a callback named after the request
//!   and answer with the callback's result
//! - requests starting with `defer` additionally schedule a background
//!   callback (`WOAH`)

use super::{CallbackContext, RequestHandler};
use crate::error::Result;

/// Prefix of requests that perform an inline callback.
pub const DEFAULT_CALLBACK_PREFIX: &str = "b";

/// Prefix of requests that schedule a deferred callback.
pub const DEFAULT_DEFER_PREFIX: &str = "defer";

/// Token of the deferred callback.
pub const DEFAULT_DEFERRED_TOKEN: &str = "WOAH";

/// Echo handler with configurable callback triggers.
#[derive(Debug, Clone)]
pub struct EchoHandler {
    callback_prefix: String,
    defer_prefix: String,
    deferred_token: String,
}

impl EchoHandler {
    /// Create a handler with the default prefixes.
    pub fn new() -> Self {
        Self {
            callback_prefix: DEFAULT_CALLBACK_PREFIX.to_string(),
            defer_prefix: DEFAULT_DEFER_PREFIX.to_string(),
            deferred_token: DEFAULT_DEFERRED_TOKEN.to_string(),
        }
    }

    /// Set the prefix that triggers an inline callback.
    pub fn callback_prefix(mut self, prefix: &str) -> Self {
        self.callback_prefix = prefix.to_string();
        self
    }

    /// Set the prefix that schedules a deferred callback.
    pub fn defer_prefix(mut self, prefix: &str) -> Self {
        self.defer_prefix = prefix.to_string();
        self
    }

    /// Set the token of deferred callbacks.
    pub fn deferred_token(mut self, token: &str) -> Self {
        self.deferred_token = token.to_string();
        self
    }
}

impl Default for EchoHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestHandler for EchoHandler {
    fn handle(&self, request: &str, ctx: &CallbackContext<'_>) -> Result<String> {
        if request.starts_with(&self.defer_prefix) {
            ctx.defer_callback(&self.deferred_token);
        }

        if request.starts_with(&self.callback_prefix) {
            ctx.callback(request)
        } else {
            Ok(request.to_string())
        }
    }
}
