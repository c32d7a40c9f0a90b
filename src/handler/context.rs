//! Context passed to request handlers.
//!
//! Provides the two ways a handler can reach back to the remote side:
//! - `callback` - synchronous round-trip, blocks until the completion arrives
//! - `defer_callback` - callback fired later from its own task

use std::rc::Rc;

use crate::error::Result;
use crate::host::{Engine, ReadState};

/// Context passed to [`RequestHandler::handle`](super::RequestHandler::handle).
pub struct CallbackContext<'a> {
    engine: &'a Rc<Engine>,
    sync: bool,
}

impl<'a> CallbackContext<'a> {
    pub(crate) fn new(engine: &'a Rc<Engine>, sync: bool) -> Self {
        Self { engine, sync }
    }

    /// Whether this request arrived while a callback was outstanding.
    #[inline]
    pub fn is_sync(&self) -> bool {
        self.sync
    }

    /// Current engine state.
    #[inline]
    pub fn state(&self) -> ReadState {
        self.engine.state()
    }

    /// Ask the remote side to run callback `token` and wait for its completion.
    ///
    /// Other requests arriving before the completion are fully processed
    /// first, including any callbacks they trigger. Returns
    /// `"<completion line> (<token>)"`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Interrupted`](crate::HostError::Interrupted) if
    /// the stream ends first, or any fatal error raised by nested requests.
    pub fn callback(&self, token: &str) -> Result<String> {
        self.engine.callback_handler(token)
    }

    /// Schedule callback `token` after the configured defer delay.
    ///
    /// The current request does not wait for it.
    pub fn defer_callback(&self, token: &str) {
        self.engine.defer_callback(token.to_string());
    }
}
