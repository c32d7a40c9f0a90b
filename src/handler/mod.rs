//! Handler module - computing response payloads.
//!
//! Provides:
//! - [`RequestHandler`] - turns a request line into a response payload
//! - [`CallbackContext`] - lets a handler call back into the remote side
//! - [`EchoHandler`] - the default handler
//!
//! # Example
//!
//! ```ignore
//! use kernel_host::handler::CallbackContext;
//! use kernel_host::KernelHost;
//!
//! let host = KernelHost::builder()
//!     .handle_fn(|request: &str, ctx: &CallbackContext<'_>| {
//!         if let Some(name) = request.strip_prefix("ask ") {
//!             return ctx.callback(name);
//!         }
//!         Ok(request.to_uppercase())
//!     })
//!     .build_stdio()?;
//! ```

mod context;
mod echo;

pub use context::CallbackContext;
pub use echo::EchoHandler;

use crate::error::Result;

/// Trait for request handlers.
///
/// The returned payload is wrapped in a success envelope by the engine. A
/// non-fatal error becomes an error envelope; fatal errors (for example an
/// interrupted callback) end the request chain.
pub trait RequestHandler: 'static {
    /// Compute the response payload for `request`.
    fn handle(&self, request: &str, ctx: &CallbackContext<'_>) -> Result<String>;
}

impl<F> RequestHandler for F
where
    F: Fn(&str, &CallbackContext<'_>) -> Result<String> + 'static,
{
    fn handle(&self, request: &str, ctx: &CallbackContext<'_>) -> Result<String> {
        self(request, ctx)
    }
}
