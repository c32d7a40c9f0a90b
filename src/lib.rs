//! # kernel-host
//!
//! Host side of a line-delimited request/response protocol with re-entrant
//! synchronous callbacks.
//!
//! The remote kernel sends one request per line; the host answers each with
//! one JSON line. While handling a request the host can ask the remote side
//! to run a callback and block until it completes. Requests arriving before
//! the completion are answered first, so callbacks may nest.
//!
//! ## Architecture
//!
//! - **Transport**: buffered line reads (blocking and suspending) and
//!   retrying line writes over raw endpoints
//! - **Protocol**: transcript replay filtering and JSON envelopes
//! - **Host**: the request state machine and callback round-trips
//!
//! ## Example
//!
//! ```ignore
//! use kernel_host::KernelHost;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()?;
//!     let local = tokio::task::LocalSet::new();
//!
//!     let code = local.block_on(&runtime, async {
//!         let host = KernelHost::builder().build_stdio()?;
//!         host.run();
//!         host.wait_for_exit().await
//!     })?;
//!
//!     std::process::exit(code);
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod transport;

mod host;

pub use config::HostConfig;
pub use error::{HostError, Result};
pub use handler::{CallbackContext, EchoHandler, RequestHandler};
pub use host::{
    HostBuilder, KernelHost, ReadState, ASYNC_RESPONSE_PREFIX, COMPLETE_CALLBACK, EXIT_REQUEST,
    SYNC_RESPONSE_PREFIX,
};
