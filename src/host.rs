//! Host builder and request engine.
//!
//! The [`HostBuilder`] configures the engine; the [`KernelHost`] drives the
//! request cycle:
//! 1. Wait (suspending) for the next request line
//! 2. Compute the response payload with the [`RequestHandler`]
//! 3. Write the response envelope
//! 4. Schedule the next read as a fresh task
//!
//! A handler may ask the remote side to run a callback. The engine then
//! writes the callback line and blocks on synchronous reads until the
//! matching `completeCallback` arrives. Unrelated requests read in the
//! meantime are answered in place; a request that itself calls back nests a
//! new wait inside the current one.
//!
//! # Important
//!
//! - The engine is single-threaded: run it inside a [`tokio::task::LocalSet`]
//!   on a current-thread runtime.
//! - Nothing yields while a callback is outstanding. Timers and other tasks
//!   only run between top-level requests.
//!
//! # Example
//!
//! ```ignore
//! use kernel_host::KernelHost;
//!
//! let local = tokio::task::LocalSet::new();
//! let code = local
//!     .run_until(async {
//!         let host = KernelHost::builder().no_stack(true).build_stdio()?;
//!         host.run();
//!         host.wait_for_exit().await
//!     })
//!     .await?;
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::config::HostConfig;
use crate::error::{HostError, Result};
use crate::handler::{CallbackContext, EchoHandler, RequestHandler};
use crate::protocol::{Envelope, Framer};
use crate::transport::LineTransport;

/// Request asking the host to shut down.
pub const EXIT_REQUEST: &str = "exit";

/// Prefix of the line completing an outstanding callback.
pub const COMPLETE_CALLBACK: &str = "completeCallback";

/// Payload prefix of responses written while a callback is outstanding.
pub const SYNC_RESPONSE_PREFIX: &str = "Ack SYNC: ";

/// Payload prefix of responses to top-level requests.
pub const ASYNC_RESPONSE_PREFIX: &str = "asynchronous: ";

/// What the engine is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// Not reading; `run()` starts the next read.
    Idle,
    /// Suspended on the top-level read.
    AwaitingNextRequest,
    /// Processing a top-level request.
    HandlingRequest,
    /// Blocked inside a callback round-trip.
    HandlingCallback,
}

/// Builder for configuring and creating a [`KernelHost`].
pub struct HostBuilder {
    config: HostConfig,
    handler: Box<dyn RequestHandler>,
}

impl HostBuilder {
    /// Create a builder with default options and the [`EchoHandler`].
    pub fn new() -> Self {
        Self {
            config: HostConfig::default(),
            handler: Box::new(EchoHandler::new()),
        }
    }

    /// Replace all options.
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Mirror all traffic to the diagnostic stream.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Log how long each top-level request took.
    pub fn debug_timing(mut self, enabled: bool) -> Self {
        self.config.debug_timing = enabled;
        self
    }

    /// Omit stack traces from error envelopes.
    pub fn no_stack(mut self, enabled: bool) -> Self {
        self.config.no_stack = enabled;
        self
    }

    /// Set the read chunk size used by [`build_stdio`](Self::build_stdio).
    ///
    /// Default: 64KB
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Set the delay before deferred callbacks fire.
    ///
    /// Default: 1 second
    pub fn defer_delay(mut self, delay: Duration) -> Self {
        self.config.defer_delay = delay;
        self
    }

    /// Use a custom request handler.
    pub fn handler<H: RequestHandler>(mut self, handler: H) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Use a closure as the request handler.
    pub fn handle_fn<F>(self, handler: F) -> Self
    where
        F: Fn(&str, &CallbackContext<'_>) -> Result<String> + 'static,
    {
        self.handler(handler)
    }

    /// Build a host over the given transport.
    pub fn build(self, transport: LineTransport) -> KernelHost {
        let (exit_tx, exit_rx) = oneshot::channel();
        let engine = Engine {
            framer: Framer::new(transport, self.config.debug),
            handler: self.handler,
            config: self.config,
            state: Cell::new(ReadState::Idle),
            exit_tx: RefCell::new(Some(exit_tx)),
        };

        KernelHost {
            engine: Rc::new(engine),
            exit_rx,
        }
    }

    /// Build a host over the process's stdin, stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if stdin cannot be duplicated.
    pub fn build_stdio(self) -> Result<KernelHost> {
        let transport = LineTransport::stdio(self.config.read_chunk_size)?;
        Ok(self.build(transport))
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A host driving the remote kernel's request stream.
///
/// Use `run()` to start processing and `wait_for_exit()` to wait for the
/// exit notification.
pub struct KernelHost {
    engine: Rc<Engine>,
    exit_rx: oneshot::Receiver<Result<i32>>,
}

impl KernelHost {
    /// Create a new host builder.
    pub fn builder() -> HostBuilder {
        HostBuilder::new()
    }

    /// Start waiting for the next request.
    ///
    /// Does nothing unless the engine is [`ReadState::Idle`]. Must be called
    /// from within a [`tokio::task::LocalSet`].
    pub fn run(&self) {
        self.engine.run();
    }

    /// Current engine state.
    pub fn state(&self) -> ReadState {
        self.engine.state()
    }

    /// Options the host was built with.
    pub fn config(&self) -> &HostConfig {
        &self.engine.config
    }

    /// Wait for the exit notification.
    ///
    /// Resolves to exit code 0 once the request stream ends or `exit` is
    /// received.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the engine (protocol violation,
    /// interrupted callback, transport failure).
    pub async fn wait_for_exit(self) -> Result<i32> {
        self.exit_rx.await.map_err(|_| HostError::Stopped)?
    }
}

/// The request state machine shared by the read task, deferred callbacks and
/// handler contexts.
pub(crate) struct Engine {
    framer: Framer,
    handler: Box<dyn RequestHandler>,
    config: HostConfig,
    state: Cell<ReadState>,
    exit_tx: RefCell<Option<oneshot::Sender<Result<i32>>>>,
}

impl Engine {
    pub(crate) fn state(&self) -> ReadState {
        self.state.get()
    }

    fn run(self: &Rc<Self>) {
        let state = self.state.get();
        if state != ReadState::Idle {
            tracing::debug!(?state, "Not waiting for a request");
            return;
        }

        self.state.set(ReadState::AwaitingNextRequest);
        let engine = Rc::clone(self);
        tokio::task::spawn_local(async move { engine.next_request().await });
    }

    /// Read one top-level request and process it.
    async fn next_request(self: Rc<Self>) {
        let request = self.framer.read_async().await;
        self.state.set(ReadState::HandlingRequest);

        let request = match request {
            Ok(Some(request)) if request != EXIT_REQUEST => request,
            Ok(request) => {
                tracing::debug!(?request, "Exiting");
                self.notify_exit(Ok(0));
                return;
            }
            Err(e) => {
                self.fail(e);
                return;
            }
        };

        let started = Instant::now();
        let outcome = self.process_request(
            &request,
            || {
                self.state.set(ReadState::Idle);
                self.schedule_run();
                Ok(())
            },
            false,
        );

        if self.config.debug_timing {
            tracing::info!(
                request = %request,
                elapsed_us = started.elapsed().as_micros() as u64,
                "Request processed"
            );
        }

        if let Err(e) = outcome {
            self.fail(e);
        }
    }

    /// Process `request`, write its response, then return `next()`.
    ///
    /// `next` runs synchronously before this returns. With `sync` set it is
    /// the wait loop of the enclosing callback, which relies on that.
    fn process_request<T>(
        self: &Rc<Self>,
        request: &str,
        next: impl FnOnce() -> Result<T>,
        sync: bool,
    ) -> Result<T> {
        if request.starts_with(COMPLETE_CALLBACK) {
            return Err(HostError::Protocol(format!(
                "Unexpected `{request}` request. Completions are only valid while a callback is outstanding"
            )));
        }
        debug_assert!(
            !sync || self.state.get() == ReadState::HandlingCallback,
            "nested request processed outside of a callback"
        );

        let ctx = CallbackContext::new(self, sync);
        let written = self.handler.handle(request, &ctx).and_then(|payload| {
            let prefix = if sync {
                SYNC_RESPONSE_PREFIX
            } else {
                ASYNC_RESPONSE_PREFIX
            };
            self.framer.write(&Envelope::ok(format!("{prefix}{payload}")))
        });

        if let Err(err) = written {
            if err.is_fatal() {
                return Err(err);
            }
            tracing::debug!(error = %err, "Request failed");
            self.framer
                .write(&Envelope::from_error(&err, self.config.no_stack))?;
        }

        next()
    }

    /// Run callback `token` on the remote side and wait for its completion.
    pub(crate) fn callback_handler(self: &Rc<Self>, token: &str) -> Result<String> {
        let prior = self.state.get();
        if prior == ReadState::AwaitingNextRequest {
            // TODO: decide whether this should fail instead of warning once
            // deferred callbacks are matched to their originating request.
            tracing::warn!(
                token,
                "Callback started while waiting on the top-level read; that read may consume the completion"
            );
        }
        tracing::debug!(token, ?prior, "Beginning sync callback");

        self.state.set(ReadState::HandlingCallback);
        self.framer.write(&Envelope::callback(token))?;
        self.await_completion(token, prior)
    }

    fn await_completion(self: &Rc<Self>, token: &str, prior: ReadState) -> Result<String> {
        loop {
            let request = match self.framer.read_sync()? {
                Some(request) if request != EXIT_REQUEST => request,
                _ => return Err(HostError::Interrupted),
            };

            if request.starts_with(COMPLETE_CALLBACK) {
                self.state.set(prior);
                tracing::debug!(token, ?prior, "Callback completed");
                return Ok(format!("{request} ({token})"));
            }

            // Unrelated request: answer it, then keep waiting for our completion.
            // Only a nested callback inside it grows the stack.
            self.process_request(&request, || Ok(()), true)?;
        }
    }

    /// Fire callback `token` from its own task after the defer delay.
    pub(crate) fn defer_callback(self: &Rc<Self>, token: String) {
        let engine = Rc::clone(self);
        let delay = self.config.defer_delay;

        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            if engine.has_exited() {
                tracing::debug!(token = %token, "Deferred callback skipped after exit");
                return;
            }
            match engine.callback_handler(&token) {
                Ok(result) => {
                    tracing::debug!(token = %token, result = %result, "Deferred callback completed");
                }
                Err(e) => {
                    tracing::error!(token = %token, error = %e, "Deferred callback failed");
                    if e.is_fatal() {
                        engine.notify_exit(Err(e));
                    }
                }
            }
        });
    }

    /// Start the next read on a later turn of the scheduler.
    fn schedule_run(self: &Rc<Self>) {
        let engine = Rc::clone(self);
        tokio::task::spawn_local(async move { engine.run() });
    }

    /// True once the exit notification has been delivered.
    fn has_exited(&self) -> bool {
        self.exit_tx.borrow().is_none()
    }

    fn fail(&self, error: HostError) {
        tracing::error!(error = %error, "Request processing stopped");
        self.notify_exit(Err(error));
    }

    /// Deliver the exit notification; later calls are ignored.
    fn notify_exit(&self, outcome: Result<i32>) {
        match self.exit_tx.borrow_mut().take() {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => tracing::debug!("Exit already notified"),
        }
    }
}
