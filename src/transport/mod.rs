//! Transport module - buffered line I/O over raw endpoints.
//!
//! Provides:
//! - [`LineBuffer`] - byte accumulator that hands out complete lines
//! - [`ChunkSource`] - blocking and suspending one-chunk reads
//! - [`LineTransport`] - line reads/writes on input, output and diagnostics
//! - In-memory endpoints for tests and demos

mod line;
mod line_buffer;
mod memory;
mod source;

pub use line::{LineTransport, DEFAULT_READ_CHUNK_SIZE};
pub use line_buffer::LineBuffer;
pub use memory::{MemoryInput, SharedOutput};
pub use source::{ChunkSource, FileInput, LocalBoxFuture};
