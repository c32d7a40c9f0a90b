//! Byte accumulator for reassembling lines from partial reads.
//!
//! Uses `bytes::BytesMut` so extracting a line is a split, not a copy of the
//! remaining data. Chunks arrive with arbitrary boundaries; a line is only
//! handed out once its terminating `\n` has been received.
//!
//! # Example
//!
//! ```
//! use kernel_host::transport::LineBuffer;
//!
//! let mut buffer = LineBuffer::new();
//! buffer.extend(b"hel");
//! assert_eq!(buffer.take_line(), None);
//!
//! buffer.extend(b"lo\nwor");
//! assert_eq!(buffer.take_line().as_deref(), Some("hello"));
//! assert_eq!(buffer.len(), 3);
//! ```

use bytes::BytesMut;

/// Initial capacity of the accumulator.
const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Buffer for accumulating incoming bytes and extracting complete lines.
#[derive(Debug)]
pub struct LineBuffer {
    /// Bytes received but not yet returned as part of a line.
    buffer: BytesMut,
}

impl LineBuffer {
    /// Create a new line buffer with the default capacity (64KB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new line buffer with a custom initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Append raw bytes from an endpoint read.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Split off the first complete line, without its terminator.
    ///
    /// Returns `None` when no `\n` has been received yet; the partial line
    /// stays buffered. Invalid UTF-8 is replaced rather than rejected.
    pub fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line = self.buffer.split_to(pos + 1);
        Some(String::from_utf8_lossy(&line[..pos]).into_owned())
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
