//! Line-oriented reads and writes over raw endpoints.
//!
//! # Important
//!
//! - Lines are terminated by a single `\n`; no length limit is imposed.
//! - The blocking and suspending readers share one accumulator. They must
//!   never interleave within one process, or bytes meant for one reader can
//!   end up in the other.
//! - Writes never yield: a line is either fully written or the write failed.

use std::cell::RefCell;
use std::io::{self, Write};

use super::line_buffer::LineBuffer;
use super::source::{ChunkSource, FileInput};
use crate::error::Result;

/// Default size of a single endpoint read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Buffered line transport over an input, an output and a diagnostic stream.
pub struct LineTransport {
    input: Box<dyn ChunkSource>,
    output: RefCell<Box<dyn Write>>,
    error: RefCell<Box<dyn Write>>,
    buffer: RefCell<LineBuffer>,
    /// Scratch space for blocking reads.
    read_buf: RefCell<Vec<u8>>,
    chunk_size: usize,
}

impl LineTransport {
    /// Create a transport with the default read chunk size.
    pub fn new<I, O, E>(input: I, output: O, error: E) -> Self
    where
        I: ChunkSource,
        O: Write + 'static,
        E: Write + 'static,
    {
        Self::with_chunk_size(input, output, error, DEFAULT_READ_CHUNK_SIZE)
    }

    /// Create a transport reading at most `chunk_size` bytes per endpoint read.
    ///
    /// A `chunk_size` of zero is treated as one.
    pub fn with_chunk_size<I, O, E>(input: I, output: O, error: E, chunk_size: usize) -> Self
    where
        I: ChunkSource,
        O: Write + 'static,
        E: Write + 'static,
    {
        let chunk_size = chunk_size.max(1);
        Self {
            input: Box::new(input),
            output: RefCell::new(Box::new(output)),
            error: RefCell::new(Box::new(error)),
            buffer: RefCell::new(LineBuffer::new()),
            read_buf: RefCell::new(vec![0u8; chunk_size]),
            chunk_size,
        }
    }

    /// Wire the transport to the process's stdin, stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if stdin cannot be duplicated.
    pub fn stdio(chunk_size: usize) -> Result<Self> {
        let input = FileInput::stdin()?;
        Ok(Self::with_chunk_size(
            input,
            io::stdout(),
            io::stderr(),
            chunk_size,
        ))
    }

    /// Size of a single endpoint read.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of bytes received but not yet returned as a line.
    pub fn buffered(&self) -> usize {
        self.buffer.borrow().len()
    }

    /// Write `line` followed by `\n` to the output endpoint.
    ///
    /// # Errors
    ///
    /// Returns any write error other than `WouldBlock`/`Interrupted`.
    pub fn write_line(&self, line: &str) -> Result<()> {
        write_all_retrying(&mut **self.output.borrow_mut(), line)
    }

    /// Write `line` followed by `\n` to the diagnostic endpoint.
    ///
    /// # Errors
    ///
    /// Returns any write error other than `WouldBlock`/`Interrupted`.
    pub fn write_error_line(&self, line: &str) -> Result<()> {
        write_all_retrying(&mut **self.error.borrow_mut(), line)
    }

    /// Read the next line, blocking the thread until one is complete.
    ///
    /// Returns `Ok(None)` at end-of-stream. A trailing partial line is not
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the input endpoint's read error.
    pub fn read_line(&self) -> Result<Option<String>> {
        loop {
            if let Some(line) = self.buffer.borrow_mut().take_line() {
                tracing::trace!(line = %line, "read line (blocking)");
                return Ok(Some(line));
            }

            let mut read_buf = self.read_buf.borrow_mut();
            let n = match self.input.read_chunk(&mut read_buf) {
                Ok(0) => return Ok(None),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.buffer.borrow_mut().extend(&read_buf[..n]);
        }
    }

    /// Read the next line, yielding to the scheduler between chunk reads.
    ///
    /// Same extraction as [`read_line`](Self::read_line). The accumulator is
    /// not borrowed while a chunk read is pending.
    ///
    /// # Errors
    ///
    /// Returns the input endpoint's read error.
    pub async fn read_line_async(&self) -> Result<Option<String>> {
        let mut reads = 0usize;
        loop {
            if let Some(line) = self.buffer.borrow_mut().take_line() {
                tracing::trace!(line = %line, reads, "read line (suspending)");
                return Ok(Some(line));
            }

            reads += 1;
            let chunk = match self.input.read_chunk_async(self.chunk_size).await {
                Ok(chunk) => chunk,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if chunk.is_empty() {
                // A blocking read may have buffered a line while we waited.
                return Ok(self.buffer.borrow_mut().take_line());
            }
            self.buffer.borrow_mut().extend(&chunk);
        }
    }
}

/// Write `line` plus `\n`, retrying on transient failures, then flush.
///
/// `WouldBlock` is retried immediately: the reader on the other side is
/// expected to be draining the pipe.
fn write_all_retrying(writer: &mut dyn Write, line: &str) -> Result<()> {
    let mut data = Vec::with_capacity(line.len() + 1);
    data.extend_from_slice(line.as_bytes());
    data.push(b'\n');

    let mut offset = 0;
    while offset < data.len() {
        match writer.write(&data[offset..]) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
            Ok(n) => offset += n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e.into()),
        }
    }

    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryInput, SharedOutput};

    fn transport(input: MemoryInput, chunk_size: usize) -> (LineTransport, SharedOutput, SharedOutput) {
        let out = SharedOutput::new();
        let err = SharedOutput::new();
        let transport = LineTransport::with_chunk_size(input, out.clone(), err.clone(), chunk_size);
        (transport, out, err)
    }

    /// Writer that fails with `WouldBlock` every other call and accepts at
    /// most two bytes at a time.
    struct Flaky {
        inner: SharedOutput,
        calls: usize,
    }

    impl Write for Flaky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = buf.len().min(2);
            self.inner.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_line_appends_newline() {
        let (transport, out, err) = transport(MemoryInput::new(), 16);

        transport.write_line("hello").unwrap();
        transport.write_error_line("oops").unwrap();

        assert_eq!(out.contents(), "hello\n");
        assert_eq!(err.contents(), "oops\n");
    }

    #[test]
    fn test_write_retries_would_block_and_partial_writes() {
        let out = SharedOutput::new();
        let flaky = Flaky {
            inner: out.clone(),
            calls: 0,
        };
        let transport = LineTransport::new(MemoryInput::new(), flaky, SharedOutput::new());

        transport.write_line("retry me").unwrap();

        assert_eq!(out.contents(), "retry me\n");
    }

    #[test]
    fn test_write_propagates_other_errors() {
        let transport = LineTransport::new(MemoryInput::new(), Broken, SharedOutput::new());

        let err = transport.write_line("lost").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_read_line_reassembles_split_lines() {
        let input = MemoryInput::new();
        input.push_chunk("he");
        input.push_chunk("llo\nwo");
        input.push_chunk("rld\n");
        let (transport, _, _) = transport(input, 1024);

        assert_eq!(transport.read_line().unwrap().as_deref(), Some("hello"));
        assert_eq!(transport.buffered(), 2);
        assert_eq!(transport.read_line().unwrap().as_deref(), Some("world"));
        assert_eq!(transport.read_line().unwrap(), None);
    }

    #[test]
    fn test_end_of_stream_is_not_an_empty_line() {
        let input = MemoryInput::new();
        input.push_chunk("\n");
        let (transport, _, _) = transport(input, 4);

        assert_eq!(transport.read_line().unwrap().as_deref(), Some(""));
        assert_eq!(transport.read_line().unwrap(), None);
    }

    #[test]
    fn test_trailing_partial_line_is_dropped_at_eof() {
        let input = MemoryInput::new();
        input.push_chunk("done\nhalf");
        let (transport, _, _) = transport(input, 3);

        assert_eq!(transport.read_line().unwrap().as_deref(), Some("done"));
        assert_eq!(transport.read_line().unwrap(), None);
        assert_eq!(transport.buffered(), 4);
    }

    #[tokio::test]
    async fn test_read_line_async_reassembles() {
        let input = MemoryInput::new();
        input.push_chunk("ab");
        input.push_chunk("c\nd\n");
        let (transport, _, _) = transport(input, 1);

        assert_eq!(transport.read_line_async().await.unwrap().as_deref(), Some("abc"));
        assert_eq!(transport.read_line_async().await.unwrap().as_deref(), Some("d"));
        assert_eq!(transport.read_line_async().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blocking_and_suspending_share_the_buffer() {
        let input = MemoryInput::new();
        input.push_chunk("one\ntwo\n");
        let (transport, _, _) = transport(input, 1024);

        assert_eq!(transport.read_line_async().await.unwrap().as_deref(), Some("one"));
        assert_eq!(transport.read_line().unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_suspended_read_sees_line_left_by_blocking_read() {
        let (transport, _, _) = transport(MemoryInput::from_lines(["a\nb"]), 1024);

        // The blocking read drains the input while the suspending one waits.
        let (suspended, blocking) =
            tokio::join!(transport.read_line_async(), async { transport.read_line() });

        assert_eq!(blocking.unwrap().as_deref(), Some("a"));
        assert_eq!(suspended.unwrap().as_deref(), Some("b"));
        assert_eq!(transport.buffered(), 0);
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let (transport, _, _) = transport(MemoryInput::new(), 0);
        assert_eq!(transport.chunk_size(), 1);
    }
}
