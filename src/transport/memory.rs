//! In-memory endpoints for tests and demos.
//!
//! [`MemoryInput`] replays scripted chunks; each read hands out at most one
//! scripted chunk (or the part of it that fits), so tests control exactly
//! where chunk boundaries fall. An input made with [`MemoryInput::open`]
//! behaves like a live pipe: suspending reads wait for more data until
//! [`MemoryInput::close`]. [`SharedOutput`] captures written bytes and can be
//! inspected through any of its clones.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;

use bytes::Bytes;
use tokio::sync::Notify;

use super::source::{ChunkSource, LocalBoxFuture};

/// Scripted input. End-of-stream once every chunk has been read, unless
/// the input was opened and not yet closed.
#[derive(Debug, Clone)]
pub struct MemoryInput {
    chunks: Rc<RefCell<VecDeque<Vec<u8>>>>,
    closed: Rc<Cell<bool>>,
    held: Rc<Cell<bool>>,
    notify: Rc<Notify>,
}

impl MemoryInput {
    /// Create an empty input (immediately at end-of-stream).
    pub fn new() -> Self {
        Self {
            chunks: Rc::default(),
            closed: Rc::new(Cell::new(true)),
            held: Rc::default(),
            notify: Rc::default(),
        }
    }

    /// Create an input whose suspending reads wait for data until closed.
    ///
    /// Blocking reads never wait: with nothing queued they report
    /// end-of-stream.
    pub fn open() -> Self {
        let input = Self::new();
        input.closed.set(false);
        input
    }

    /// Create an input delivering each line, `\n` appended, as its own chunk.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let input = Self::new();
        for line in lines {
            input.push_line(line.as_ref());
        }
        input
    }

    /// Queue a raw chunk.
    pub fn push_chunk(&self, data: impl AsRef<[u8]>) {
        self.chunks.borrow_mut().push_back(data.as_ref().to_vec());
        self.notify.notify_waiters();
    }

    /// Queue a line as one chunk.
    pub fn push_line(&self, line: &str) {
        self.push_chunk(format!("{line}\n"));
    }

    /// Keep queued data away from suspending reads until [`release`].
    ///
    /// Blocking reads still see everything, as when a synchronous read on a
    /// pipe wins over a pending background read.
    ///
    /// [`release`]: MemoryInput::release
    pub fn hold(&self) {
        self.held.set(true);
    }

    /// Let suspending reads see queued data again.
    pub fn release(&self) {
        self.held.set(false);
        self.notify.notify_waiters();
    }

    /// End the stream once the queue drains. Also releases a hold.
    pub fn close(&self) {
        self.closed.set(true);
        self.held.set(false);
        self.notify.notify_waiters();
    }

    /// Number of scripted bytes not read yet.
    pub fn remaining(&self) -> usize {
        self.chunks.borrow().iter().map(Vec::len).sum()
    }

    fn pop(&self, max_len: usize) -> Option<Vec<u8>> {
        let mut chunks = self.chunks.borrow_mut();
        let mut chunk = chunks.pop_front()?;
        if chunk.len() > max_len {
            let rest = chunk.split_off(max_len);
            chunks.push_front(rest);
        }
        Some(chunk)
    }
}

impl Default for MemoryInput {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkSource for MemoryInput {
    fn read_chunk(&self, buf: &mut [u8]) -> io::Result<usize> {
        let chunk = self.pop(buf.len()).unwrap_or_default();
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }

    fn read_chunk_async(&self, max_len: usize) -> LocalBoxFuture<'static, io::Result<Bytes>> {
        let input = self.clone();
        Box::pin(async move {
            tokio::task::yield_now().await;
            loop {
                // Registered before the checks so a push in between still wakes us.
                let notified = input.notify.notified();
                if !input.held.get() {
                    if let Some(chunk) = input.pop(max_len) {
                        return Ok(Bytes::from(chunk));
                    }
                    if input.closed.get() {
                        return Ok(Bytes::new());
                    }
                }
                notified.await;
            }
        })
    }
}

/// Captured output shared between clones.
#[derive(Debug, Clone, Default)]
pub struct SharedOutput {
    data: Rc<RefCell<Vec<u8>>>,
}

impl SharedOutput {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.data.borrow()).into_owned()
    }

    /// Everything written so far, split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
