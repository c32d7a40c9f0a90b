//! Input endpoints that can be read both blocking and suspending.
//!
//! The line transport needs two ways of pulling a chunk from the same input:
//! a blocking read that stalls the whole thread (used while a callback is
//! outstanding) and a suspending read that yields to the scheduler between
//! chunks (used by the top-level request loop).
//!
//! - Unix: stdin is duplicated as an owned fd
//! - Windows: stdin is duplicated as an owned handle

use std::fs::File;
use std::future::Future;
use std::io::{self, Read};
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

/// Boxed future that is not required to be `Send`.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A readable endpoint offering one-chunk reads in two flavors.
///
/// Both methods return zero bytes only at end-of-stream.
pub trait ChunkSource: 'static {
    /// Read one chunk into `buf`, blocking the current thread.
    fn read_chunk(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Read one chunk of at most `max_len` bytes, yielding while it is pending.
    fn read_chunk_async(&self, max_len: usize) -> LocalBoxFuture<'static, io::Result<Bytes>>;
}

/// File-backed input (stdin, a pipe, a regular file).
///
/// The suspending read runs the blocking read on tokio's blocking pool, so
/// it requires a tokio runtime.
#[derive(Debug, Clone)]
pub struct FileInput {
    file: Arc<File>,
}

impl FileInput {
    /// Wrap an open file. It should be opened for blocking reads.
    pub fn new(file: File) -> Self {
        Self {
            file: Arc::new(file),
        }
    }

    /// Duplicate the process's stdin.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the handle cannot be duplicated.
    #[cfg(unix)]
    pub fn stdin() -> io::Result<Self> {
        use std::os::fd::AsFd;

        let fd = io::stdin().as_fd().try_clone_to_owned()?;
        Ok(Self::new(File::from(fd)))
    }

    /// Duplicate the process's stdin.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the handle cannot be duplicated.
    #[cfg(windows)]
    pub fn stdin() -> io::Result<Self> {
        use std::os::windows::io::AsHandle;

        let handle = io::stdin().as_handle().try_clone_to_owned()?;
        Ok(Self::new(File::from(handle)))
    }
}

impl ChunkSource for FileInput {
    fn read_chunk(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self.file).read(buf)
    }

    fn read_chunk_async(&self, max_len: usize) -> LocalBoxFuture<'static, io::Result<Bytes>> {
        let file = Arc::clone(&self.file);
        Box::pin(async move {
            let task = tokio::task::spawn_blocking(move || {
                let mut buf = vec![0u8; max_len];
                let n = (&*file).read(&mut buf)?;
                buf.truncate(n);
                Ok::<_, io::Error>(Bytes::from(buf))
            });
            task.await.map_err(io::Error::other)?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write};

    fn temp_file_with(contents: &[u8]) -> File {
        let path = std::env::temp_dir().join(format!(
            "kernel-host-source-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        file.write_all(contents).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let _ = std::fs::remove_file(&path);
        file
    }

    #[test]
    fn test_blocking_chunk_read() {
        let input = FileInput::new(temp_file_with(b"abcdef"));
        let mut buf = [0u8; 4];

        assert_eq!(input.read_chunk(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(input.read_chunk(&mut buf).unwrap(), 2);
        assert_eq!(input.read_chunk(&mut buf).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_suspending_chunk_read() {
        let input = FileInput::new(temp_file_with(b"xyz"));

        let chunk = input.read_chunk_async(2).await.unwrap();
        assert_eq!(&chunk[..], b"xy");
        let chunk = input.read_chunk_async(2).await.unwrap();
        assert_eq!(&chunk[..], b"z");
        let chunk = input.read_chunk_async(2).await.unwrap();
        assert!(chunk.is_empty());
    }
}
