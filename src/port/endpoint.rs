//! Buffered endpoints over the two directions of a channel.
//!
//! [`InputEndpoint`] loads bytes from the channel into an internal buffer and
//! hands them out synchronously; [`OutputEndpoint`] queues bytes and pushes
//! them to the channel on [`OutputEndpoint::store`].
//!
//! Both `load` and `store` are cancel-safe: dropping the future between polls
//! never loses or duplicates a byte, because buffer bookkeeping happens
//! synchronously right after each native read or write returns.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default size of a single native read.
pub const DEFAULT_READ_CHUNK: usize = 256;

/// How [`InputEndpoint::load`] decides it is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputStreamOptions {
    /// Keep reading until the requested count is buffered or the stream ends.
    None,
    /// Return as soon as one native read delivers something.
    #[default]
    Partial,
}

/// Buffered reader over a channel's incoming bytes.
#[derive(Debug)]
pub struct InputEndpoint<R> {
    reader: R,
    buffered: VecDeque<u8>,
    options: InputStreamOptions,
    scratch: Box<[u8]>,
    native_reads: u64,
}

impl<R: AsyncRead + Unpin> InputEndpoint<R> {
    pub fn new(reader: R, options: InputStreamOptions, chunk_size: usize) -> Self {
        Self {
            reader,
            buffered: VecDeque::new(),
            options,
            scratch: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            native_reads: 0,
        }
    }

    /// Bytes received from the channel but not yet handed to the caller.
    pub fn unconsumed_len(&self) -> usize {
        self.buffered.len()
    }

    /// Number of native reads issued so far.
    pub fn native_reads(&self) -> u64 {
        self.native_reads
    }

    /// Make at least `count` bytes available, reading from the channel only
    /// when the buffer holds fewer than that.
    ///
    /// In [`InputStreamOptions::Partial`] mode a single native read that
    /// returns data completes the load even if fewer than `count` bytes are
    /// then buffered. Returns the number of bytes this call pulled in.
    ///
    /// End of stream with an empty buffer is an `UnexpectedEof` error; with
    /// bytes already buffered the load simply stops short.
    pub async fn load(&mut self, count: usize) -> Result<usize, PortError> {
        let mut loaded = 0;
        while self.buffered.len() < count {
            let n = self.reader.read(&mut self.scratch).await?;
            self.native_reads += 1;
            if n == 0 {
                if self.buffered.is_empty() {
                    return Err(PortError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "serial channel closed",
                    )));
                }
                break;
            }
            self.buffered.extend(&self.scratch[..n]);
            loaded += n;
            if self.options == InputStreamOptions::Partial {
                break;
            }
        }
        Ok(loaded)
    }

    /// Move up to `dst.len()` buffered bytes into `dst`. Returns the count moved.
    pub fn read_bytes(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.buffered.len());
        for (slot, byte) in dst.iter_mut().zip(self.buffered.drain(..n)) {
            *slot = byte;
        }
        n
    }

    /// Drop up to `n` buffered bytes. Returns the count dropped.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.buffered.len());
        self.buffered.drain(..n);
        n
    }

    /// Drop everything buffered. Returns the count dropped.
    pub fn discard_all(&mut self) -> usize {
        let n = self.buffered.len();
        self.buffered.clear();
        n
    }
}

/// Buffered writer over a channel's outgoing bytes.
#[derive(Debug)]
pub struct OutputEndpoint<W> {
    writer: W,
    pending: Vec<u8>,
    accepted: usize,
}

impl<W: AsyncWrite + Unpin> OutputEndpoint<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending: Vec::new(),
            accepted: 0,
        }
    }

    /// Queue bytes for the next [`store`](Self::store).
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Bytes queued but not yet accepted by the channel.
    pub fn unstored_len(&self) -> usize {
        self.pending.len()
    }

    /// Bytes the channel accepted during the most recent store, including one
    /// that was cancelled part way.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Push every queued byte to the channel and flush it.
    ///
    /// Returns the number of bytes stored.
    pub async fn store(&mut self) -> Result<usize, PortError> {
        self.accepted = 0;
        while !self.pending.is_empty() {
            let n = self.writer.write(&self.pending).await?;
            if n == 0 {
                return Err(PortError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "serial channel accepted no bytes",
                )));
            }
            self.pending.drain(..n);
            self.accepted += n;
        }
        self.writer.flush().await?;
        Ok(self.accepted)
    }

    /// Drop queued bytes the channel never accepted. Returns the count dropped.
    pub fn discard_pending(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }
}
