//! In-process byte pipe connecting a blocking codec to an async transfer.
//!
//! The pipe is a bounded channel of byte chunks, so a fast producer waits for
//! the consumer. Dropping either end releases the other: writes to a pipe
//! whose reader is gone fail with `BrokenPipe`, and a reader whose writer is
//! gone sees end-of-stream. A producer that fails should call
//! [`PipeWriter::fail`] so the consumer sees the error instead of a clean EOF.

use std::io::{self, Read, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use futures::Stream;
use tokio::sync::mpsc;

/// Chunks buffered between producer and consumer.
pub const PIPE_CAPACITY: usize = 16;

/// Suggested write size for producers wrapping the writer in a `BufWriter`.
pub const PIPE_CHUNK_SIZE: usize = 64 * 1024;

type Chunk = io::Result<Bytes>;

/// Create a connected writer/reader pair.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PipeWriter { tx },
        PipeReader {
            rx,
            pending: Bytes::new(),
        },
    )
}

fn reader_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed")
}

/// Producer end of a [`pipe`].
///
/// Implements [`Write`] for use on a blocking thread; async producers use
/// [`send`](Self::send).
#[derive(Debug)]
pub struct PipeWriter {
    tx: mpsc::Sender<Chunk>,
}

impl PipeWriter {
    /// Send one chunk from async code.
    pub async fn send(&self, chunk: Bytes) -> io::Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx.send(Ok(chunk)).await.map_err(|_| reader_gone())
    }

    /// Close the pipe with an error (blocking context).
    pub fn fail(self, err: io::Error) {
        let _ = self.tx.blocking_send(Err(err));
    }

    /// Close the pipe with an error (async context).
    pub async fn fail_async(self, err: io::Error) {
        let _ = self.tx.send(Err(err)).await;
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| reader_gone())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Consumer end of a [`pipe`].
///
/// Implements [`Read`] for blocking consumers and [`Stream`] for async ones
/// such as an HTTP request body.
#[derive(Debug)]
pub struct PipeReader {
    rx: mpsc::Receiver<Chunk>,
    pending: Bytes,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending.is_empty() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) => self.pending = chunk,
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}

impl Stream for PipeReader {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if !this.pending.is_empty() {
            return Poll::Ready(Some(Ok(std::mem::take(&mut this.pending))));
        }
        this.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::thread;

    #[test]
    fn test_blocking_roundtrip_across_threads() {
        let (mut writer, mut reader) = pipe(2);
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let expected = data.clone();

        let producer = thread::spawn(move || {
            for chunk in data.chunks(7_000) {
                writer.write_all(chunk).unwrap();
            }
        });

        let mut received = Vec::new();
        reader.read_to_end(&mut received).unwrap();
        producer.join().unwrap();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_dropped_reader_breaks_writer() {
        let (mut writer, reader) = pipe(1);
        drop(reader);
        let err = writer.write(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_failure_reaches_reader() {
        let (mut writer, mut reader) = pipe(4);
        writer.write_all(b"partial").unwrap();
        writer.fail(io::Error::other("producer exploded"));

        let mut buf = Vec::new();
        let err = reader.read_to_end(&mut buf).unwrap_err();
        assert!(err.to_string().contains("producer exploded"));
    }

    #[tokio::test]
    async fn test_async_stream_side() {
        let (mut writer, reader) = pipe(4);
        let producer = tokio::task::spawn_blocking(move || {
            writer.write_all(b"hello ").unwrap();
            writer.write_all(b"world").unwrap();
        });

        let chunks: Vec<_> = reader.collect().await;
        producer.await.unwrap();
        let joined: Vec<u8> = chunks
            .into_iter()
            .flat_map(|c| c.unwrap().to_vec())
            .collect();
        assert_eq!(joined, b"hello world");
    }
}
