//! Stream compressors wrapped around tar archives.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzipLevel;
use std::io::{self, BufReader, Read, Write};

/// Zstd level used for archive creation.
const ZSTD_LEVEL: i32 = 3;

/// Outer compression applied to a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarCompression {
    Gzip,
    Zstd,
}

/// Compressing writer. Must be closed with [`finish`](Self::finish) so the
/// trailing frame reaches the inner writer.
pub struct CompressedWriter<W: Write> {
    inner: CompressedWriterInner<W>,
}

enum CompressedWriterInner<W: Write> {
    Gzip(GzEncoder<W>),
    Zstd(zstd::Encoder<'static, W>),
}

impl<W: Write> CompressedWriter<W> {
    pub fn new(writer: W, compression: TarCompression) -> io::Result<Self> {
        let inner = match compression {
            TarCompression::Gzip => {
                CompressedWriterInner::Gzip(GzEncoder::new(writer, GzipLevel::default()))
            }
            TarCompression::Zstd => {
                CompressedWriterInner::Zstd(zstd::Encoder::new(writer, ZSTD_LEVEL)?)
            }
        };
        Ok(Self { inner })
    }

    /// Flush the compressor trailer and return the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self.inner {
            CompressedWriterInner::Gzip(w) => w.finish(),
            CompressedWriterInner::Zstd(w) => w.finish(),
        }
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            CompressedWriterInner::Gzip(w) => w.write(buf),
            CompressedWriterInner::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            CompressedWriterInner::Gzip(w) => w.flush(),
            CompressedWriterInner::Zstd(w) => w.flush(),
        }
    }
}

/// Decompressing reader.
pub struct CompressedReader<R: Read> {
    inner: CompressedReaderInner<R>,
}

enum CompressedReaderInner<R: Read> {
    Gzip(GzDecoder<R>),
    Zstd(zstd::Decoder<'static, BufReader<R>>),
}

impl<R: Read> CompressedReader<R> {
    pub fn new(reader: R, compression: TarCompression) -> io::Result<Self> {
        let inner = match compression {
            TarCompression::Gzip => CompressedReaderInner::Gzip(GzDecoder::new(reader)),
            TarCompression::Zstd => CompressedReaderInner::Zstd(zstd::Decoder::new(reader)?),
        };
        Ok(Self { inner })
    }
}

impl<R: Read> Read for CompressedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            CompressedReaderInner::Gzip(r) => r.read(buf),
            CompressedReaderInner::Zstd(r) => r.read(buf),
        }
    }
}
