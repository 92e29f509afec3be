//! Self-verifying streams: `data ++ digest(data)`.
//!
//! A stream produced by [`HashAppendWriter`] or [`HashAppendReader`] carries
//! its own integrity check as a fixed-width trailer, so a receiver can verify
//! content while it streams without any side-channel metadata.

use std::io::{self, Read, Write};

use sha2::digest::{Digest, Output};

/// Writer that appends the digest of everything written when closed.
///
/// Dropping the writer without calling [`close`](Self::close) leaves the
/// stream without a trailer.
pub struct HashAppendWriter<W, D: Digest> {
    inner: W,
    hasher: Option<D>,
}

impl<W: Write, D: Digest> HashAppendWriter<W, D> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Some(D::new()),
        }
    }

    /// Width of the trailer emitted on close.
    pub fn trailer_len() -> usize {
        <D as Digest>::output_size()
    }

    pub fn is_closed(&self) -> bool {
        self.hasher.is_none()
    }

    /// Write the digest trailer and flush. The stream shape is fixed afterwards.
    pub fn close(&mut self) -> io::Result<()> {
        let hasher = self
            .hasher
            .take()
            .ok_or_else(|| io::Error::other("hash append writer already closed"))?;
        self.inner.write_all(&hasher.finalize())?;
        self.inner.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write, D: Digest> Write for HashAppendWriter<W, D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let hasher = self
            .hasher
            .as_mut()
            .ok_or_else(|| io::Error::other("write after close"))?;
        let n = self.inner.write(buf)?;
        hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Position of a [`HashAppendReader`] in its output stream.
enum Phase<D: Digest> {
    /// Passing source bytes through while hashing them.
    Data(D),
    /// Source exhausted; draining the finalized digest.
    Trailer { digest: Output<D>, pos: usize },
    Exhausted,
}

/// Reader that yields the source data followed by the digest of that data.
///
/// For a source of `n` bytes the reader produces exactly
/// `n + D::output_size()` bytes and then reports end-of-stream forever.
pub struct HashAppendReader<R, D: Digest> {
    inner: R,
    phase: Phase<D>,
}

impl<R: Read, D: Digest> HashAppendReader<R, D> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            phase: Phase::Data(D::new()),
        }
    }

    /// Width of the trailer appended after the data.
    pub fn trailer_len() -> usize {
        <D as Digest>::output_size()
    }

    /// Returns `true` once both data and trailer have been fully read.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.phase, Phase::Exhausted)
    }

    fn drain_trailer(&mut self, buf: &mut [u8]) -> usize {
        let Phase::Trailer { digest, pos } = &mut self.phase else {
            return 0;
        };
        let n = (digest.len() - *pos).min(buf.len());
        buf[..n].copy_from_slice(&digest[*pos..*pos + n]);
        *pos += n;
        if *pos == digest.len() {
            self.phase = Phase::Exhausted;
        }
        n
    }
}

impl<R: Read, D: Digest> Read for HashAppendReader<R, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Phase::Data(hasher) = &mut self.phase {
            let n = self.inner.read(buf)?;
            if n > 0 {
                hasher.update(&buf[..n]);
                return Ok(n);
            }
            // End of source: finalize and serve the trailer in this same call.
            if let Phase::Data(hasher) = std::mem::replace(&mut self.phase, Phase::Exhausted) {
                self.phase = Phase::Trailer {
                    digest: hasher.finalize(),
                    pos: 0,
                };
            }
        }
        Ok(self.drain_trailer(buf))
    }
}
