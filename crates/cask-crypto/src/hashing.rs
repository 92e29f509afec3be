use std::io::{self, Read, Write};

use sha2::digest::{Digest, Output};

/// Reader that folds every byte it passes through into a running digest.
///
/// Bytes are returned unmodified. Once the source reports end-of-stream the
/// reader stays exhausted: further reads return `Ok(0)` without touching the
/// source again.
pub struct HashingReader<R, D: Digest> {
    inner: R,
    hasher: D,
    bytes_read: u64,
    eof: bool,
}

impl<R: Read, D: Digest> HashingReader<R, D> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: D::new(),
            bytes_read: 0,
            eof: false,
        }
    }

    /// Total bytes handed out so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Digest over everything read so far. Does not disturb the running state.
    pub fn sum(&self) -> Vec<u8>
    where
        D: Clone,
    {
        self.hasher.clone().finalize().to_vec()
    }

    /// Append the current digest to `prefix`.
    pub fn append_sum(&self, prefix: &mut Vec<u8>)
    where
        D: Clone,
    {
        prefix.extend_from_slice(&self.hasher.clone().finalize());
    }

    /// Consume the reader, returning the source and the final digest.
    pub fn finalize(self) -> (R, Output<D>) {
        (self.inner, self.hasher.finalize())
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

impl<R: Read, D: Digest> Read for HashingReader<R, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.eof || buf.is_empty() {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 {
            self.eof = true;
            return Ok(0);
        }
        self.hasher.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// Writer that forwards bytes to `inner` and folds them into a running digest.
///
/// Only the bytes the sink actually accepted are hashed, so a short write
/// never makes the digest run ahead of the data.
pub struct HashingWriter<W, D: Digest> {
    inner: W,
    hasher: D,
    size: u64,
}

impl<W: Write, D: Digest> HashingWriter<W, D> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: D::new(),
            size: 0,
        }
    }

    /// Total bytes written through this writer.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Digest over everything written so far.
    pub fn sum(&self) -> Vec<u8>
    where
        D: Clone,
    {
        self.hasher.clone().finalize().to_vec()
    }

    /// Append the current digest to `prefix`.
    pub fn append_sum(&self, prefix: &mut Vec<u8>)
    where
        D: Clone,
    {
        prefix.extend_from_slice(&self.hasher.clone().finalize());
    }

    /// Consume the writer, returning the sink and the final digest.
    pub fn finalize(self) -> (W, Output<D>) {
        (self.inner, self.hasher.finalize())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write, D: Digest> Write for HashingWriter<W, D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
