//! Pull-style byte sources with cursor tracking.

use std::io::{ErrorKind, Read};

use crate::BufferError;

/// Largest chunk copied at once by [`ByteSource::try_vec`]. Length prefixes
/// come from untrusted input, so allocation grows with the bytes actually
/// read rather than with the declared length.
const CHUNK: usize = 8 * 1024;

/// A source of bytes consumed front to back.
///
/// Implementations must report short reads accurately: `read` returns fewer
/// bytes than requested only when the input is exhausted.
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes into `buf` and returns the number of
    /// bytes actually read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BufferError>;

    /// Reads one byte, or `None` at end of input.
    fn read_byte(&mut self) -> Result<Option<u8>, BufferError>;

    /// Number of bytes consumed so far.
    fn position(&self) -> usize;

    /// Fills `buf` completely or fails with [`BufferError::EndOfBuffer`].
    fn try_fill(&mut self, buf: &mut [u8]) -> Result<(), BufferError> {
        if self.read(buf)? == buf.len() {
            Ok(())
        } else {
            Err(BufferError::EndOfBuffer)
        }
    }

    fn try_u8(&mut self) -> Result<u8, BufferError> {
        self.read_byte()?.ok_or(BufferError::EndOfBuffer)
    }

    /// Reads a signed 32-bit integer (little-endian).
    fn try_i32_le(&mut self) -> Result<i32, BufferError> {
        let mut buf = [0u8; 4];
        self.try_fill(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// Reads a signed 64-bit integer (little-endian).
    fn try_i64_le(&mut self) -> Result<i64, BufferError> {
        let mut buf = [0u8; 8];
        self.try_fill(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    /// Reads an unsigned 64-bit integer (little-endian).
    fn try_u64_le(&mut self) -> Result<u64, BufferError> {
        let mut buf = [0u8; 8];
        self.try_fill(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads a 64-bit float (little-endian).
    fn try_f64_le(&mut self) -> Result<f64, BufferError> {
        let mut buf = [0u8; 8];
        self.try_fill(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    /// Reads exactly `len` bytes into a fresh vector.
    fn try_vec(&mut self, len: usize) -> Result<Vec<u8>, BufferError> {
        let mut out = Vec::with_capacity(len.min(CHUNK));
        let mut chunk = [0u8; CHUNK];
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(CHUNK);
            self.try_fill(&mut chunk[..n])?;
            out.extend_from_slice(&chunk[..n]);
            remaining -= n;
        }
        Ok(out)
    }

    /// Reads exactly `len` bytes and validates them as UTF-8.
    fn try_utf8(&mut self, len: usize) -> Result<String, BufferError> {
        let bytes = self.try_vec(len)?;
        String::from_utf8(bytes).map_err(|_| BufferError::InvalidUtf8)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BufferError> {
        (**self).read(buf)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, BufferError> {
        (**self).read_byte()
    }

    fn position(&self) -> usize {
        (**self).position()
    }
}

/// A byte source over a borrowed slice.
///
/// # Example
///
/// ```
/// use json_conv_buffers::{ByteSource, SliceSource};
///
/// let data = [0x01, 0x00, 0x00, 0x00, 0xff];
/// let mut source = SliceSource::new(&data);
///
/// assert_eq!(source.try_i32_le().unwrap(), 1);
/// assert_eq!(source.read_byte().unwrap(), Some(0xff));
/// assert_eq!(source.read_byte().unwrap(), None);
/// ```
pub struct SliceSource<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(uint8: &'a [u8]) -> Self {
        Self { uint8, x: 0 }
    }

    /// Returns the number of remaining bytes.
    pub fn size(&self) -> usize {
        self.uint8.len() - self.x
    }
}

impl ByteSource for SliceSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BufferError> {
        let n = buf.len().min(self.size());
        buf[..n].copy_from_slice(&self.uint8[self.x..self.x + n]);
        self.x += n;
        Ok(n)
    }

    #[inline]
    fn read_byte(&mut self) -> Result<Option<u8>, BufferError> {
        let byte = self.uint8.get(self.x).copied();
        if byte.is_some() {
            self.x += 1;
        }
        Ok(byte)
    }

    fn position(&self) -> usize {
        self.x
    }

    fn try_vec(&mut self, len: usize) -> Result<Vec<u8>, BufferError> {
        if len > self.size() {
            return Err(BufferError::EndOfBuffer);
        }
        let out = self.uint8[self.x..self.x + len].to_vec();
        self.x += len;
        Ok(out)
    }
}

/// A byte source over any [`Read`] implementation.
///
/// Every call goes straight to the inner reader, so wrap unbuffered inputs
/// (files, sockets) in a [`std::io::BufReader`].
pub struct IoSource<R> {
    inner: R,
    x: usize,
}

impl<R: Read> IoSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, x: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BufferError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(BufferError::Io(e.kind())),
            }
        }
        self.x += filled;
        Ok(filled)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, BufferError> {
        let mut b = [0u8; 1];
        match self.read(&mut b)? {
            0 => Ok(None),
            _ => Ok(Some(b[0])),
        }
    }

    fn position(&self) -> usize {
        self.x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_reads_little_endian() {
        let mut data = Vec::new();
        data.extend_from_slice(&(-1i32).to_le_bytes());
        data.extend_from_slice(&0x0102_0304_0506_0708u64.to_le_bytes());
        data.extend_from_slice(&1.5f64.to_le_bytes());
        let mut source = SliceSource::new(&data);
        assert_eq!(source.try_i32_le(), Ok(-1));
        assert_eq!(source.try_u64_le(), Ok(0x0102_0304_0506_0708));
        assert_eq!(source.try_f64_le(), Ok(1.5));
        assert_eq!(source.position(), 20);
        assert_eq!(source.read_byte(), Ok(None));
    }

    #[test]
    fn short_reads_are_reported() {
        let data = [1u8, 2, 3];
        let mut source = SliceSource::new(&data);
        let mut buf = [0u8; 8];
        assert_eq!(source.read(&mut buf), Ok(3));
        assert_eq!(&buf[..3], &[1, 2, 3]);

        let mut source = SliceSource::new(&data);
        assert_eq!(source.try_i32_le(), Err(BufferError::EndOfBuffer));

        let mut source = SliceSource::new(&data);
        assert_eq!(source.try_vec(4), Err(BufferError::EndOfBuffer));
        assert_eq!(source.position(), 0);
    }

    #[test]
    fn io_source_matches_slice_source() {
        let data: Vec<u8> = (0..=255u8).cycle().take(20_000).collect();
        let mut source = IoSource::new(&data[..]);
        assert_eq!(source.try_u8(), Ok(0));
        let rest = source.try_vec(data.len() - 1).unwrap();
        assert_eq!(rest, &data[1..]);
        assert_eq!(source.position(), data.len());
        assert_eq!(source.read_byte(), Ok(None));
        assert_eq!(source.try_vec(1), Err(BufferError::EndOfBuffer));
    }

    #[test]
    fn io_source_propagates_read_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::ConnectionReset, "reset"))
            }
        }
        let mut source = IoSource::new(Broken);
        assert_eq!(
            source.read_byte(),
            Err(BufferError::Io(ErrorKind::ConnectionReset))
        );
    }

    #[test]
    fn try_utf8_rejects_invalid_sequences() {
        let data = [0xff, 0xfe];
        let mut source = SliceSource::new(&data);
        assert_eq!(source.try_utf8(2), Err(BufferError::InvalidUtf8));
    }
}
