//! Growable output buffer with little-endian helpers.

/// A byte writer that grows automatically as needed.
///
/// Offsets returned by [`Writer::x`] stay valid until the next
/// [`Writer::flush`], which makes them usable for back-patching length
/// prefixes once the enclosed payload is known.
///
/// # Example
///
/// ```
/// use json_conv_buffers::Writer;
///
/// let mut writer = Writer::new();
/// let at = writer.x();
/// writer.i32_le(0);
/// writer.u8(0x2a);
/// writer.patch_i32_le(at, 5);
/// assert_eq!(writer.flush(), [0x05, 0x00, 0x00, 0x00, 0x2a]);
/// ```
pub struct Writer {
    /// The underlying byte buffer.
    pub uint8: Vec<u8>,
    /// Position where last flush happened.
    pub x0: usize,
    /// Current cursor position.
    pub x: usize,
    /// Allocation size when buffer needs to grow.
    alloc_size: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    /// Creates a new writer with default allocation size (4KB).
    pub fn new() -> Self {
        Self::with_alloc_size(4 * 1024)
    }

    pub fn with_alloc_size(alloc_size: usize) -> Self {
        Self {
            uint8: vec![0u8; alloc_size],
            x0: 0,
            x: 0,
            alloc_size,
        }
    }

    /// Ensures the buffer has at least `capacity` bytes available.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        let remaining = self.uint8.len() - self.x;
        if remaining < capacity {
            let total = self.uint8.len() - self.x0;
            let required = capacity - remaining;
            let total_required = total + required;
            let new_size = if total_required <= self.alloc_size {
                self.alloc_size
            } else {
                total_required * 2
            };
            self.grow(new_size);
        }
    }

    fn grow(&mut self, new_size: usize) {
        let x0 = self.x0;
        let x = self.x;
        let mut new_buf = vec![0u8; new_size];
        new_buf[..x - x0].copy_from_slice(&self.uint8[x0..x]);
        self.uint8 = new_buf;
        self.x = x - x0;
        self.x0 = 0;
    }

    /// Current write offset relative to the last flush.
    pub fn x(&self) -> usize {
        self.x - self.x0
    }

    /// Returns the written data and advances the flush position.
    pub fn flush(&mut self) -> Vec<u8> {
        let result = self.uint8[self.x0..self.x].to_vec();
        self.x0 = self.x;
        result
    }

    /// Discards everything written since the last flush.
    pub fn reset(&mut self) {
        self.x = self.x0;
    }

    #[inline]
    pub fn u8(&mut self, val: u8) {
        self.ensure_capacity(1);
        self.uint8[self.x] = val;
        self.x += 1;
    }

    /// Writes a signed 32-bit integer (little-endian).
    #[inline]
    pub fn i32_le(&mut self, val: i32) {
        self.buf(&val.to_le_bytes());
    }

    /// Writes a signed 64-bit integer (little-endian).
    #[inline]
    pub fn i64_le(&mut self, val: i64) {
        self.buf(&val.to_le_bytes());
    }

    /// Writes an unsigned 64-bit integer (little-endian).
    #[inline]
    pub fn u64_le(&mut self, val: u64) {
        self.buf(&val.to_le_bytes());
    }

    /// Writes a 64-bit float (little-endian).
    #[inline]
    pub fn f64_le(&mut self, val: f64) {
        self.buf(&val.to_le_bytes());
    }

    /// Overwrites four bytes at `at` (an offset from [`Writer::x`]) with a
    /// little-endian `i32`.
    pub fn patch_i32_le(&mut self, at: usize, val: i32) {
        let start = self.x0 + at;
        self.uint8[start..start + 4].copy_from_slice(&val.to_le_bytes());
    }

    /// Writes a byte slice.
    pub fn buf(&mut self, buf: &[u8]) {
        let length = buf.len();
        self.ensure_capacity(length);
        self.uint8[self.x..self.x + length].copy_from_slice(buf);
        self.x += length;
    }

    /// Writes a UTF-8 string. Returns the number of bytes written.
    pub fn utf8(&mut self, s: &str) -> usize {
        self.buf(s.as_bytes());
        s.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8() {
        let mut writer = Writer::new();
        writer.u8(0x01);
        writer.u8(0x02);
        assert_eq!(writer.flush(), [0x01, 0x02]);
    }

    #[test]
    fn test_little_endian_ints() {
        let mut writer = Writer::new();
        writer.i32_le(-2);
        writer.u64_le(1);
        let data = writer.flush();
        assert_eq!(&data[..4], &[0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(&data[4..], &[1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_f64_le() {
        let mut writer = Writer::new();
        writer.f64_le(-0.5);
        let data = writer.flush();
        assert_eq!(f64::from_le_bytes(data.try_into().unwrap()), -0.5);
    }

    #[test]
    fn test_flush_multiple() {
        let mut writer = Writer::new();
        writer.u8(0x01);
        assert_eq!(writer.flush(), [0x01]);
        writer.u8(0x02);
        assert_eq!(writer.flush(), [0x02]);
    }

    #[test]
    fn test_patch_after_flush_is_relative() {
        let mut writer = Writer::new();
        writer.u8(0xaa);
        writer.flush();
        let at = writer.x();
        assert_eq!(at, 0);
        writer.i32_le(0);
        writer.patch_i32_le(at, 7);
        assert_eq!(writer.flush(), [7, 0, 0, 0]);
    }

    #[test]
    fn test_grows_past_alloc_size() {
        let mut writer = Writer::with_alloc_size(4);
        let payload: Vec<u8> = (0..100).collect();
        writer.u8(0xff);
        writer.buf(&payload);
        let data = writer.flush();
        assert_eq!(data.len(), 101);
        assert_eq!(&data[1..], payload.as_slice());
    }

    #[test]
    fn test_reset_discards_pending() {
        let mut writer = Writer::new();
        writer.utf8("keep");
        writer.flush();
        writer.utf8("drop");
        writer.reset();
        assert!(writer.flush().is_empty());
    }
}
