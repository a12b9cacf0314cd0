//! Byte-level plumbing shared by the json-conv readers and writers.
//!
//! - [`ByteSource`] is the pull interface decoders read from. It reports
//!   short reads exactly and never zero-fills.
//! - [`SliceSource`] reads from a borrowed byte slice.
//! - [`IoSource`] reads from any [`std::io::Read`].
//! - [`Writer`] is a growable output buffer with little-endian helpers and
//!   length back-patching.

mod source;
mod writer;

pub use source::{ByteSource, IoSource, SliceSource};
pub use writer::Writer;

use thiserror::Error;

/// Errors raised by byte sources.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Fewer bytes were available than the caller required.
    #[error("end of buffer")]
    EndOfBuffer,
    #[error("invalid UTF-8")]
    InvalidUtf8,
    /// The underlying reader failed for a reason other than end of input.
    #[error("read failed: {0}")]
    Io(std::io::ErrorKind),
}
