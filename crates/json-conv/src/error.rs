//! Error type shared by every reader, writer, builder and codec.

use std::fmt;

use json_conv_buffers::BufferError;
use thiserror::Error;

/// Where in the input an error was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Byte offset into a binary input.
    Offset(usize),
    /// One-based line and column into a text input.
    LineColumn { line: usize, column: usize },
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Offset(x) => write!(f, "byte offset {x}"),
            Position::LineColumn { line, column } => write!(f, "line {line}, column {column}"),
        }
    }
}

/// What went wrong.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input ended before a fixed-width or length-prefixed field did.
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unsupported BSON element type: 0x{0:02x}")]
    UnsupportedType(u8),
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("invalid length prefix: {0}")]
    InvalidLength(i32),
    /// Malformed text input.
    #[error("syntax error: {0}")]
    Syntax(&'static str),
    /// An event arrived out of the event grammar.
    #[error("structural violation: {0}")]
    Structure(&'static str),
    #[error("maximum nesting depth of {0} exceeded")]
    DepthExceeded(usize),
    /// The document shape does not fit the requested Rust type.
    #[error("expected {expected}, found {found}")]
    Conversion {
        expected: &'static str,
        found: &'static str,
    },
    /// The target format cannot represent the event stream.
    #[error("cannot encode: {0}")]
    Unencodable(&'static str),
    #[error("read failed: {0}")]
    Io(std::io::ErrorKind),
}

impl From<BufferError> for ErrorKind {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::EndOfBuffer => ErrorKind::UnexpectedEof,
            BufferError::InvalidUtf8 => ErrorKind::InvalidUtf8,
            BufferError::Io(kind) => ErrorKind::Io(kind),
        }
    }
}

/// An [`ErrorKind`] plus the input position it was detected at, when known.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}{}", .position.map(|p| format!(" at {p}")).unwrap_or_default())]
pub struct Error {
    kind: ErrorKind,
    position: Option<Position>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            position: None,
        }
    }

    pub fn at(kind: ErrorKind, position: Position) -> Self {
        Self {
            kind,
            position: Some(position),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Attaches `position` unless the error already carries one.
    pub(crate) fn or_at(mut self, position: Position) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }

    pub(crate) fn structure(what: &'static str) -> Self {
        Self::new(ErrorKind::Structure(what))
    }

    pub(crate) fn conversion(expected: &'static str, found: &'static str) -> Self {
        Self::new(ErrorKind::Conversion { expected, found })
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position_when_known() {
        let err = Error::at(ErrorKind::UnexpectedEof, Position::Offset(12));
        assert_eq!(err.to_string(), "unexpected end of input at byte offset 12");

        let err = Error::at(
            ErrorKind::Syntax("expected ':'"),
            Position::LineColumn { line: 2, column: 5 },
        );
        assert_eq!(
            err.to_string(),
            "syntax error: expected ':' at line 2, column 5"
        );

        let err = Error::new(ErrorKind::UnsupportedType(0x07));
        assert_eq!(err.to_string(), "unsupported BSON element type: 0x07");
    }

    #[test]
    fn or_at_keeps_the_first_position() {
        let err = Error::at(ErrorKind::UnexpectedEof, Position::Offset(3))
            .or_at(Position::Offset(9));
        assert_eq!(err.position(), Some(Position::Offset(3)));

        let err = Error::structure("stray name").or_at(Position::Offset(9));
        assert_eq!(err.position(), Some(Position::Offset(9)));
    }

    #[test]
    fn buffer_errors_map_to_kinds() {
        assert_eq!(
            ErrorKind::from(BufferError::EndOfBuffer),
            ErrorKind::UnexpectedEof
        );
        assert_eq!(
            ErrorKind::from(BufferError::Io(std::io::ErrorKind::BrokenPipe)),
            ErrorKind::Io(std::io::ErrorKind::BrokenPipe)
        );
    }
}
