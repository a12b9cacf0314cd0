//! BSON document reader.
//!
//! Decoding is a pull state machine over three productions: *document*,
//! *element list* and *element*. Each call to
//! [`EventReader::next_event`] consumes exactly the bytes of one event, so
//! the same reader drives both the [`ValueBuilder`](crate::ValueBuilder)
//! and the typed codec without materializing anything in between.

use json_conv_buffers::{BufferError, ByteSource};
use tracing::{debug, trace};

use super::constants::*;
use crate::error::{Error, ErrorKind, Position, Result};
use crate::event::{Event, EventReader, SemanticTag};
use crate::DEFAULT_MAX_DEPTH;

/// Reader limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BsonReaderOptions {
    /// Maximum number of simultaneously open documents and arrays.
    pub max_depth: usize,
    /// Expect a subtype byte between a binary element's length and its
    /// payload, as in MongoDB BSON. Off by default: binary is `int32 L`
    /// followed by `L` bytes.
    pub binary_subtype: bool,
}

impl Default for BsonReaderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            binary_subtype: false,
        }
    }
}

impl BsonReaderOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_binary_subtype(mut self, binary_subtype: bool) -> Self {
        self.binary_subtype = binary_subtype;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Document,
    Array,
}

/// Reads one BSON document from a [`ByteSource`] and yields its events.
///
/// The declared document length is only a hint: the reader never slices by
/// it and keeps going until the element list terminator. Every short read
/// is fatal, and so is an element type it does not know, because skipping
/// an element of unknown size would desynchronize the stream.
///
/// ```
/// use json_conv::bson::BsonReader;
/// use json_conv::{EventReader, Value, ValueBuilder};
/// use json_conv_buffers::SliceSource;
///
/// // {"a": 1}
/// let bytes = [12, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0];
/// let mut reader = BsonReader::new(SliceSource::new(&bytes));
/// let mut builder = ValueBuilder::new();
/// reader.accept(&mut builder).unwrap();
/// assert_eq!(builder.into_value().unwrap()["a"], Value::Int(1));
/// ```
pub struct BsonReader<S> {
    source: S,
    stack: Vec<Container>,
    /// Tag of a document element whose name was just emitted.
    pending: Option<u8>,
    started: bool,
    max_depth: usize,
    binary_subtype: bool,
}

impl<S: ByteSource> BsonReader<S> {
    pub fn new(source: S) -> Self {
        Self::with_options(source, BsonReaderOptions::default())
    }

    pub fn with_options(source: S, options: BsonReaderOptions) -> Self {
        Self {
            source,
            stack: Vec::new(),
            pending: None,
            started: false,
            max_depth: options.max_depth,
            binary_subtype: options.binary_subtype,
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn offset(&self) -> Position {
        Position::Offset(self.source.position())
    }

    fn fail(&self, kind: ErrorKind) -> Error {
        Error::at(kind, self.offset())
    }

    /// Runs one source read, attaching the offset it stopped at on failure.
    fn read_with<T>(
        &mut self,
        read: impl FnOnce(&mut S) -> std::result::Result<T, BufferError>,
    ) -> Result<T> {
        let res = read(&mut self.source);
        res.map_err(|e| self.fail(e.into()))
    }

    fn enter(&mut self, container: Container) -> Result<()> {
        if self.stack.len() >= self.max_depth {
            debug!(max_depth = self.max_depth, "BSON nesting limit reached");
            return Err(self.fail(ErrorKind::DepthExceeded(self.max_depth)));
        }
        self.stack.push(container);
        Ok(())
    }

    /// Reads an `int32` length prefix, rejecting negative values.
    fn read_length(&mut self, min: i32) -> Result<usize> {
        let at = self.offset();
        let len = self.read_with(|s| s.try_i32_le())?;
        if len < min {
            return Err(Error::at(ErrorKind::InvalidLength(len), at));
        }
        // `len >= min >= 0` here.
        Ok(len as usize)
    }

    /// *document*: length hint, then an element list.
    fn read_document(&mut self) -> Result<Event> {
        let at = self.source.position();
        let declared = self.read_with(|s| s.try_i32_le())?;
        trace!(offset = at, declared, "BSON document");
        self.enter(Container::Document)?;
        Ok(Event::BeginObject)
    }

    fn read_array(&mut self) -> Result<Event> {
        let at = self.source.position();
        let declared = self.read_with(|s| s.try_i32_le())?;
        trace!(offset = at, declared, "BSON array");
        self.enter(Container::Array)?;
        Ok(Event::BeginArray)
    }

    /// One step of *element list*: either its terminator or the start of the
    /// next *element*.
    fn read_element(&mut self, container: Container) -> Result<Event> {
        let at = self.offset();
        let tag = self.read_with(|s| s.try_u8())?;
        if tag == 0x00 {
            self.stack.pop();
            return Ok(match container {
                Container::Document => Event::EndObject,
                Container::Array => Event::EndArray,
            });
        }
        if !is_supported(tag) {
            debug!(tag, "unsupported BSON element type");
            return Err(Error::at(ErrorKind::UnsupportedType(tag), at));
        }
        let name = self.read_cstring()?;
        match container {
            Container::Document => {
                self.pending = Some(tag);
                Ok(Event::Name(name))
            }
            // Array element names are positional; the index is implicit.
            Container::Array => self.read_value(tag),
        }
    }

    fn read_cstring(&mut self) -> Result<String> {
        let at = self.offset();
        let mut bytes = Vec::new();
        loop {
            match self.read_with(|s| s.read_byte())? {
                Some(0) => break,
                Some(b) => bytes.push(b),
                None => return Err(self.fail(ErrorKind::UnexpectedEof)),
            }
        }
        String::from_utf8(bytes).map_err(|_| Error::at(ErrorKind::InvalidUtf8, at))
    }

    /// `int32` length including the trailing NUL, the text, then the NUL.
    fn read_string(&mut self) -> Result<String> {
        let len = self.read_length(1)?;
        let at = self.offset();
        let s = self
            .source
            .try_utf8(len - 1)
            .map_err(|e| Error::at(e.into(), at))?;
        if self.read_with(|s| s.try_u8())? != 0x00 {
            return Err(self.fail(ErrorKind::Syntax("string is not NUL-terminated")));
        }
        Ok(s)
    }

    fn read_binary(&mut self) -> Result<Vec<u8>> {
        let len = self.read_length(0)?;
        if self.binary_subtype {
            let _subtype = self.read_with(|s| s.try_u8())?;
        }
        self.read_with(|s| s.try_vec(len))
    }

    fn read_value(&mut self, tag: u8) -> Result<Event> {
        let tagged = SemanticTag::None;
        let event = match tag {
            DOUBLE => Event::DoubleValue(self.read_with(|s| s.try_f64_le())?, tagged),
            STRING => Event::StringValue(self.read_string()?, tagged),
            DOCUMENT => self.read_document()?,
            ARRAY => self.read_array()?,
            BINARY => Event::ByteStringValue(self.read_binary()?, tagged),
            BOOL => Event::BoolValue(self.read_with(|s| s.try_u8())? != 0, tagged),
            DATETIME => Event::Int64Value(
                self.read_with(|s| s.try_i64_le())?,
                SemanticTag::EpochMilli,
            ),
            NULL => Event::NullValue(tagged),
            INT32 => Event::Int64Value(self.read_with(|s| s.try_i32_le())? as i64, tagged),
            TIMESTAMP => Event::UInt64Value(
                self.read_with(|s| s.try_u64_le())?,
                SemanticTag::EpochTime,
            ),
            INT64 => Event::Int64Value(self.read_with(|s| s.try_i64_le())?, tagged),
            other => return Err(self.fail(ErrorKind::UnsupportedType(other))),
        };
        Ok(event)
    }
}

impl<S: ByteSource> EventReader for BsonReader<S> {
    fn next_event(&mut self) -> Result<Option<Event>> {
        if !self.started {
            self.started = true;
            return self.read_document().map(Some);
        }
        if let Some(tag) = self.pending.take() {
            return self.read_value(tag).map(Some);
        }
        match self.stack.last() {
            Some(&container) => self.read_element(container).map(Some),
            None => Ok(None),
        }
    }

    fn position(&self) -> Position {
        self.offset()
    }
}
