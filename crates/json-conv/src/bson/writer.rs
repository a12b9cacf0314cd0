//! BSON document writer.

use json_conv_buffers::Writer;

use super::constants::*;
use crate::error::{Error, ErrorKind, Result};
use crate::event::{EventHandler, SemanticTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Document,
    Array,
}

/// Writer settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BsonWriterOptions {
    /// Write a generic (`0x00`) subtype byte between a binary element's
    /// length and its payload, as MongoDB BSON does.
    pub binary_subtype: bool,
}

impl BsonWriterOptions {
    pub fn with_binary_subtype(mut self, binary_subtype: bool) -> Self {
        self.binary_subtype = binary_subtype;
        self
    }
}

struct Frame {
    /// Offset of the `int32` length prefix, patched when the frame closes.
    start: usize,
    kind: Kind,
    /// Next positional name inside an array.
    next_index: usize,
}

/// An [`EventHandler`] that writes BSON.
///
/// Document and array lengths are written as placeholders and back-patched
/// on the matching end event, so output is produced in a single pass. The
/// top-level value must be an object.
///
/// Integers are written in the narrowest signed width that holds them
/// (`int32`, else `int64`); values tagged [`SemanticTag::EpochMilli`] are
/// written as UTC datetimes and unsigned integers as `0x11` timestamps.
///
/// ```
/// use json_conv::bson::BsonWriter;
/// use json_conv::{EventHandler, SemanticTag};
///
/// let mut writer = BsonWriter::new();
/// writer.begin_object().unwrap();
/// writer.name("a").unwrap();
/// writer.int64_value(1, SemanticTag::None).unwrap();
/// writer.end_object().unwrap();
/// writer.flush().unwrap();
/// assert_eq!(
///     writer.take_bytes(),
///     [12, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0]
/// );
/// ```
pub struct BsonWriter {
    writer: Writer,
    stack: Vec<Frame>,
    /// Name of the next element inside a document.
    name: Option<String>,
    root_done: bool,
    binary_subtype: bool,
}

impl Default for BsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BsonWriter {
    pub fn new() -> Self {
        Self::with_options(BsonWriterOptions::default())
    }

    pub fn with_options(options: BsonWriterOptions) -> Self {
        Self {
            writer: Writer::new(),
            stack: Vec::new(),
            name: None,
            root_done: false,
            binary_subtype: options.binary_subtype,
        }
    }

    /// Whether a complete document has been written.
    pub fn is_complete(&self) -> bool {
        self.root_done && self.stack.is_empty()
    }

    /// Returns the finished document and readies the writer for another.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        self.root_done = false;
        self.writer.flush()
    }

    /// Discards a partially written document.
    pub fn reset(&mut self) {
        self.writer.reset();
        self.stack.clear();
        self.name = None;
        self.root_done = false;
    }

    /// Writes the tag and name of the next element.
    fn element(&mut self, tag: u8) -> Result<()> {
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None if self.root_done => {
                return Err(Error::structure("more than one top-level value"))
            }
            None => {
                return Err(Error::new(ErrorKind::Unencodable(
                    "BSON top-level value must be an object",
                )))
            }
        };
        let name = match frame.kind {
            Kind::Document => self
                .name
                .take()
                .ok_or_else(|| Error::structure("object member without a name"))?,
            Kind::Array => {
                let index = frame.next_index;
                frame.next_index += 1;
                index.to_string()
            }
        };
        self.writer.u8(tag);
        self.writer.utf8(&name);
        self.writer.u8(0x00);
        Ok(())
    }

    fn open(&mut self, kind: Kind) -> Result<()> {
        if self.stack.is_empty() {
            if self.root_done {
                return Err(Error::structure("more than one top-level value"));
            }
            if kind == Kind::Array {
                return Err(Error::new(ErrorKind::Unencodable(
                    "BSON top-level value must be an object",
                )));
            }
        } else {
            self.element(match kind {
                Kind::Document => DOCUMENT,
                Kind::Array => ARRAY,
            })?;
        }
        let start = self.writer.x();
        self.writer.i32_le(0);
        self.stack.push(Frame {
            start,
            kind,
            next_index: 0,
        });
        Ok(())
    }

    fn close(&mut self, kind: Kind) -> Result<()> {
        let frame = match self.stack.last() {
            Some(frame) if frame.kind == kind => frame,
            Some(_) => return Err(Error::structure("mismatched end event")),
            None => return Err(Error::structure("end event without a matching begin")),
        };
        if self.name.is_some() {
            return Err(Error::structure("name without a value"));
        }
        let start = frame.start;
        self.writer.u8(0x00);
        let len = i32::try_from(self.writer.x() - start).map_err(|_| {
            Error::new(ErrorKind::Unencodable("document larger than the int32 length limit"))
        })?;
        self.writer.patch_i32_le(start, len);
        self.stack.pop();
        if self.stack.is_empty() {
            self.root_done = true;
        }
        Ok(())
    }

    /// `int32` length including the NUL, the bytes, then the NUL.
    fn string_payload(&mut self, s: &str) -> Result<()> {
        let len = i32::try_from(s.len() + 1)
            .map_err(|_| Error::new(ErrorKind::Unencodable("string too long for BSON")))?;
        self.writer.i32_le(len);
        self.writer.utf8(s);
        self.writer.u8(0x00);
        Ok(())
    }
}

impl EventHandler for BsonWriter {
    fn begin_object(&mut self) -> Result<()> {
        self.open(Kind::Document)
    }

    fn end_object(&mut self) -> Result<()> {
        self.close(Kind::Document)
    }

    fn begin_array(&mut self) -> Result<()> {
        self.open(Kind::Array)
    }

    fn end_array(&mut self) -> Result<()> {
        self.close(Kind::Array)
    }

    fn name(&mut self, name: &str) -> Result<()> {
        match self.stack.last() {
            Some(Frame {
                kind: Kind::Document,
                ..
            }) => {}
            Some(_) => return Err(Error::structure("name inside an array")),
            None => return Err(Error::structure("name outside of an object")),
        }
        if self.name.is_some() {
            return Err(Error::structure("two names without a value"));
        }
        if name.as_bytes().contains(&0) {
            return Err(Error::new(ErrorKind::Unencodable(
                "BSON element names cannot contain NUL",
            )));
        }
        self.name = Some(name.to_owned());
        Ok(())
    }

    fn string_value(&mut self, value: &str, _tag: SemanticTag) -> Result<()> {
        self.element(STRING)?;
        self.string_payload(value)
    }

    fn byte_string_value(&mut self, value: &[u8], _tag: SemanticTag) -> Result<()> {
        let len = i32::try_from(value.len())
            .map_err(|_| Error::new(ErrorKind::Unencodable("binary too long for BSON")))?;
        self.element(BINARY)?;
        self.writer.i32_le(len);
        if self.binary_subtype {
            self.writer.u8(BINARY_GENERIC);
        }
        self.writer.buf(value);
        Ok(())
    }

    fn int64_value(&mut self, value: i64, tag: SemanticTag) -> Result<()> {
        if tag == SemanticTag::EpochMilli {
            self.element(DATETIME)?;
            self.writer.i64_le(value);
        } else if let Ok(narrow) = i32::try_from(value) {
            self.element(INT32)?;
            self.writer.i32_le(narrow);
        } else {
            self.element(INT64)?;
            self.writer.i64_le(value);
        }
        Ok(())
    }

    fn uint64_value(&mut self, value: u64, _tag: SemanticTag) -> Result<()> {
        self.element(TIMESTAMP)?;
        self.writer.u64_le(value);
        Ok(())
    }

    fn double_value(&mut self, value: f64, _tag: SemanticTag) -> Result<()> {
        self.element(DOUBLE)?;
        self.writer.f64_le(value);
        Ok(())
    }

    fn bool_value(&mut self, value: bool, _tag: SemanticTag) -> Result<()> {
        self.element(BOOL)?;
        self.writer.u8(value as u8);
        Ok(())
    }

    fn null_value(&mut self, _tag: SemanticTag) -> Result<()> {
        self.element(NULL)
    }

    fn flush(&mut self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::UnexpectedEof))
        }
    }
}
