//! Compact JSON text writer.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use json_conv_buffers::Writer;

use crate::error::{Error, ErrorKind, Result};
use crate::event::{EventHandler, SemanticTag};
use crate::value::BIN_URI_PREFIX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Object,
    Array,
}

struct Frame {
    kind: Kind,
    first: bool,
}

/// An [`EventHandler`] that writes compact JSON text.
///
/// - Floats always carry a fraction or an exponent, so they read back as
///   floats. Non-finite floats have no JSON form and are written as `null`.
/// - Byte strings are written as `data:application/octet-stream;base64,`
///   URI strings.
/// - Strings tagged [`SemanticTag::BigInt`] are written as bare numbers.
///
/// ```
/// use json_conv::json::JsonWriter;
/// use json_conv::{EventHandler, SemanticTag};
///
/// let mut writer = JsonWriter::new();
/// writer.begin_array().unwrap();
/// writer.double_value(1.0, SemanticTag::None).unwrap();
/// writer.string_value("a\"b", SemanticTag::None).unwrap();
/// writer.end_array().unwrap();
/// writer.flush().unwrap();
/// assert_eq!(writer.take_string().unwrap(), r#"[1.0,"a\"b"]"#);
/// ```
pub struct JsonWriter {
    writer: Writer,
    stack: Vec<Frame>,
    /// A member name was written and its value is still due.
    after_name: bool,
    root_done: bool,
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(),
            stack: Vec::new(),
            after_name: false,
            root_done: false,
        }
    }

    /// Whether a complete top-level value has been written.
    pub fn is_complete(&self) -> bool {
        self.root_done && self.stack.is_empty()
    }

    /// Returns the finished text and readies the writer for another value.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        self.root_done = false;
        self.writer.flush()
    }

    pub fn take_string(&mut self) -> Result<String> {
        String::from_utf8(self.take_bytes()).map_err(|_| Error::new(ErrorKind::InvalidUtf8))
    }

    /// Discards a partially written value.
    pub fn reset(&mut self) {
        self.writer.reset();
        self.stack.clear();
        self.after_name = false;
        self.root_done = false;
    }

    /// Writes the separator owed before the next value.
    fn before_value(&mut self) -> Result<()> {
        match self.stack.last_mut() {
            None if self.root_done => Err(Error::structure("more than one top-level value")),
            None => Ok(()),
            Some(Frame {
                kind: Kind::Array,
                first,
            }) => {
                if !*first {
                    self.writer.u8(b',');
                }
                *first = false;
                Ok(())
            }
            Some(Frame {
                kind: Kind::Object, ..
            }) => {
                if !self.after_name {
                    return Err(Error::structure("object member without a name"));
                }
                self.after_name = false;
                Ok(())
            }
        }
    }

    fn after_value(&mut self) {
        if self.stack.is_empty() {
            self.root_done = true;
        }
    }

    fn scalar(&mut self, text: &str) -> Result<()> {
        self.before_value()?;
        self.writer.utf8(text);
        self.after_value();
        Ok(())
    }

    fn open(&mut self, kind: Kind) -> Result<()> {
        self.before_value()?;
        self.writer.u8(match kind {
            Kind::Object => b'{',
            Kind::Array => b'[',
        });
        self.stack.push(Frame { kind, first: true });
        Ok(())
    }

    fn close(&mut self, kind: Kind) -> Result<()> {
        match self.stack.last() {
            Some(frame) if frame.kind == kind => {}
            Some(_) => return Err(Error::structure("mismatched end event")),
            None => return Err(Error::structure("end event without a matching begin")),
        }
        if self.after_name {
            return Err(Error::structure("name without a value"));
        }
        self.stack.pop();
        self.writer.u8(match kind {
            Kind::Object => b'}',
            Kind::Array => b']',
        });
        self.after_value();
        Ok(())
    }

    /// Writes a quoted, escaped string.
    fn write_str(&mut self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        let len = bytes.len();

        // Printable ASCII without quotes or backslashes needs no escaping.
        if len < 256 && !bytes.iter().any(|&b| b < 32 || b > 126 || b == b'"' || b == b'\\') {
            self.writer.ensure_capacity(len + 2);
            let x = self.writer.x;
            self.writer.uint8[x] = b'"';
            self.writer.uint8[x + 1..x + 1 + len].copy_from_slice(bytes);
            self.writer.uint8[x + 1 + len] = b'"';
            self.writer.x = x + 2 + len;
            return Ok(());
        }

        let quoted = serde_json::to_string(s)
            .map_err(|_| Error::new(ErrorKind::Unencodable("string")))?;
        self.writer.utf8(&quoted);
        Ok(())
    }
}

/// Whether `s` is a JSON integer literal.
fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'))
}

impl EventHandler for JsonWriter {
    fn begin_object(&mut self) -> Result<()> {
        self.open(Kind::Object)
    }

    fn end_object(&mut self) -> Result<()> {
        self.close(Kind::Object)
    }

    fn begin_array(&mut self) -> Result<()> {
        self.open(Kind::Array)
    }

    fn end_array(&mut self) -> Result<()> {
        self.close(Kind::Array)
    }

    fn name(&mut self, name: &str) -> Result<()> {
        let frame = match self.stack.last_mut() {
            Some(frame) if frame.kind == Kind::Object => frame,
            Some(_) => return Err(Error::structure("name inside an array")),
            None => return Err(Error::structure("name outside of an object")),
        };
        if self.after_name {
            return Err(Error::structure("two names without a value"));
        }
        if !frame.first {
            self.writer.u8(b',');
        }
        frame.first = false;
        self.write_str(name)?;
        self.writer.u8(b':');
        self.after_name = true;
        Ok(())
    }

    fn string_value(&mut self, value: &str, tag: SemanticTag) -> Result<()> {
        if tag == SemanticTag::BigInt && is_integer_literal(value) {
            return self.scalar(value);
        }
        self.before_value()?;
        self.write_str(value)?;
        self.after_value();
        Ok(())
    }

    fn byte_string_value(&mut self, value: &[u8], _tag: SemanticTag) -> Result<()> {
        self.before_value()?;
        self.writer.u8(b'"');
        self.writer.utf8(BIN_URI_PREFIX);
        self.writer.utf8(&STANDARD.encode(value));
        self.writer.u8(b'"');
        self.after_value();
        Ok(())
    }

    fn int64_value(&mut self, value: i64, _tag: SemanticTag) -> Result<()> {
        self.scalar(&value.to_string())
    }

    fn uint64_value(&mut self, value: u64, _tag: SemanticTag) -> Result<()> {
        self.scalar(&value.to_string())
    }

    fn double_value(&mut self, value: f64, _tag: SemanticTag) -> Result<()> {
        if value.is_finite() {
            // `Debug` keeps a `.0` on integral floats and uses an exponent
            // for very large or small magnitudes.
            self.scalar(&format!("{value:?}"))
        } else {
            self.scalar("null")
        }
    }

    fn bool_value(&mut self, value: bool, _tag: SemanticTag) -> Result<()> {
        self.scalar(if value { "true" } else { "false" })
    }

    fn null_value(&mut self, _tag: SemanticTag) -> Result<()> {
        self.scalar("null")
    }

    fn flush(&mut self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::UnexpectedEof))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn write(events: &[Event]) -> Result<String> {
        let mut writer = JsonWriter::new();
        for event in events {
            event.dispatch(&mut writer)?;
        }
        writer.flush()?;
        writer.take_string()
    }

    #[test]
    fn separators() {
        let text = write(&[
            Event::BeginObject,
            Event::Name("a".into()),
            Event::BeginArray,
            Event::Int64Value(1, SemanticTag::None),
            Event::BeginArray,
            Event::EndArray,
            Event::BeginObject,
            Event::EndObject,
            Event::EndArray,
            Event::Name("b".into()),
            Event::NullValue(SemanticTag::None),
            Event::EndObject,
        ])
        .unwrap();
        assert_eq!(text, r#"{"a":[1,[],{}],"b":null}"#);
    }

    #[test]
    fn scalars() {
        let cases: Vec<(Event, &str)> = vec![
            (Event::DoubleValue(1.0, SemanticTag::None), "1.0"),
            (Event::DoubleValue(-0.25, SemanticTag::None), "-0.25"),
            (Event::DoubleValue(1e300, SemanticTag::None), "1e300"),
            (Event::DoubleValue(f64::NAN, SemanticTag::None), "null"),
            (Event::DoubleValue(f64::INFINITY, SemanticTag::None), "null"),
            (Event::UInt64Value(u64::MAX, SemanticTag::None), "18446744073709551615"),
            (Event::BoolValue(false, SemanticTag::None), "false"),
            (Event::StringValue("tab\there".into(), SemanticTag::None), r#""tab\there""#),
            (Event::StringValue("héllo".into(), SemanticTag::None), "\"héllo\""),
            (Event::StringValue("99999999999999999999".into(), SemanticTag::BigInt), "99999999999999999999"),
            (Event::StringValue("nope".into(), SemanticTag::BigInt), "\"nope\""),
            (
                Event::ByteStringValue(vec![1, 2, 3], SemanticTag::None),
                r#""data:application/octet-stream;base64,AQID""#,
            ),
        ];
        for (event, expected) in cases {
            assert_eq!(write(&[event.clone()]).unwrap(), expected, "{event:?}");
        }
    }

    #[test]
    fn violations_are_rejected() {
        let cases: Vec<Vec<Event>> = vec![
            vec![Event::BeginObject, Event::NullValue(SemanticTag::None)],
            vec![Event::BeginArray, Event::Name("a".into())],
            vec![Event::BeginObject, Event::EndArray],
            vec![Event::BeginObject, Event::Name("a".into()), Event::EndObject],
            vec![
                Event::NullValue(SemanticTag::None),
                Event::NullValue(SemanticTag::None),
            ],
        ];
        for events in cases {
            let err = write(&events).unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::Structure(_)), "{events:?}");
        }
        assert_eq!(
            write(&[Event::BeginArray]).unwrap_err().kind(),
            &ErrorKind::UnexpectedEof
        );
    }
}
