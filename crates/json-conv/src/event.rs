//! The event protocol: the only coupling between format readers, format
//! writers, the [`ValueBuilder`](crate::ValueBuilder) and the typed codec.
//!
//! A conformant stream follows
//!
//! ```text
//! value  := scalar | array | object
//! array  := BeginArray value* EndArray
//! object := BeginObject (Name value)* EndObject
//! ```
//!
//! Producers push events into an [`EventHandler`]; pull-style producers
//! implement [`EventReader`] and can be drained into any handler with
//! [`EventReader::accept`].

use crate::error::{Error, ErrorKind, Position, Result};

/// Out-of-band annotation on a scalar event. Never needed to rebuild the
/// structure; it lets a writer pick the same wire type the reader saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SemanticTag {
    #[default]
    None,
    /// Seconds-or-counter style timestamp (BSON `0x11`).
    EpochTime,
    /// Milliseconds since the Unix epoch (BSON `0x09`).
    EpochMilli,
    /// Integer too large for 64 bits, carried as its decimal text.
    BigInt,
}

/// One token of document structure or one scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Name(String),
    StringValue(String, SemanticTag),
    ByteStringValue(Vec<u8>, SemanticTag),
    Int64Value(i64, SemanticTag),
    UInt64Value(u64, SemanticTag),
    DoubleValue(f64, SemanticTag),
    BoolValue(bool, SemanticTag),
    NullValue(SemanticTag),
}

impl Event {
    /// Pushes this event into `handler`.
    pub fn dispatch<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        match self {
            Event::BeginObject => handler.begin_object(),
            Event::EndObject => handler.end_object(),
            Event::BeginArray => handler.begin_array(),
            Event::EndArray => handler.end_array(),
            Event::Name(name) => handler.name(name),
            Event::StringValue(s, tag) => handler.string_value(s, *tag),
            Event::ByteStringValue(b, tag) => handler.byte_string_value(b, *tag),
            Event::Int64Value(i, tag) => handler.int64_value(*i, *tag),
            Event::UInt64Value(u, tag) => handler.uint64_value(*u, *tag),
            Event::DoubleValue(f, tag) => handler.double_value(*f, *tag),
            Event::BoolValue(b, tag) => handler.bool_value(*b, *tag),
            Event::NullValue(tag) => handler.null_value(*tag),
        }
    }

    /// Short description used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::BeginObject => "object",
            Event::EndObject => "end of object",
            Event::BeginArray => "array",
            Event::EndArray => "end of array",
            Event::Name(_) => "name",
            Event::StringValue(..) => "string",
            Event::ByteStringValue(..) => "byte string",
            Event::Int64Value(..) => "integer",
            Event::UInt64Value(..) => "unsigned integer",
            Event::DoubleValue(..) => "float",
            Event::BoolValue(..) => "bool",
            Event::NullValue(_) => "null",
        }
    }
}

/// Receiver side of the event protocol.
///
/// A handler may reject a call that violates the grammar by returning
/// [`ErrorKind::Structure`]; the producer must then stop.
pub trait EventHandler {
    fn begin_object(&mut self) -> Result<()>;
    fn end_object(&mut self) -> Result<()>;
    fn begin_array(&mut self) -> Result<()>;
    fn end_array(&mut self) -> Result<()>;
    fn name(&mut self, name: &str) -> Result<()>;
    fn string_value(&mut self, value: &str, tag: SemanticTag) -> Result<()>;
    fn byte_string_value(&mut self, value: &[u8], tag: SemanticTag) -> Result<()>;
    fn int64_value(&mut self, value: i64, tag: SemanticTag) -> Result<()>;
    fn uint64_value(&mut self, value: u64, tag: SemanticTag) -> Result<()>;
    fn double_value(&mut self, value: f64, tag: SemanticTag) -> Result<()>;
    fn bool_value(&mut self, value: bool, tag: SemanticTag) -> Result<()>;
    fn null_value(&mut self, tag: SemanticTag) -> Result<()>;

    /// Finalizes buffered output. Called once after a complete top-level
    /// value; encoders never flush implicitly between values.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<H: EventHandler + ?Sized> EventHandler for &mut H {
    fn begin_object(&mut self) -> Result<()> {
        (**self).begin_object()
    }
    fn end_object(&mut self) -> Result<()> {
        (**self).end_object()
    }
    fn begin_array(&mut self) -> Result<()> {
        (**self).begin_array()
    }
    fn end_array(&mut self) -> Result<()> {
        (**self).end_array()
    }
    fn name(&mut self, name: &str) -> Result<()> {
        (**self).name(name)
    }
    fn string_value(&mut self, value: &str, tag: SemanticTag) -> Result<()> {
        (**self).string_value(value, tag)
    }
    fn byte_string_value(&mut self, value: &[u8], tag: SemanticTag) -> Result<()> {
        (**self).byte_string_value(value, tag)
    }
    fn int64_value(&mut self, value: i64, tag: SemanticTag) -> Result<()> {
        (**self).int64_value(value, tag)
    }
    fn uint64_value(&mut self, value: u64, tag: SemanticTag) -> Result<()> {
        (**self).uint64_value(value, tag)
    }
    fn double_value(&mut self, value: f64, tag: SemanticTag) -> Result<()> {
        (**self).double_value(value, tag)
    }
    fn bool_value(&mut self, value: bool, tag: SemanticTag) -> Result<()> {
        (**self).bool_value(value, tag)
    }
    fn null_value(&mut self, tag: SemanticTag) -> Result<()> {
        (**self).null_value(tag)
    }
    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Pull side of the event protocol, implemented by the format readers.
pub trait EventReader {
    /// Returns the next event, or `None` once the top-level value is done.
    fn next_event(&mut self) -> Result<Option<Event>>;

    /// Position of the next unread input byte.
    fn position(&self) -> Position;

    /// Like [`EventReader::next_event`], but end of input is an error.
    fn expect_event(&mut self) -> Result<Event> {
        match self.next_event()? {
            Some(event) => Ok(event),
            None => Err(Error::at(ErrorKind::UnexpectedEof, self.position())),
        }
    }

    /// Pushes one complete value, starting with the already-read `first`
    /// event, into `handler`.
    fn forward_value<H: EventHandler + ?Sized>(&mut self, first: Event, handler: &mut H) -> Result<()>
    where
        Self: Sized,
    {
        let mut depth = 0usize;
        let mut event = first;
        loop {
            match event {
                Event::BeginObject | Event::BeginArray => depth += 1,
                Event::EndObject | Event::EndArray => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| Error::structure("end without matching begin"))?;
                }
                _ => {}
            }
            event
                .dispatch(handler)
                .map_err(|e| e.or_at(self.position()))?;
            if depth == 0 {
                return Ok(());
            }
            event = self.expect_event()?;
        }
    }

    /// Consumes one complete value starting with `first` without
    /// delivering it anywhere.
    fn skip_value(&mut self, first: Event) -> Result<()>
    where
        Self: Sized,
    {
        let mut depth = 0usize;
        let mut event = first;
        loop {
            match event {
                Event::BeginObject | Event::BeginArray => depth += 1,
                Event::EndObject | Event::EndArray => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| Error::structure("end without matching begin"))?;
                }
                Event::Name(_) if depth == 0 => {
                    return Err(Error::structure("name outside of an object"))
                }
                _ => {}
            }
            if depth == 0 {
                return Ok(());
            }
            event = self.expect_event()?;
        }
    }

    /// Drains the top-level value into `handler` and flushes it.
    fn accept<H: EventHandler + ?Sized>(&mut self, handler: &mut H) -> Result<()>
    where
        Self: Sized,
    {
        let first = self.expect_event()?;
        self.forward_value(first, handler)?;
        handler.flush()
    }
}

impl<R: EventReader + ?Sized> EventReader for &mut R {
    fn next_event(&mut self) -> Result<Option<Event>> {
        (**self).next_event()
    }

    fn position(&self) -> Position {
        (**self).position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every call as an [`Event`].
    #[derive(Default)]
    struct Recorder(Vec<Event>);

    impl EventHandler for Recorder {
        fn begin_object(&mut self) -> Result<()> {
            self.0.push(Event::BeginObject);
            Ok(())
        }
        fn end_object(&mut self) -> Result<()> {
            self.0.push(Event::EndObject);
            Ok(())
        }
        fn begin_array(&mut self) -> Result<()> {
            self.0.push(Event::BeginArray);
            Ok(())
        }
        fn end_array(&mut self) -> Result<()> {
            self.0.push(Event::EndArray);
            Ok(())
        }
        fn name(&mut self, name: &str) -> Result<()> {
            self.0.push(Event::Name(name.to_owned()));
            Ok(())
        }
        fn string_value(&mut self, value: &str, tag: SemanticTag) -> Result<()> {
            self.0.push(Event::StringValue(value.to_owned(), tag));
            Ok(())
        }
        fn byte_string_value(&mut self, value: &[u8], tag: SemanticTag) -> Result<()> {
            self.0.push(Event::ByteStringValue(value.to_vec(), tag));
            Ok(())
        }
        fn int64_value(&mut self, value: i64, tag: SemanticTag) -> Result<()> {
            self.0.push(Event::Int64Value(value, tag));
            Ok(())
        }
        fn uint64_value(&mut self, value: u64, tag: SemanticTag) -> Result<()> {
            self.0.push(Event::UInt64Value(value, tag));
            Ok(())
        }
        fn double_value(&mut self, value: f64, tag: SemanticTag) -> Result<()> {
            self.0.push(Event::DoubleValue(value, tag));
            Ok(())
        }
        fn bool_value(&mut self, value: bool, tag: SemanticTag) -> Result<()> {
            self.0.push(Event::BoolValue(value, tag));
            Ok(())
        }
        fn null_value(&mut self, tag: SemanticTag) -> Result<()> {
            self.0.push(Event::NullValue(tag));
            Ok(())
        }
    }

    struct Replay(std::vec::IntoIter<Event>, usize);

    impl EventReader for Replay {
        fn next_event(&mut self) -> Result<Option<Event>> {
            self.1 += 1;
            Ok(self.0.next())
        }
        fn position(&self) -> Position {
            Position::Offset(self.1)
        }
    }

    fn sample() -> Vec<Event> {
        vec![
            Event::BeginObject,
            Event::Name("a".into()),
            Event::BeginArray,
            Event::Int64Value(1, SemanticTag::None),
            Event::NullValue(SemanticTag::None),
            Event::EndArray,
            Event::Name("b".into()),
            Event::UInt64Value(7, SemanticTag::EpochTime),
            Event::EndObject,
        ]
    }

    #[test]
    fn accept_forwards_exactly_one_value() {
        let mut events = sample();
        events.push(Event::BoolValue(true, SemanticTag::None));
        let mut reader = Replay(events.into_iter(), 0);
        let mut recorder = Recorder::default();
        reader.accept(&mut recorder).unwrap();
        assert_eq!(recorder.0, sample());
        assert_eq!(
            reader.next_event().unwrap(),
            Some(Event::BoolValue(true, SemanticTag::None))
        );
    }

    #[test]
    fn skip_value_consumes_nested_structure() {
        let mut events = sample();
        events.push(Event::NullValue(SemanticTag::None));
        let mut reader = Replay(events.into_iter(), 0);
        let first = reader.expect_event().unwrap();
        reader.skip_value(first).unwrap();
        assert_eq!(
            reader.next_event().unwrap(),
            Some(Event::NullValue(SemanticTag::None))
        );
    }

    #[test]
    fn truncated_stream_reports_eof() {
        let mut events = sample();
        events.pop();
        let mut reader = Replay(events.into_iter(), 0);
        let err = reader.accept(&mut Recorder::default()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnexpectedEof);
    }

    #[test]
    fn unmatched_end_is_a_structural_error() {
        let mut reader = Replay(vec![Event::EndArray].into_iter(), 0);
        let err = reader.accept(&mut Recorder::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Structure(_)));
    }
}
