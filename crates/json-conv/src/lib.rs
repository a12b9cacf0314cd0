//! Event-driven conversion between wire encodings (BSON, JSON text), a
//! dynamic document model ([`Value`]) and statically typed Rust containers.
//!
//! Every conversion goes through one event protocol:
//!
//! ```text
//! bytes -> reader -> events -> ValueBuilder -> Value
//!                           -> Decode       -> Vec<T>, HashMap<String, V>, [T; N], (A, B), ...
//! Value / Encode -> events -> BsonWriter | JsonWriter -> bytes
//! ```
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! let bytes = json_conv::encode_bson(&BTreeMap::from([("x", vec![1, 2])])).unwrap();
//! let doc = json_conv::decode_bson(&bytes).unwrap();
//! assert_eq!(doc.to_string(), r#"{"x":[1,2]}"#);
//!
//! let back: BTreeMap<String, [i32; 3]> = json_conv::decode_bson_into(&bytes).unwrap();
//! assert_eq!(back["x"], [1, 2, 0]);
//! ```

mod builder;
mod codec;
mod error;
mod event;
mod iter;
mod value;

pub mod bson;
pub mod json;

pub use builder::{BuilderOptions, ValueBuilder};
pub use codec::{Decode, Encode};
pub use error::{Error, ErrorKind, Position, Result};
pub use event::{Event, EventHandler, EventReader, SemanticTag};
pub use iter::{ArrayElements, ArrayIter, ObjectIter};
pub use value::{Map, Value, ValueReader};

use std::io::Read;

use json_conv_buffers::{IoSource, SliceSource};
use tracing::debug;

use crate::bson::{BsonReader, BsonWriter};
use crate::json::{JsonReader, JsonWriter};

/// Default nesting limit of the builder and both readers.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Decodes exactly one top-level value from `reader`.
///
/// Errors without a position get the reader's current one.
pub fn decode_from<T: Decode, R: EventReader>(reader: &mut R) -> Result<T> {
    let res = T::decode(reader).and_then(|value| match reader.next_event()? {
        None => Ok(value),
        Some(_) => Err(Error::new(ErrorKind::Syntax("trailing data after the top-level value"))),
    });
    res.map_err(|err| {
        let err = err.or_at(reader.position());
        debug!(error = %err, "decode failed");
        err
    })
}

/// Error-code flavor of [`decode_from`].
pub fn decode_from_with_error<T: Decode, R: EventReader>(
    reader: &mut R,
    error: &mut Option<Error>,
) -> Option<T> {
    let value = T::decode_with_error(reader, error);
    if error.is_none() {
        if let Err(err) = reader.next_event().and_then(|event| match event {
            None => Ok(()),
            Some(_) => Err(Error::new(ErrorKind::Syntax("trailing data after the top-level value"))),
        }) {
            *error = Some(err);
        }
    }
    if let Some(err) = error.take() {
        let err = err.or_at(reader.position());
        debug!(error = %err, "decode failed");
        *error = Some(err);
    }
    value
}

/// Decodes a BSON document into a [`Value`]. Bytes after the document are
/// ignored.
pub fn decode_bson(bytes: &[u8]) -> Result<Value> {
    decode_bson_into(bytes)
}

/// Decodes a BSON document into any [`Decode`] type.
pub fn decode_bson_into<T: Decode>(bytes: &[u8]) -> Result<T> {
    decode_from(&mut BsonReader::new(SliceSource::new(bytes)))
}

pub fn decode_bson_with_error<T: Decode>(bytes: &[u8], error: &mut Option<Error>) -> Option<T> {
    decode_from_with_error(&mut BsonReader::new(SliceSource::new(bytes)), error)
}

/// Decodes one BSON document from a byte stream, reading no further than
/// its terminator.
pub fn decode_bson_from_reader<R: Read>(input: R) -> Result<Value> {
    decode_from(&mut BsonReader::new(IoSource::new(input)))
}

/// Encodes `value` as a BSON document. The top-level value must encode as
/// an object.
pub fn encode_bson<T: Encode + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut writer = BsonWriter::new();
    encode_to(value, &mut writer)?;
    Ok(writer.take_bytes())
}

/// Decodes JSON text into a [`Value`].
pub fn decode_json(text: &str) -> Result<Value> {
    decode_json_into(text)
}

/// Decodes JSON text into any [`Decode`] type.
pub fn decode_json_into<T: Decode>(text: &str) -> Result<T> {
    decode_from(&mut JsonReader::new(text.as_bytes()))
}

pub fn decode_json_with_error<T: Decode>(text: &str, error: &mut Option<Error>) -> Option<T> {
    decode_from_with_error(&mut JsonReader::new(text.as_bytes()), error)
}

/// Encodes `value` as compact JSON text.
pub fn encode_json<T: Encode + ?Sized>(value: &T) -> Result<String> {
    let mut writer = JsonWriter::new();
    encode_to(value, &mut writer)?;
    writer.take_string()
}

/// Encodes `value` into `handler`, then flushes the handler.
pub fn encode_to<T, H>(value: &T, handler: &mut H) -> Result<()>
where
    T: Encode + ?Sized,
    H: EventHandler + ?Sized,
{
    value.encode(handler)?;
    handler.flush()
}

/// Converts any [`Encode`] type into a [`Value`].
pub fn to_value<T: Encode + ?Sized>(value: &T) -> Result<Value> {
    let mut builder = ValueBuilder::new();
    value.encode(&mut builder)?;
    builder.into_value()
}

/// Converts a [`Value`] into any [`Decode`] type.
pub fn from_value<T: Decode>(value: &Value) -> Result<T> {
    decode_from(&mut ValueReader::new(value))
}
