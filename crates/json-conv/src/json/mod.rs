//! JSON text reading and writing over the event protocol.
//!
//! Byte strings travel as `data:application/octet-stream;base64,` URI
//! strings in both directions. Integers that do not fit in 64 bits are
//! carried as decimal strings tagged [`SemanticTag::BigInt`](crate::SemanticTag).

mod reader;
mod writer;

pub use reader::{JsonReader, JsonReaderOptions};
pub use writer::JsonWriter;

use crate::error::Result;
use crate::value::Value;

/// Serializes `value` as compact JSON text.
pub(crate) fn to_string(value: &Value) -> Result<String> {
    let mut writer = JsonWriter::new();
    value.emit(&mut writer)?;
    crate::event::EventHandler::flush(&mut writer)?;
    writer.take_string()
}
