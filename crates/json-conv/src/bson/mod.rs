//! BSON (Binary JSON) reading and writing over the event protocol.
//!
//! BSON is little-endian. A document is an `int32` total length, a list of
//! elements, and a terminating `0x00`. Each element is a type tag, a
//! NUL-terminated name, and a payload whose shape the tag fixes. Arrays
//! are documents whose names are the decimal indexes.

pub mod constants;
mod reader;
mod writer;

pub use reader::{BsonReader, BsonReaderOptions};
pub use writer::{BsonWriter, BsonWriterOptions};
