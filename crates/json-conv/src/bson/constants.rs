//! BSON element type tags.

pub const DOUBLE: u8 = 0x01;
pub const STRING: u8 = 0x02;
pub const DOCUMENT: u8 = 0x03;
pub const ARRAY: u8 = 0x04;
pub const BINARY: u8 = 0x05;
pub const BOOL: u8 = 0x08;
/// UTC datetime, milliseconds since the Unix epoch.
pub const DATETIME: u8 = 0x09;
pub const NULL: u8 = 0x0a;
pub const INT32: u8 = 0x10;
pub const TIMESTAMP: u8 = 0x11;
pub const INT64: u8 = 0x12;

/// Binary subtype written for byte strings when the subtype option is on.
pub const BINARY_GENERIC: u8 = 0x00;

/// Whether the reader knows how to decode elements with this tag.
pub fn is_supported(tag: u8) -> bool {
    matches!(
        tag,
        DOUBLE | STRING | DOCUMENT | ARRAY | BINARY | BOOL | DATETIME | NULL | INT32 | TIMESTAMP
            | INT64
    )
}
