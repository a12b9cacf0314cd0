//! [`Value`], the dynamic document model every conversion goes through.

use std::fmt;
use std::ops::{Index, IndexMut};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use indexmap::IndexMap;

use crate::error::{Error, Position, Result};
use crate::event::{Event, EventHandler, EventReader, SemanticTag};

/// Object storage: unique keys in insertion order.
pub type Map = IndexMap<String, Value>;

/// Prefix marking a byte string carried inside JSON text.
pub(crate) const BIN_URI_PREFIX: &str = "data:application/octet-stream;base64,";

static NULL: Value = Value::Null;

/// A hierarchical, dynamically typed document.
///
/// The value is a plain tree: arrays and objects own their children.
/// Equality treats `Int(n)` and `UInt(n)` as the same number and compares
/// objects by key set and per-key value, regardless of key order.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    /// Only produced for integers above `i64::MAX` or by sources that
    /// report unsigned integers explicitly.
    UInt(u64),
    Float(f64),
    String(String),
    ByteString(Vec<u8>),
    Array(Vec<Value>),
    Object(Map),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::UInt(_) => "unsigned integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::ByteString(_) => "byte string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) => u64::try_from(*i).ok(),
            Value::UInt(u) => Some(*u),
            _ => None,
        }
    }

    /// Returns any number as `f64`; integers are converted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::ByteString(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Looks up `key` when this is an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|o| o.get(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.as_object_mut().and_then(|o| o.get_mut(key))
    }

    /// Number of elements or members; zero for scalars.
    pub fn len(&self) -> usize {
        match self {
            Value::Array(a) => a.len(),
            Value::Object(o) => o.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes this value into `handler` as events. Does not flush.
    pub fn emit<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        match self {
            Value::Null => handler.null_value(SemanticTag::None),
            Value::Bool(b) => handler.bool_value(*b, SemanticTag::None),
            Value::Int(i) => handler.int64_value(*i, SemanticTag::None),
            Value::UInt(u) => handler.uint64_value(*u, SemanticTag::None),
            Value::Float(f) => handler.double_value(*f, SemanticTag::None),
            Value::String(s) => handler.string_value(s, SemanticTag::None),
            Value::ByteString(b) => handler.byte_string_value(b, SemanticTag::None),
            Value::Array(items) => {
                handler.begin_array()?;
                for item in items {
                    item.emit(handler)?;
                }
                handler.end_array()
            }
            Value::Object(members) => {
                handler.begin_object()?;
                for (key, item) in members {
                    handler.name(key)?;
                    item.emit(handler)?;
                }
                handler.end_object()
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(a), Value::UInt(b)) | (Value::UInt(b), Value::Int(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::ByteString(a), Value::ByteString(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Index<&str> for Value {
    type Output = Value;

    /// Missing keys and non-objects index to `Null`.
    fn index(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Index<usize> for Value {
    type Output = Value;

    fn index(&self, idx: usize) -> &Value {
        self.as_array().and_then(|a| a.get(idx)).unwrap_or(&NULL)
    }
}

/// `Null` becomes an empty object first, and a missing key is inserted as
/// `Null`. Panics on any other variant.
impl IndexMut<&str> for Value {
    fn index_mut(&mut self, key: &str) -> &mut Value {
        if let Value::Null = self {
            *self = Value::Object(Map::new());
        }
        match self {
            Value::Object(map) => map.entry(key.to_owned()).or_insert(Value::Null),
            other => panic!("cannot access key {key:?} in JSON {}", other.type_name()),
        }
    }
}

/// Panics if `self` is not an array or `idx` is out of bounds.
impl IndexMut<usize> for Value {
    fn index_mut(&mut self, idx: usize) -> &mut Value {
        match self {
            Value::Array(items) => {
                let len = items.len();
                items.get_mut(idx).unwrap_or_else(|| {
                    panic!("cannot access index {idx} of JSON array of length {len}")
                })
            }
            other => panic!("cannot access index {idx} of JSON {}", other.type_name()),
        }
    }
}

/// Compact JSON text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = crate::json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

macro_rules! from_lossless_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        }
    )*};
}

macro_rules! from_wide_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                match i64::try_from(v) {
                    Ok(i) => Value::Int(i),
                    Err(_) => Value::UInt(v as u64),
                }
            }
        }
    )*};
}

from_lossless_int!(i8, i16, i32, i64, isize, u8, u16, u32);
from_wide_unsigned!(u64, usize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Object(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

macro_rules! try_into_int {
    ($($t:ty),*) => {$(
        impl TryFrom<Value> for $t {
            type Error = Error;

            fn try_from(v: Value) -> Result<Self> {
                let found = v.type_name();
                let n = match v {
                    Value::Int(i) => <$t>::try_from(i).ok(),
                    Value::UInt(u) => <$t>::try_from(u).ok(),
                    _ => None,
                };
                n.ok_or_else(|| Error::conversion(stringify!($t), found))
            }
        }
    )*};
}

try_into_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self> {
        v.as_f64()
            .ok_or_else(|| Error::conversion("f64", v.type_name()))
    }
}

impl TryFrom<Value> for f32 {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self> {
        v.as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| Error::conversion("f32", v.type_name()))
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self> {
        v.as_bool()
            .ok_or_else(|| Error::conversion("bool", v.type_name()))
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self> {
        match v {
            Value::String(s) => Ok(s),
            other => Err(Error::conversion("string", other.type_name())),
        }
    }
}

impl TryFrom<Value> for char {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self> {
        if let Value::String(s) = &v {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(c);
            }
        }
        Err(Error::conversion("single-character string", v.type_name()))
    }
}

impl TryFrom<Value> for () {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self> {
        match v {
            Value::Null => Ok(()),
            other => Err(Error::conversion("null", other.type_name())),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::json!(i),
            Value::UInt(u) => serde_json::json!(u),
            // Non-finite floats have no JSON form.
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s),
            Value::ByteString(b) => {
                serde_json::Value::String(format!("{BIN_URI_PREFIX}{}", STANDARD.encode(b)))
            }
            Value::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

enum Cursor<'a> {
    Array(std::slice::Iter<'a, Value>),
    Object {
        members: indexmap::map::Iter<'a, String, Value>,
        pending: Option<&'a Value>,
    },
}

/// Replays a [`Value`] as a pull event stream, so anything that decodes
/// from a format reader can also decode from an in-memory document.
pub struct ValueReader<'a> {
    root: Option<&'a Value>,
    stack: Vec<Cursor<'a>>,
    emitted: usize,
}

impl<'a> ValueReader<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self {
            root: Some(value),
            stack: Vec::new(),
            emitted: 0,
        }
    }

    fn open(&mut self, value: &'a Value) -> Event {
        match value {
            Value::Null => Event::NullValue(SemanticTag::None),
            Value::Bool(b) => Event::BoolValue(*b, SemanticTag::None),
            Value::Int(i) => Event::Int64Value(*i, SemanticTag::None),
            Value::UInt(u) => Event::UInt64Value(*u, SemanticTag::None),
            Value::Float(f) => Event::DoubleValue(*f, SemanticTag::None),
            Value::String(s) => Event::StringValue(s.clone(), SemanticTag::None),
            Value::ByteString(b) => Event::ByteStringValue(b.clone(), SemanticTag::None),
            Value::Array(items) => {
                self.stack.push(Cursor::Array(items.iter()));
                Event::BeginArray
            }
            Value::Object(members) => {
                self.stack.push(Cursor::Object {
                    members: members.iter(),
                    pending: None,
                });
                Event::BeginObject
            }
        }
    }
}

impl EventReader for ValueReader<'_> {
    fn next_event(&mut self) -> Result<Option<Event>> {
        if let Some(root) = self.root.take() {
            self.emitted += 1;
            return Ok(Some(self.open(root)));
        }
        let event = match self.stack.last_mut() {
            None => return Ok(None),
            Some(Cursor::Array(items)) => match items.next() {
                Some(item) => self.open(item),
                None => {
                    self.stack.pop();
                    Event::EndArray
                }
            },
            Some(Cursor::Object { members, pending }) => {
                if let Some(item) = pending.take() {
                    self.open(item)
                } else {
                    match members.next() {
                        Some((key, item)) => {
                            *pending = Some(item);
                            Event::Name(key.clone())
                        }
                        None => {
                            self.stack.pop();
                            Event::EndObject
                        }
                    }
                }
            }
        };
        self.emitted += 1;
        Ok(Some(event))
    }

    /// Index of the next event; a value has no byte positions.
    fn position(&self) -> Position {
        Position::Offset(self.emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(fields: &[(&str, Value)]) -> Value {
        fields.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn integer_kinds_compare_numerically() {
        assert_eq!(Value::Int(5), Value::UInt(5));
        assert_eq!(Value::UInt(5), Value::Int(5));
        assert_ne!(Value::Int(-1), Value::UInt(u64::MAX));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn object_equality_ignores_key_order() {
        let a = obj(&[("x", Value::Int(1)), ("y", Value::Bool(true))]);
        let b = obj(&[("y", Value::Bool(true)), ("x", Value::Int(1))]);
        assert_eq!(a, b);
        let c = obj(&[("x", Value::Int(2)), ("y", Value::Bool(true))]);
        assert_ne!(a, c);
    }

    #[test]
    fn from_wide_unsigned_prefers_int() {
        assert!(matches!(Value::from(7u64), Value::Int(7)));
        assert!(matches!(Value::from(u64::MAX), Value::UInt(u64::MAX)));
    }

    #[test]
    fn try_from_checks_range() {
        assert_eq!(i8::try_from(Value::Int(127)), Ok(127));
        let err = i8::try_from(Value::Int(128)).unwrap_err();
        assert_eq!(
            err.kind(),
            &crate::ErrorKind::Conversion {
                expected: "i8",
                found: "integer"
            }
        );
        assert_eq!(u64::try_from(Value::UInt(u64::MAX)), Ok(u64::MAX));
        assert!(u32::try_from(Value::Int(-1)).is_err());
        assert_eq!(f64::try_from(Value::Int(3)), Ok(3.0));
        assert_eq!(char::try_from(Value::from("é")), Ok('é'));
        assert!(char::try_from(Value::from("ab")).is_err());
    }

    #[test]
    fn index_returns_null_for_missing() {
        let v = obj(&[("a", Value::Array(vec![Value::Int(1)]))]);
        assert_eq!(v["a"][0], Value::Int(1));
        assert!(v["missing"].is_null());
        assert!(v["a"][5].is_null());
    }

    #[test]
    fn index_mut_creates_nested_members() {
        let mut v = obj(&[("a", Value::Null), ("b", Value::Int(2))]);
        v["a"]["c"] = Value::Int(3);
        assert_eq!(v["a"], obj(&[("c", Value::Int(3))]));
        assert_eq!(&v["a"]["c"], v.get("a").and_then(|a| a.get("c")).unwrap());

        let pushed = Value::Array(vec![v["a"]["c"].clone()]);
        assert_eq!(pushed, Value::from(json!([3])));

        let mut empty = obj(&[("a", obj(&[]))]);
        empty["a"]["c"] = Value::Int(3);
        assert_eq!(empty, Value::from(json!({"a": {"c": 3}})));

        let mut fresh = Value::Null;
        fresh["x"]["y"]["z"] = Value::Bool(true);
        assert_eq!(fresh, Value::from(json!({"x": {"y": {"z": true}}})));
        assert!(fresh["x"]["missing"].is_null());
        assert_eq!(fresh["x"].len(), 1);
    }

    #[test]
    fn index_mut_replaces_array_elements() {
        let mut v = Value::from(json!({"list": [1, 2, 3]}));
        v["list"][1] = Value::from("two");
        v["list"][2] = Value::Null;
        v["list"][2]["k"] = Value::Int(0);
        assert_eq!(v, Value::from(json!({"list": [1, "two", {"k": 0}]})));
    }

    #[test]
    #[should_panic(expected = "cannot access index 3 of JSON array of length 3")]
    fn index_mut_past_the_end_panics() {
        let mut v = Value::from(json!([1, 2, 3]));
        v[3] = Value::Null;
    }

    #[test]
    #[should_panic(expected = "cannot access key \"k\" in JSON integer")]
    fn index_mut_on_scalar_panics() {
        let mut v = Value::Int(1);
        v["k"] = Value::Null;
    }

    #[test]
    fn serde_json_conversion_roundtrip() {
        let source = json!({"a": [1, -2, 3.5, "x", null], "b": {"c": true}, "big": u64::MAX});
        let value = Value::from(source.clone());
        assert_eq!(value["big"], Value::UInt(u64::MAX));
        assert_eq!(serde_json::Value::from(value), source);
    }

    #[test]
    fn bytes_convert_to_data_uri() {
        let json = serde_json::Value::from(Value::ByteString(vec![1, 2, 3]));
        assert_eq!(json, json!("data:application/octet-stream;base64,AQID"));
    }

    #[test]
    fn value_reader_replays_structure() {
        let v = obj(&[
            ("a", Value::Array(vec![Value::Int(1), Value::Null])),
            ("b", obj(&[])),
        ]);
        let mut reader = ValueReader::new(&v);
        let mut events = Vec::new();
        while let Some(event) = reader.next_event().unwrap() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                Event::BeginObject,
                Event::Name("a".into()),
                Event::BeginArray,
                Event::Int64Value(1, SemanticTag::None),
                Event::NullValue(SemanticTag::None),
                Event::EndArray,
                Event::Name("b".into()),
                Event::BeginObject,
                Event::EndObject,
                Event::EndObject,
            ]
        );
    }
}
