//! [`ValueBuilder`] rebuilds a [`Value`] from a flat event stream.
//!
//! Construction uses an explicit stack of frames instead of recursion, so
//! the same builder serves recursive readers and flat tokenizers alike.
//! Frames own their partial containers; dropping the builder (for example
//! after an error) releases everything built so far.

use tracing::debug;

use crate::error::{Error, ErrorKind, Result};
use crate::event::{EventHandler, SemanticTag};
use crate::value::{Map, Value};
use crate::DEFAULT_MAX_DEPTH;

/// Builder limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Maximum number of simultaneously open objects and arrays.
    pub max_depth: usize,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl BuilderOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

enum Frame {
    Object { members: Map, key: Option<String> },
    Array(Vec<Value>),
}

/// An [`EventHandler`] that assembles the events it receives into a
/// [`Value`].
///
/// ```
/// use json_conv::{EventHandler, SemanticTag, Value, ValueBuilder};
///
/// let mut builder = ValueBuilder::new();
/// builder.begin_object().unwrap();
/// builder.name("a").unwrap();
/// builder.int64_value(1, SemanticTag::None).unwrap();
/// builder.end_object().unwrap();
/// let value = builder.into_value().unwrap();
/// assert_eq!(value["a"], Value::Int(1));
/// ```
pub struct ValueBuilder {
    stack: Vec<Frame>,
    result: Option<Value>,
    max_depth: usize,
}

impl Default for ValueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueBuilder {
    pub fn new() -> Self {
        Self::with_options(BuilderOptions::default())
    }

    pub fn with_options(options: BuilderOptions) -> Self {
        Self {
            stack: Vec::new(),
            result: None,
            max_depth: options.max_depth,
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether a complete top-level value has been built.
    pub fn is_complete(&self) -> bool {
        self.stack.is_empty() && self.result.is_some()
    }

    /// Takes the finished value, leaving the builder ready for another
    /// document. Returns `None` while a value is still open.
    pub fn take_value(&mut self) -> Option<Value> {
        if self.stack.is_empty() {
            self.result.take()
        } else {
            None
        }
    }

    pub fn into_value(mut self) -> Result<Value> {
        if !self.stack.is_empty() {
            return Err(Error::new(ErrorKind::UnexpectedEof));
        }
        self.result
            .take()
            .ok_or_else(|| Error::new(ErrorKind::UnexpectedEof))
    }

    /// Drops any partial state.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.result = None;
    }

    fn open(&mut self, frame: Frame) -> Result<()> {
        if self.stack.is_empty() && self.result.is_some() {
            return Err(Error::structure("more than one top-level value"));
        }
        if self.stack.len() >= self.max_depth {
            debug!(max_depth = self.max_depth, "builder nesting limit reached");
            return Err(Error::new(ErrorKind::DepthExceeded(self.max_depth)));
        }
        self.stack.push(frame);
        Ok(())
    }

    /// Appends a finished value to the current frame, or makes it the root.
    fn add(&mut self, value: Value) -> Result<()> {
        match self.stack.last_mut() {
            None => {
                if self.result.is_some() {
                    return Err(Error::structure("more than one top-level value"));
                }
                self.result = Some(value);
            }
            Some(Frame::Array(items)) => items.push(value),
            Some(Frame::Object { members, key }) => {
                let key = key
                    .take()
                    .ok_or_else(|| Error::structure("object member without a name"))?;
                // Last write wins; the first occurrence keeps its position.
                members.insert(key, value);
            }
        }
        Ok(())
    }
}

impl EventHandler for ValueBuilder {
    fn begin_object(&mut self) -> Result<()> {
        self.open(Frame::Object {
            members: Map::new(),
            key: None,
        })
    }

    fn end_object(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Object { members, key: None }) => self.add(Value::Object(members)),
            Some(Frame::Object { key: Some(_), .. }) => {
                Err(Error::structure("name without a value"))
            }
            Some(Frame::Array(_)) => Err(Error::structure("end of object inside an array")),
            None => Err(Error::structure("end of object without a matching begin")),
        }
    }

    fn begin_array(&mut self) -> Result<()> {
        self.open(Frame::Array(Vec::new()))
    }

    fn end_array(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.add(Value::Array(items)),
            Some(Frame::Object { .. }) => Err(Error::structure("end of array inside an object")),
            None => Err(Error::structure("end of array without a matching begin")),
        }
    }

    fn name(&mut self, name: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(Frame::Object { key: key @ None, .. }) => {
                *key = Some(name.to_owned());
                Ok(())
            }
            Some(Frame::Object { key: Some(_), .. }) => {
                Err(Error::structure("two names without a value"))
            }
            Some(Frame::Array(_)) => Err(Error::structure("name inside an array")),
            None => Err(Error::structure("name outside of an object")),
        }
    }

    fn string_value(&mut self, value: &str, _tag: SemanticTag) -> Result<()> {
        self.add(Value::String(value.to_owned()))
    }

    fn byte_string_value(&mut self, value: &[u8], _tag: SemanticTag) -> Result<()> {
        self.add(Value::ByteString(value.to_vec()))
    }

    fn int64_value(&mut self, value: i64, _tag: SemanticTag) -> Result<()> {
        self.add(Value::Int(value))
    }

    fn uint64_value(&mut self, value: u64, _tag: SemanticTag) -> Result<()> {
        self.add(Value::UInt(value))
    }

    fn double_value(&mut self, value: f64, _tag: SemanticTag) -> Result<()> {
        self.add(Value::Float(value))
    }

    fn bool_value(&mut self, value: bool, _tag: SemanticTag) -> Result<()> {
        self.add(Value::Bool(value))
    }

    fn null_value(&mut self, _tag: SemanticTag) -> Result<()> {
        self.add(Value::Null)
    }
}
