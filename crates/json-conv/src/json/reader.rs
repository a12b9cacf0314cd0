//! JSON text tokenizer.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::error::{Error, ErrorKind, Position, Result};
use crate::event::{Event, EventReader, SemanticTag};
use crate::value::BIN_URI_PREFIX;
use crate::DEFAULT_MAX_DEPTH;

/// Tokenizer limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonReaderOptions {
    /// Maximum number of simultaneously open objects and arrays.
    pub max_depth: usize,
}

impl Default for JsonReaderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl JsonReaderOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the top-level value.
    Start,
    /// Right after `{` or `[`.
    FirstOrEnd,
    /// After a member or element.
    CommaOrEnd,
    /// After `"name":`.
    MemberValue,
    /// The top-level value is complete; only whitespace may follow.
    Done,
}

/// Pull tokenizer over JSON text (RFC 8259).
///
/// Errors carry the one-based line and column of the offending byte.
///
/// ```
/// use json_conv::json::JsonReader;
/// use json_conv::{Event, EventReader, SemanticTag};
///
/// let mut reader = JsonReader::new(br#"{"a":[true]}"#);
/// assert_eq!(reader.next_event().unwrap(), Some(Event::BeginObject));
/// assert_eq!(reader.next_event().unwrap(), Some(Event::Name("a".into())));
/// assert_eq!(reader.next_event().unwrap(), Some(Event::BeginArray));
/// assert_eq!(
///     reader.next_event().unwrap(),
///     Some(Event::BoolValue(true, SemanticTag::None))
/// );
/// ```
pub struct JsonReader<'a> {
    data: &'a [u8],
    x: usize,
    stack: Vec<Frame>,
    state: State,
    max_depth: usize,
}

impl<'a> JsonReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_options(data, JsonReaderOptions::default())
    }

    pub fn with_options(data: &'a [u8], options: JsonReaderOptions) -> Self {
        Self {
            data,
            x: 0,
            stack: Vec::new(),
            state: State::Start,
            max_depth: options.max_depth,
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Line and column of byte offset `x`.
    fn line_column(&self, x: usize) -> Position {
        let before = &self.data[..x.min(self.data.len())];
        let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
        let line_start = before
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        Position::LineColumn {
            line,
            column: x - line_start + 1,
        }
    }

    fn err(&self, kind: ErrorKind, x: usize) -> Error {
        Error::at(kind, self.line_column(x))
    }

    /// Syntax error at the current byte, or end of input if there is none.
    fn unexpected(&self, what: &'static str) -> Error {
        if self.x >= self.data.len() {
            self.err(ErrorKind::UnexpectedEof, self.x)
        } else {
            self.err(ErrorKind::Syntax(what), self.x)
        }
    }

    fn skip_whitespace(&mut self) {
        while self.x < self.data.len() {
            match self.data[self.x] {
                b' ' | b'\t' | b'\n' | b'\r' => self.x += 1,
                _ => break,
            }
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.data.get(self.x).copied()
    }

    fn after_value(&mut self) {
        self.state = if self.stack.is_empty() {
            State::Done
        } else {
            State::CommaOrEnd
        };
    }

    fn open(&mut self, frame: Frame) -> Result<Event> {
        if self.stack.len() >= self.max_depth {
            debug!(max_depth = self.max_depth, "JSON nesting limit reached");
            return Err(self.err(ErrorKind::DepthExceeded(self.max_depth), self.x));
        }
        self.x += 1;
        self.stack.push(frame);
        self.state = State::FirstOrEnd;
        Ok(match frame {
            Frame::Object => Event::BeginObject,
            Frame::Array => Event::BeginArray,
        })
    }

    fn close(&mut self) -> Event {
        self.x += 1;
        let frame = self.stack.pop();
        self.after_value();
        match frame {
            Some(Frame::Array) => Event::EndArray,
            _ => Event::EndObject,
        }
    }

    /// Reads `"name"` and the following `:`.
    fn read_name(&mut self) -> Result<Event> {
        if self.peek() != Some(b'"') {
            return Err(self.unexpected("expected a member name"));
        }
        let name = self.read_str()?;
        if self.peek() != Some(b':') {
            return Err(self.unexpected("expected ':'"));
        }
        self.x += 1;
        self.state = State::MemberValue;
        Ok(Event::Name(name))
    }

    fn read_value(&mut self) -> Result<Event> {
        let event = match self.peek() {
            Some(b'{') => return self.open(Frame::Object),
            Some(b'[') => return self.open(Frame::Array),
            Some(b'"') => {
                let s = self.read_str()?;
                match decode_bin(&s) {
                    Some(bin) => Event::ByteStringValue(bin, SemanticTag::None),
                    None => Event::StringValue(s, SemanticTag::None),
                }
            }
            Some(b't') => {
                self.read_literal(b"true")?;
                Event::BoolValue(true, SemanticTag::None)
            }
            Some(b'f') => {
                self.read_literal(b"false")?;
                Event::BoolValue(false, SemanticTag::None)
            }
            Some(b'n') => {
                self.read_literal(b"null")?;
                Event::NullValue(SemanticTag::None)
            }
            Some(b'-' | b'0'..=b'9') => self.read_num()?,
            _ => return Err(self.unexpected("expected a value")),
        };
        self.after_value();
        Ok(event)
    }

    fn read_literal(&mut self, literal: &[u8]) -> Result<()> {
        let end = self.x + literal.len();
        let available = &self.data[self.x..end.min(self.data.len())];
        if !literal.starts_with(available) {
            return Err(self.err(ErrorKind::Syntax("invalid literal"), self.x));
        }
        if end > self.data.len() {
            return Err(self.err(ErrorKind::UnexpectedEof, self.data.len()));
        }
        self.x = end;
        Ok(())
    }

    fn digits(&mut self) -> usize {
        let start = self.x;
        while self.x < self.data.len() && self.data[self.x].is_ascii_digit() {
            self.x += 1;
        }
        self.x - start
    }

    /// `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`
    fn read_num(&mut self) -> Result<Event> {
        let start = self.x;
        if self.data[self.x] == b'-' {
            self.x += 1;
        }
        let int_start = self.x;
        let int_len = self.digits();
        if int_len == 0 {
            return Err(self.unexpected("expected a digit"));
        }
        if int_len > 1 && self.data[int_start] == b'0' {
            return Err(self.err(ErrorKind::Syntax("leading zero in number"), int_start));
        }
        let mut is_float = false;
        if self.data.get(self.x) == Some(&b'.') {
            is_float = true;
            self.x += 1;
            if self.digits() == 0 {
                return Err(self.unexpected("expected a digit after '.'"));
            }
        }
        if matches!(self.data.get(self.x), Some(b'e' | b'E')) {
            is_float = true;
            self.x += 1;
            if matches!(self.data.get(self.x), Some(b'+' | b'-')) {
                self.x += 1;
            }
            if self.digits() == 0 {
                return Err(self.unexpected("expected a digit in exponent"));
            }
        }
        // The grammar above only admits ASCII.
        let text = std::str::from_utf8(&self.data[start..self.x])
            .map_err(|_| self.err(ErrorKind::InvalidUtf8, start))?;
        if is_float {
            let f: f64 = text
                .parse()
                .map_err(|_| self.err(ErrorKind::Syntax("invalid number"), start))?;
            Ok(Event::DoubleValue(f, SemanticTag::None))
        } else if let Ok(i) = text.parse::<i64>() {
            Ok(Event::Int64Value(i, SemanticTag::None))
        } else if let Ok(u) = text.parse::<u64>() {
            Ok(Event::UInt64Value(u, SemanticTag::None))
        } else {
            Ok(Event::StringValue(text.to_owned(), SemanticTag::BigInt))
        }
    }

    fn read_str(&mut self) -> Result<String> {
        let x0 = self.x + 1;
        let x1 = self.find_ending_quote(x0)?;
        let s = decode_json_string(&self.data[x0..x1]).map_err(|kind| self.err(kind, x0))?;
        self.x = x1 + 1;
        Ok(s)
    }

    /// Offset of the closing quote of a string whose body starts at `x`.
    fn find_ending_quote(&self, mut x: usize) -> Result<usize> {
        while x < self.data.len() {
            match self.data[x] {
                b'"' => return Ok(x),
                b'\\' => x += 2,
                b if b < 0x20 => {
                    return Err(self.err(ErrorKind::Syntax("control character in string"), x))
                }
                _ => x += 1,
            }
        }
        Err(self.err(ErrorKind::UnexpectedEof, self.data.len()))
    }
}

impl EventReader for JsonReader<'_> {
    fn next_event(&mut self) -> Result<Option<Event>> {
        match self.state {
            State::Start | State::MemberValue => self.read_value().map(Some),
            State::Done => {
                if self.peek().is_some() {
                    return Err(self.err(ErrorKind::Syntax("trailing characters"), self.x));
                }
                Ok(None)
            }
            State::FirstOrEnd => match (self.stack.last().copied(), self.peek()) {
                (Some(Frame::Object), Some(b'}')) | (Some(Frame::Array), Some(b']')) => {
                    Ok(Some(self.close()))
                }
                (Some(Frame::Object), _) => self.read_name().map(Some),
                _ => self.read_value().map(Some),
            },
            State::CommaOrEnd => match (self.stack.last().copied(), self.peek()) {
                (Some(Frame::Object), Some(b'}')) | (Some(Frame::Array), Some(b']')) => {
                    Ok(Some(self.close()))
                }
                (Some(frame), Some(b',')) => {
                    self.x += 1;
                    match frame {
                        Frame::Object => self.read_name().map(Some),
                        Frame::Array => self.read_value().map(Some),
                    }
                }
                _ => Err(self.unexpected("expected ',' or a closing bracket")),
            },
        }
    }

    fn position(&self) -> Position {
        self.line_column(self.x)
    }
}

/// Decodes a string body (between the quotes), handling escapes.
fn decode_json_string(bytes: &[u8]) -> std::result::Result<String, ErrorKind> {
    if !bytes.contains(&b'\\') {
        return std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ErrorKind::InvalidUtf8);
    }
    let mut quoted = Vec::with_capacity(bytes.len() + 2);
    quoted.push(b'"');
    quoted.extend_from_slice(bytes);
    quoted.push(b'"');
    serde_json::from_slice(&quoted).map_err(|_| ErrorKind::Syntax("invalid escape sequence"))
}

/// A byte string carried as a data URI. Strings with the prefix but a
/// malformed payload stay strings.
fn decode_bin(s: &str) -> Option<Vec<u8>> {
    STANDARD.decode(s.strip_prefix(BIN_URI_PREFIX)?).ok()
}
