//! Lazy iteration over arrays and objects on a live event stream.
//!
//! The iterators hold at most one decoded element at a time. After the
//! closing event, or after yielding an error, they yield `None` forever.

use std::marker::PhantomData;

use crate::codec::Decode;
use crate::error::{Error, Result};
use crate::event::{Event, EventReader};

/// Positional access to the elements of one array, each decoded to a type
/// of the caller's choosing.
pub struct ArrayElements<'r, R> {
    reader: &'r mut R,
    done: bool,
}

impl<'r, R: EventReader> ArrayElements<'r, R> {
    /// Wraps a reader positioned just after `BeginArray`.
    pub fn new(reader: &'r mut R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    /// Wraps a reader whose last event, `first`, must be `BeginArray`.
    pub fn from_first(first: Event, reader: &'r mut R) -> Result<Self> {
        match first {
            Event::BeginArray => Ok(Self::new(reader)),
            other => Err(Error::conversion("array", other.type_name())),
        }
    }

    /// Whether the closing `EndArray` has been consumed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decodes the next element as `U`, or returns `None` at the end of the
    /// array.
    pub fn next_element<U: Decode>(&mut self) -> Result<Option<U>> {
        if self.done {
            return Ok(None);
        }
        let res = match self.reader.expect_event() {
            Ok(Event::EndArray) => {
                self.done = true;
                return Ok(None);
            }
            Ok(event) => U::decode_event(event, &mut *self.reader).map(Some),
            Err(err) => Err(err),
        };
        if res.is_err() {
            self.done = true;
        }
        res
    }

    /// Consumes and drops the remaining elements.
    pub fn skip_rest(&mut self) -> Result<()> {
        while !self.done {
            match self.reader.expect_event() {
                Ok(Event::EndArray) => self.done = true,
                Ok(event) => self.reader.skip_value(event)?,
                Err(err) => {
                    self.done = true;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Requires the array to end here. `expected` describes the shape for
    /// the error raised otherwise.
    pub fn expect_end(&mut self, expected: &'static str) -> Result<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        match self.reader.expect_event()? {
            Event::EndArray => Ok(()),
            _ => Err(Error::conversion(expected, "longer array")),
        }
    }
}

/// The elements of one array, each decoded as `T`.
///
/// ```
/// use json_conv::json::JsonReader;
/// use json_conv::{ArrayIter, EventReader};
///
/// let mut reader = JsonReader::new(b"[1, 2, 3]");
/// let first = reader.expect_event().unwrap();
/// let items = ArrayIter::<_, u8>::from_first(first, &mut reader).unwrap();
/// let sum: u32 = items.map(|item| u32::from(item.unwrap())).sum();
/// assert_eq!(sum, 6);
/// ```
pub struct ArrayIter<'r, R, T> {
    elements: ArrayElements<'r, R>,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, R: EventReader, T: Decode> ArrayIter<'r, R, T> {
    /// Wraps a reader positioned just after `BeginArray`.
    pub fn new(reader: &'r mut R) -> Self {
        Self {
            elements: ArrayElements::new(reader),
            _marker: PhantomData,
        }
    }

    /// Wraps a reader whose last event, `first`, must be `BeginArray`.
    pub fn from_first(first: Event, reader: &'r mut R) -> Result<Self> {
        Ok(Self {
            elements: ArrayElements::from_first(first, reader)?,
            _marker: PhantomData,
        })
    }
}

impl<R: EventReader, T: Decode> Iterator for ArrayIter<'_, R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.elements.next_element().transpose()
    }
}

/// The members of one object, values decoded as `V`.
///
/// Members are yielded in input order, duplicates included; collecting into
/// a map keeps the last value per key.
pub struct ObjectIter<'r, R, V> {
    reader: &'r mut R,
    done: bool,
    _marker: PhantomData<fn() -> V>,
}

impl<'r, R: EventReader, V: Decode> ObjectIter<'r, R, V> {
    /// Wraps a reader positioned just after `BeginObject`.
    pub fn new(reader: &'r mut R) -> Self {
        Self {
            reader,
            done: false,
            _marker: PhantomData,
        }
    }

    /// Wraps a reader whose last event, `first`, must be `BeginObject`.
    pub fn from_first(first: Event, reader: &'r mut R) -> Result<Self> {
        match first {
            Event::BeginObject => Ok(Self::new(reader)),
            other => Err(Error::conversion("object", other.type_name())),
        }
    }

    fn member(&mut self) -> Result<Option<(String, V)>> {
        match self.reader.expect_event()? {
            Event::EndObject => Ok(None),
            Event::Name(key) => {
                let value = V::decode(&mut *self.reader)?;
                Ok(Some((key, value)))
            }
            _ => Err(Error::structure("expected a member name")),
        }
    }
}

impl<R: EventReader, V: Decode> Iterator for ObjectIter<'_, R, V> {
    type Item = Result<(String, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let res = self.member();
        if !matches!(res, Ok(Some(_))) {
            self.done = true;
        }
        res.transpose()
    }
}
