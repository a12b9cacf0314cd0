//! Type-directed conversion between Rust containers and the event protocol.
//!
//! Each shape family maps onto the protocol one way:
//!
//! | Rust shape | Events |
//! |---|---|
//! | `Vec`, `VecDeque`, sets, slices | array |
//! | `[T; N]` | array; extra elements dropped, missing ones `T::default()` |
//! | tuples of 1 to 8 | array of exactly that length |
//! | maps keyed by strings | object; last duplicate key wins |
//! | numbers, `bool`, `String`, `char`, `()` | scalar, through [`Value`] |
//! | `Option<T>` | `null` or `T` |
//! | [`Value`] | whatever it holds |

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};

use indexmap::IndexMap;

use crate::builder::ValueBuilder;
use crate::error::{Error, Result};
use crate::event::{Event, EventHandler, EventReader, SemanticTag};
use crate::iter::{ArrayElements, ArrayIter, ObjectIter};
use crate::value::Value;

/// Types that can describe themselves as events.
///
/// Encoding never flushes; callers finalize the handler after the
/// top-level value.
pub trait Encode {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()>;
}

/// Types that can be rebuilt from events.
pub trait Decode: Sized {
    /// Decodes a value whose first event has already been read.
    fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self>;

    fn decode<R: EventReader>(reader: &mut R) -> Result<Self> {
        let first = reader.expect_event()?;
        Self::decode_event(first, reader)
    }

    /// Error-code flavor of [`Decode::decode`]: never fails, stores the first
    /// error in `error` and returns what could be decoded before it.
    /// Containers return their partial contents; scalars return `None`.
    fn decode_with_error<R: EventReader>(reader: &mut R, error: &mut Option<Error>) -> Option<Self> {
        record(Self::decode(reader), error)
    }
}

/// Moves the error of `res`, if any, into `slot`.
fn record<T>(res: Result<T>, slot: &mut Option<Error>) -> Option<T> {
    res.map_err(|err| *slot = Some(err)).ok()
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        (**self).encode(handler)
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        (**self).encode(handler)
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
        T::decode_event(first, reader).map(Box::new)
    }
}

impl Encode for Value {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        self.emit(handler)
    }
}

impl Decode for Value {
    fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
        let mut builder = ValueBuilder::new();
        reader.forward_value(first, &mut builder)?;
        builder.into_value()
    }
}

// Scalars

macro_rules! scalar_impls {
    ($($t:ty),*) => {$(
        impl Encode for $t {
            fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
                Value::from(*self).emit(handler)
            }
        }

        impl Decode for $t {
            fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
                <$t>::try_from(Value::decode_event(first, reader)?)
            }
        }
    )*};
}

scalar_impls!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, char, ());

impl Encode for str {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        handler.string_value(self, SemanticTag::None)
    }
}

impl Encode for String {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        handler.string_value(self, SemanticTag::None)
    }
}

impl Decode for String {
    fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
        String::try_from(Value::decode_event(first, reader)?)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        match self {
            Some(value) => value.encode(handler),
            None => handler.null_value(SemanticTag::None),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
        match first {
            Event::NullValue(_) => Ok(None),
            first => T::decode_event(first, reader).map(Some),
        }
    }
}

// Sequences

fn encode_seq<'a, H, T, I>(items: I, handler: &mut H) -> Result<()>
where
    H: EventHandler + ?Sized,
    T: Encode + 'a,
    I: IntoIterator<Item = &'a T>,
{
    handler.begin_array()?;
    for item in items {
        item.encode(handler)?;
    }
    handler.end_array()
}

fn decode_seq<R, T, C>(first: Event, reader: &mut R) -> Result<C>
where
    R: EventReader,
    T: Decode,
    C: FromIterator<T>,
{
    ArrayIter::<R, T>::from_first(first, reader)?.collect()
}

/// Collects array elements until the end or the first error.
fn decode_seq_with_error<R, T, C>(reader: &mut R, error: &mut Option<Error>) -> Option<C>
where
    R: EventReader,
    T: Decode,
    C: Default + Extend<T>,
{
    let first = record(reader.expect_event(), error)?;
    let items = record(ArrayIter::<R, T>::from_first(first, reader), error)?;
    let mut out = C::default();
    for item in items {
        match item {
            Ok(item) => out.extend(Some(item)),
            Err(err) => {
                *error = Some(err);
                break;
            }
        }
    }
    Some(out)
}

impl<T: Encode> Encode for [T] {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        encode_seq(self, handler)
    }
}

macro_rules! seq_impls {
    ($($seq:ident <T $(: $bound:ident $(+ $rest:ident)*)?>),*) => {$(
        impl<T: Encode> Encode for $seq<T> {
            fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
                encode_seq(self, handler)
            }
        }

        impl<T: Decode $(+ $bound $(+ $rest)*)?> Decode for $seq<T> {
            fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
                decode_seq::<R, T, Self>(first, reader)
            }

            fn decode_with_error<R: EventReader>(
                reader: &mut R,
                error: &mut Option<Error>,
            ) -> Option<Self> {
                decode_seq_with_error::<R, T, Self>(reader, error)
            }
        }
    )*};
}

seq_impls!(Vec<T>, VecDeque<T>, BTreeSet<T: Ord>);

impl<T: Encode, S> Encode for HashSet<T, S> {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        encode_seq(self, handler)
    }
}

impl<T, S> Decode for HashSet<T, S>
where
    T: Decode + Eq + Hash,
    S: BuildHasher + Default,
{
    fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
        decode_seq::<R, T, Self>(first, reader)
    }

    fn decode_with_error<R: EventReader>(reader: &mut R, error: &mut Option<Error>) -> Option<Self> {
        decode_seq_with_error::<R, T, Self>(reader, error)
    }
}

// Fixed-size arrays

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        encode_seq(self, handler)
    }
}

/// Fills `out` from the array positioned in `elements`, then drops any
/// surplus elements.
fn fill_fixed<R: EventReader, T: Decode>(
    elements: &mut ArrayElements<'_, R>,
    out: &mut [T],
) -> Result<()> {
    for slot in out.iter_mut() {
        match elements.next_element()? {
            Some(item) => *slot = item,
            None => return Ok(()),
        }
    }
    elements.skip_rest()
}

impl<T: Decode + Default, const N: usize> Decode for [T; N] {
    fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
        let mut elements = ArrayElements::from_first(first, reader)?;
        let mut out: [T; N] = std::array::from_fn(|_| T::default());
        fill_fixed(&mut elements, &mut out)?;
        Ok(out)
    }

    fn decode_with_error<R: EventReader>(reader: &mut R, error: &mut Option<Error>) -> Option<Self> {
        let first = record(reader.expect_event(), error)?;
        let mut elements = record(ArrayElements::from_first(first, reader), error)?;
        let mut out: [T; N] = std::array::from_fn(|_| T::default());
        record(fill_fixed(&mut elements, &mut out), error);
        Some(out)
    }
}

// Tuples

macro_rules! tuple_impls {
    ($($len:literal => ($($name:ident $idx:tt),+))+) => {$(
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
                handler.begin_array()?;
                $(self.$idx.encode(handler)?;)+
                handler.end_array()
            }
        }

        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
                const EXPECTED: &str = concat!("array of ", $len, " elements");
                let mut elements = ArrayElements::from_first(first, reader)?;
                let value = ($(
                    elements
                        .next_element::<$name>()?
                        .ok_or_else(|| Error::conversion(EXPECTED, "shorter array"))?,
                )+);
                elements.expect_end(EXPECTED)?;
                Ok(value)
            }
        }
    )+};
}

tuple_impls! {
    1 => (T0 0)
    2 => (T0 0, T1 1)
    3 => (T0 0, T1 1, T2 2)
    4 => (T0 0, T1 1, T2 2, T3 3)
    5 => (T0 0, T1 1, T2 2, T3 3, T4 4)
    6 => (T0 0, T1 1, T2 2, T3 3, T4 4, T5 5)
    7 => (T0 0, T1 1, T2 2, T3 3, T4 4, T5 5, T6 6)
    8 => (T0 0, T1 1, T2 2, T3 3, T4 4, T5 5, T6 6, T7 7)
}

// Maps

fn encode_map<'a, H, K, V, I>(entries: I, handler: &mut H) -> Result<()>
where
    H: EventHandler + ?Sized,
    K: AsRef<str> + 'a,
    V: Encode + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    handler.begin_object()?;
    for (key, value) in entries {
        handler.name(key.as_ref())?;
        value.encode(handler)?;
    }
    handler.end_object()
}

fn decode_map<R, K, V, C>(first: Event, reader: &mut R) -> Result<C>
where
    R: EventReader,
    K: From<String>,
    V: Decode,
    C: FromIterator<(K, V)>,
{
    ObjectIter::<R, V>::from_first(first, reader)?
        .map(|member| member.map(|(key, value)| (K::from(key), value)))
        .collect()
}

fn decode_map_with_error<R, K, V, C>(reader: &mut R, error: &mut Option<Error>) -> Option<C>
where
    R: EventReader,
    K: From<String>,
    V: Decode,
    C: Default + Extend<(K, V)>,
{
    let first = record(reader.expect_event(), error)?;
    let members = record(ObjectIter::<R, V>::from_first(first, reader), error)?;
    let mut out = C::default();
    for member in members {
        match member {
            Ok((key, value)) => out.extend(Some((K::from(key), value))),
            Err(err) => {
                *error = Some(err);
                break;
            }
        }
    }
    Some(out)
}

impl<K: AsRef<str>, V: Encode, S> Encode for HashMap<K, V, S> {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        encode_map(self, handler)
    }
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: From<String> + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
        decode_map::<R, K, V, Self>(first, reader)
    }

    fn decode_with_error<R: EventReader>(reader: &mut R, error: &mut Option<Error>) -> Option<Self> {
        decode_map_with_error::<R, K, V, Self>(reader, error)
    }
}

impl<K: AsRef<str>, V: Encode> Encode for BTreeMap<K, V> {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        encode_map(self, handler)
    }
}

impl<K, V> Decode for BTreeMap<K, V>
where
    K: From<String> + Ord,
    V: Decode,
{
    fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
        decode_map::<R, K, V, Self>(first, reader)
    }

    fn decode_with_error<R: EventReader>(reader: &mut R, error: &mut Option<Error>) -> Option<Self> {
        decode_map_with_error::<R, K, V, Self>(reader, error)
    }
}

impl<K: AsRef<str>, V: Encode, S> Encode for IndexMap<K, V, S> {
    fn encode<H: EventHandler + ?Sized>(&self, handler: &mut H) -> Result<()> {
        encode_map(self, handler)
    }
}

impl<K, V, S> Decode for IndexMap<K, V, S>
where
    K: From<String> + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn decode_event<R: EventReader>(first: Event, reader: &mut R) -> Result<Self> {
        decode_map::<R, K, V, Self>(first, reader)
    }

    fn decode_with_error<R: EventReader>(reader: &mut R, error: &mut Option<Error>) -> Option<Self> {
        decode_map_with_error::<R, K, V, Self>(reader, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::value::ValueReader;

    fn roundtrip<T: Encode + Decode>(value: &T) -> T {
        let mut builder = ValueBuilder::new();
        value.encode(&mut builder).unwrap();
        let doc = builder.into_value().unwrap();
        T::decode(&mut ValueReader::new(&doc)).unwrap()
    }

    fn from_doc<T: Decode>(doc: &Value) -> Result<T> {
        T::decode(&mut ValueReader::new(doc))
    }

    fn doc(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn scalars_roundtrip() {
        assert_eq!(roundtrip(&-7i8), -7);
        assert_eq!(roundtrip(&u64::MAX), u64::MAX);
        assert_eq!(roundtrip(&2.5f32), 2.5);
        assert!(roundtrip(&true));
        assert_eq!(roundtrip(&'é'), 'é');
        assert_eq!(roundtrip(&String::from("hi")), "hi");
        roundtrip(&());
    }

    #[test]
    fn scalar_conversion_errors() {
        let err = from_doc::<u8>(&Value::Int(300)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Conversion { expected: "u8", .. }));
        let err = from_doc::<String>(&doc(serde_json::json!([1]))).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::Conversion {
                expected: "string",
                found: "array"
            }
        );
    }

    #[test]
    fn options() {
        assert_eq!(from_doc::<Option<i32>>(&Value::Null).unwrap(), None);
        assert_eq!(from_doc::<Option<i32>>(&Value::Int(3)).unwrap(), Some(3));
        assert_eq!(
            from_doc::<Vec<Option<bool>>>(&doc(serde_json::json!([true, null]))).unwrap(),
            vec![Some(true), None]
        );
    }

    #[test]
    fn sequences() {
        let items = doc(serde_json::json!([3, 1, 3, 2]));
        assert_eq!(from_doc::<Vec<u8>>(&items).unwrap(), vec![3, 1, 3, 2]);
        assert_eq!(
            from_doc::<VecDeque<u8>>(&items).unwrap(),
            VecDeque::from(vec![3, 1, 3, 2])
        );
        assert_eq!(
            from_doc::<BTreeSet<u8>>(&items).unwrap(),
            BTreeSet::from([1, 2, 3])
        );
        assert_eq!(from_doc::<HashSet<u8>>(&items).unwrap().len(), 3);

        let nested = vec![vec![1u32], vec![], vec![2, 3]];
        assert_eq!(roundtrip(&nested), nested);
    }

    #[test]
    fn fixed_arrays_truncate_and_fill() {
        let items = doc(serde_json::json!([1, 2, 3]));
        assert_eq!(from_doc::<[i32; 2]>(&items).unwrap(), [1, 2]);
        assert_eq!(from_doc::<[i32; 5]>(&items).unwrap(), [1, 2, 3, 0, 0]);
        assert_eq!(from_doc::<[i32; 0]>(&items).unwrap(), [0i32; 0]);
        assert_eq!(roundtrip(&[[1u8, 2], [3, 4]]), [[1, 2], [3, 4]]);
    }

    #[test]
    fn tuples_are_strict() {
        let items = doc(serde_json::json!([1, "two", [3.5]]));
        let (a, b, c) = from_doc::<(u8, String, Vec<f64>)>(&items).unwrap();
        assert_eq!((a, b.as_str(), c), (1, "two", vec![3.5]));

        let err = from_doc::<(u8, String)>(&items).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Conversion { found: "longer array", .. }));
        let err = from_doc::<(u8, String, Vec<f64>, bool)>(&items).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Conversion { found: "shorter array", .. }));

        let wide = (1u8, 2u16, 3u32, 4u64, -5i8, 6.5f64, true, 'x');
        assert_eq!(roundtrip(&wide), wide);
    }

    #[test]
    fn maps_keep_the_last_duplicate() {
        let events = vec![
            Event::BeginObject,
            Event::Name("a".into()),
            Event::Int64Value(1, SemanticTag::None),
            Event::Name("b".into()),
            Event::Int64Value(5, SemanticTag::None),
            Event::Name("a".into()),
            Event::Int64Value(2, SemanticTag::None),
            Event::EndObject,
        ];
        let mut builder = ValueBuilder::new();
        for event in &events {
            event.dispatch(&mut builder).unwrap();
        }
        let doc = builder.into_value().unwrap();

        let map = from_doc::<HashMap<String, i64>>(&doc).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], 2);
        let map = from_doc::<IndexMap<String, i64>>(&doc).unwrap();
        assert_eq!(map.get_index(0), Some((&"a".to_owned(), &2)));
        let map = from_doc::<BTreeMap<String, Value>>(&doc).unwrap();
        assert_eq!(map["b"], Value::Int(5));
    }

    #[test]
    fn maps_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("x".to_owned(), vec![(1u8, false)]);
        map.insert("y".to_owned(), vec![]);
        assert_eq!(roundtrip(&map), map);
    }

    #[test]
    fn error_code_mode_keeps_partial_containers() {
        let items = doc(serde_json::json!([1, 2, "x", 4]));
        let mut error = None;
        let partial = Vec::<u8>::decode_with_error(&mut ValueReader::new(&items), &mut error);
        assert_eq!(partial, Some(vec![1, 2]));
        assert!(matches!(
            error.as_ref().map(Error::kind),
            Some(ErrorKind::Conversion { .. })
        ));

        let members = doc(serde_json::json!({"a": 1, "b": null}));
        let mut error = None;
        let partial =
            BTreeMap::<String, u8>::decode_with_error(&mut ValueReader::new(&members), &mut error);
        assert_eq!(partial.map(|m| m.len()), Some(1));
        assert!(error.is_some());

        let mut error = None;
        let partial =
            <[u8; 3]>::decode_with_error(&mut ValueReader::new(&items), &mut error);
        assert_eq!(partial, Some([1, 2, 0]));
        assert!(error.is_some());

        let mut error = None;
        assert_eq!(u8::decode_with_error(&mut ValueReader::new(&items), &mut error), None);
        assert!(error.is_some());

        let mut error = None;
        let whole = Vec::<u8>::decode_with_error(
            &mut ValueReader::new(&doc(serde_json::json!([5]))),
            &mut error,
        );
        assert_eq!(whole, Some(vec![5]));
        assert!(error.is_none());
    }
}
