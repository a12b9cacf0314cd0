use json_conv::{decode_bson, decode_json, encode_bson, encode_json, Map, Value};
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        (-1e12f64..1e12).prop_map(Value::Float),
        "[a-zA-Z0-9 ]{0,8}".prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::ByteString),
    ]
}

fn document() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..6)
                .prop_map(|members| Value::Object(members.into_iter().collect::<Map>())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn json_text_roundtrip(value in document()) {
        let text = encode_json(&value).unwrap();
        prop_assert_eq!(decode_json(&text).unwrap(), value);
    }

    #[test]
    fn bson_roundtrip(value in document()) {
        let wrapped = Value::from_iter([("v", value)]);
        let bytes = encode_bson(&wrapped).unwrap();
        prop_assert_eq!(decode_bson(&bytes).unwrap(), wrapped);
    }

    #[test]
    fn bson_to_json_agrees_with_value_display(value in document()) {
        let wrapped = Value::from_iter([("v", value)]);
        let bytes = encode_bson(&wrapped).unwrap();
        prop_assert_eq!(decode_bson(&bytes).unwrap().to_string(), encode_json(&wrapped).unwrap());
    }
}
