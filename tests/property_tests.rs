use morlock::codec::Codec;
use morlock::document::{Document, Header};
use morlock::path;
use proptest::prelude::*;
use serde_json::{Map, Value};

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<String>().prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(any::<String>(), inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn document() -> impl Strategy<Value = Document> {
    (
        proptest::option::of(any::<String>()),
        proptest::option::of(any::<String>()),
        prop::collection::btree_map(any::<String>(), json_value(), 0..5),
    )
        .prop_map(|(name, password, data)| Document {
            name,
            password,
            data: data.into_iter().collect::<Map<_, _>>(),
        })
}

proptest! {
    #[test]
    fn test_header_roundtrip(doc in document(), tail in prop::collection::vec(any::<u8>(), 0..64)) {
        let codec = Codec::mp3();
        let mut payload = b"ID3".to_vec();
        payload.extend_from_slice(&tail);

        let header = Header::Present(doc.clone());
        let bytes = codec.assemble(&header, &payload).unwrap();
        let decoded = codec.decode(&bytes).unwrap();

        prop_assert!(decoded.embedded);
        prop_assert_eq!(decoded.document, doc);
        prop_assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn test_encoded_header_is_ascii_without_marker(doc in document()) {
        let bytes = Codec::mp3().encode(&Header::Present(doc)).unwrap();
        prop_assert!(bytes.is_ascii());
        prop_assert!(!bytes.windows(3).any(|w| w == b"ID3"));
    }

    #[test]
    fn test_apply_is_idempotent(
        key in "[a-c]{1,3}(\\[0\\])?(\\.[a-c]{1,3}(\\[[0-1]\\])?){0,2}",
        value in json_value(),
    ) {
        let start = Map::new();
        if let Ok((once, _)) = path::apply(&start, &key, value.clone()) {
            let (twice, changed) = path::apply(&once, &key, value).unwrap();
            prop_assert!(!changed);
            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_apply_first_write_reports_change(
        key in "[a-z]{1,8}",
        value in json_value(),
    ) {
        let (data, changed) = path::apply(&Map::new(), &key, value.clone()).unwrap();
        prop_assert!(changed);
        prop_assert_eq!(data.get(&key), Some(&value));
    }
}
