//! Property-based tests for the wire codec.
//!
//! These check round-trip and structural invariants hold for arbitrary
//! generated inputs, not just the handful of examples in each module's unit
//! tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ciborium::Value;
use proptest::prelude::*;
use viaems_proto::{
    path::{decode_path, encode_path, PathElement},
    ConfigValue, ConfigValueKind, SchemaNode,
};

fn arbitrary_path_element() -> impl Strategy<Value = PathElement> {
    prop_oneof![
        "[a-z]{1,12}".prop_map(PathElement::Name),
        any::<u32>().prop_map(PathElement::Index),
    ]
}

fn arbitrary_path() -> impl Strategy<Value = Vec<PathElement>> {
    prop::collection::vec(arbitrary_path_element(), 0..8)
}

proptest! {
    /// PROPERTY: any path encodes to a CBOR array and decodes back to the
    /// exact same sequence of elements.
    #[test]
    fn path_roundtrips_through_cbor(path in arbitrary_path()) {
        let decoded = decode_path(&encode_path(&path)).expect("a path we just encoded decodes");
        prop_assert_eq!(decoded, path);
    }

    /// PROPERTY: a scalar `ConfigValue` encoded and re-decoded under its own
    /// kind produces the same value, for every kind the wire format can
    /// actually narrow to (u32, f32-precision float, bool, string).
    #[test]
    fn scalar_config_value_roundtrips(
        u in any::<u32>(),
        f in any::<f32>().prop_filter("finite", |f| f.is_finite()),
        b in any::<bool>(),
        s in "[-a-zA-Z0-9 ]{0,32}",
    ) {
        for value in [
            ConfigValue::Uint32(u),
            ConfigValue::Float(f),
            ConfigValue::Bool(b),
            ConfigValue::String(s.clone()),
        ] {
            let decoded = ConfigValue::decode(value.kind(), &value.encode()).expect("decodes");
            prop_assert_eq!(decoded, value);
        }
    }

    /// PROPERTY: `get`/`set` requests always carry the id and path they were
    /// built with, regardless of id value or path shape.
    #[test]
    fn get_request_carries_id_and_path(id in any::<u32>(), path in arbitrary_path()) {
        let bytes = viaems_proto::message::encode_get_request(id, &path);
        let value: Value = ciborium::de::from_reader(bytes.as_slice()).expect("valid CBOR");
        let entries = value.as_map().expect("a map");
        let find = |key: &str| entries.iter().find(|(k, _)| k.as_text() == Some(key)).map(|(_, v)| v);

        let decoded_id = find("id")
            .and_then(Value::as_integer)
            .and_then(|i| u64::try_from(i).ok())
            .expect("an id field");
        prop_assert_eq!(decoded_id, u64::from(id));

        let decoded_path = decode_path(find("path").expect("a path field")).expect("decodes");
        prop_assert_eq!(decoded_path, path);
    }

    /// PROPERTY: a `set` request always carries the id, path, and value it
    /// was built with, regardless of id value, path shape, or scalar kind.
    #[test]
    fn set_request_carries_id_path_and_value(
        id in any::<u32>(),
        path in arbitrary_path(),
        raw in any::<u32>(),
    ) {
        let value = ConfigValue::Uint32(raw);
        let bytes = viaems_proto::message::encode_set_request(id, &path, &value);
        let decoded: Value = ciborium::de::from_reader(bytes.as_slice()).expect("valid CBOR");
        let entries = decoded.as_map().expect("a map");
        let find = |key: &str| entries.iter().find(|(k, _)| k.as_text() == Some(key)).map(|(_, v)| v);

        prop_assert_eq!(find("method").and_then(Value::as_text), Some("set"));

        let decoded_id = find("id")
            .and_then(Value::as_integer)
            .and_then(|i| u64::try_from(i).ok())
            .expect("an id field");
        prop_assert_eq!(decoded_id, u64::from(id));

        let decoded_path = decode_path(find("path").expect("a path field")).expect("decodes");
        prop_assert_eq!(decoded_path, path);

        let decoded_value = find("value")
            .and_then(Value::as_integer)
            .and_then(|i| u32::try_from(i).ok())
            .expect("a value field");
        prop_assert_eq!(decoded_value, raw);
    }
}

/// Builds an arbitrary schema tree up to a bounded depth, so recursive
/// strategies terminate.
fn arbitrary_schema_value(depth: u32) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Map(vec![(Value::Text("_type".into()), Value::Text("uint32".into()))])),
        Just(Value::Map(vec![(Value::Text("_type".into()), Value::Text("bool".into()))])),
        "[a-z]{1,8}".prop_map(|desc| {
            Value::Map(vec![
                (Value::Text("_type".into()), Value::Text("float".into())),
                (Value::Text("description".into()), Value::Text(desc)),
            ])
        }),
    ];

    if depth == 0 {
        leaf.boxed()
    } else {
        let inner = arbitrary_schema_value(depth - 1).boxed();
        prop_oneof![
            leaf,
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,8}", inner), 0..4).prop_map(|pairs| {
                Value::Map(pairs.into_iter().map(|(k, v)| (Value::Text(k), v)).collect())
            }),
        ]
        .boxed()
    }
}

proptest! {
    /// PROPERTY: every node reachable in a freshly built schema tree resolves
    /// back to itself via `find` on its own reported `path()`.
    #[test]
    fn every_built_node_resolves_via_its_own_path(raw in arbitrary_schema_value(3)) {
        let root = SchemaNode::build(&raw, Vec::new()).expect("well-formed schema fixtures always build");
        prop_assert!(all_paths_resolve(&root, &root));
    }
}

fn all_paths_resolve(root: &SchemaNode, node: &SchemaNode) -> bool {
    if root.find(node.path()) != Some(node) {
        return false;
    }
    match node {
        SchemaNode::List { children, .. } | SchemaNode::Map { children, .. } => {
            children.iter().all(|child| all_paths_resolve(root, child))
        },
        SchemaNode::Leaf { kind, .. } => *kind != ConfigValueKind::Invalid,
    }
}
