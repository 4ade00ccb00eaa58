//! Schema tree builder.
//!
//! Recursively parses a `structure` response payload into a tagged tree of
//! [`SchemaNode`]s, each carrying its own path from the root.

use ciborium::Value;

use crate::{
    config::ConfigValueKind,
    error::DecodeError,
    path::{extended, Path, PathElement},
};

/// A node in the device's configuration schema tree.
///
/// # Invariants
///
/// - `path()` equals the parent's path with the element identifying this
///   node appended (index for `List` children, name for `Map` children). The
///   root's path is empty.
/// - A `Map` node's names and children are the same length, and names are
///   unique within that map.
/// - A `Leaf` with a non-`String` kind never carries `choices`.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// An ordered list of children, indexed positionally.
    List {
        /// This node's path from the root.
        path: Path,
        /// Children in wire order.
        children: Vec<SchemaNode>,
    },
    /// A keyed collection of children, in wire order.
    Map {
        /// This node's path from the root.
        path: Path,
        /// Child names, parallel to `children`.
        names: Vec<String>,
        /// Children, parallel to `names`.
        children: Vec<SchemaNode>,
    },
    /// A terminal, configurable value.
    Leaf {
        /// This node's path from the root.
        path: Path,
        /// The declared type of this leaf.
        kind: ConfigValueKind,
        /// Optional human-readable description.
        description: Option<String>,
        /// Permitted values, present only when `kind == ConfigValueKind::String`.
        choices: Option<Vec<String>>,
    },
}

impl SchemaNode {
    /// This node's path from the schema root.
    pub fn path(&self) -> &[PathElement] {
        match self {
            Self::List { path, .. } | Self::Map { path, .. } | Self::Leaf { path, .. } => path,
        }
    }

    /// Looks up a descendant node by path, returning `self` for the empty
    /// path. Mirrors the original implementation's `structure_find_node`.
    pub fn find(&self, path: &[PathElement]) -> Option<&Self> {
        let Some((head, rest)) = path.split_first() else {
            return Some(self);
        };
        match (self, head) {
            (Self::List { children, .. }, PathElement::Index(idx)) => {
                children.get(*idx as usize).and_then(|child| child.find(rest))
            },
            (Self::Map { names, children, .. }, PathElement::Name(name)) => names
                .iter()
                .position(|n| n == name)
                .and_then(|i| children.get(i))
                .and_then(|child| child.find(rest)),
            _ => None,
        }
    }

    /// Builds a schema tree from a decoded CBOR value, rooted at `path`.
    ///
    /// Called with an empty path for a top-level `structure` response.
    pub fn build(value: &Value, path: Path) -> Result<Self, DecodeError> {
        if let Some(items) = value.as_array() {
            return Self::build_list(items, path);
        }
        if let Some(entries) = value.as_map() {
            if entries.iter().any(|(k, _)| k.as_text() == Some("_type")) {
                return Self::build_leaf(entries, path);
            }
            return Self::build_map(entries, path);
        }
        Err(DecodeError::WrongType { field: "structure node", expected: "array or map" })
    }

    fn build_list(items: &[Value], path: Path) -> Result<Self, DecodeError> {
        let children = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                #[allow(clippy::cast_possible_truncation)]
                let child_path = extended(&path, PathElement::Index(i as u32));
                Self::build(item, child_path)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::List { path, children })
    }

    fn build_map(entries: &[(Value, Value)], path: Path) -> Result<Self, DecodeError> {
        let mut names = Vec::with_capacity(entries.len());
        let mut children = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let name = key
                .as_text()
                .ok_or(DecodeError::WrongType { field: "map key", expected: "string" })?
                .to_owned();
            let child_path = extended(&path, PathElement::Name(name.clone()));
            children.push(Self::build(value, child_path)?);
            names.push(name);
        }
        Ok(Self::Map { path, names, children })
    }

    fn build_leaf(entries: &[(Value, Value)], path: Path) -> Result<Self, DecodeError> {
        let find = |key: &str| entries.iter().find(|(k, _)| k.as_text() == Some(key)).map(|(_, v)| v);

        let type_str = find("_type")
            .and_then(Value::as_text)
            .ok_or(DecodeError::MissingField("_type"))?;
        let kind = ConfigValueKind::from_wire(type_str)
            .ok_or_else(|| DecodeError::UnknownLeafKind(type_str.to_owned()))?;

        let description = find("description").and_then(Value::as_text).map(str::to_owned);

        let choices = if kind == ConfigValueKind::String {
            find("choices")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .map(|item| {
                            item.as_text().map(str::to_owned).ok_or(DecodeError::WrongType {
                                field: "choices",
                                expected: "array of strings",
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?
        } else {
            None
        };

        Ok(Self::Leaf { path, kind, description, choices })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn leaf(path: Path, kind: ConfigValueKind) -> SchemaNode {
        SchemaNode::Leaf { path, kind, description: None, choices: None }
    }

    #[test]
    fn path_of_every_node_resolves_from_root() {
        let raw = Value::Map(vec![(
            Value::Text("sensors".into()),
            Value::Array(vec![Value::Map(vec![(
                Value::Text("_type".into()),
                Value::Text("sensor".into()),
            )])]),
        )]);
        let root = SchemaNode::build(&raw, Vec::new()).unwrap();

        let sensors = root.find(&[PathElement::Name("sensors".into())]).unwrap();
        assert!(matches!(sensors, SchemaNode::List { .. }));

        let leaf = root
            .find(&[PathElement::Name("sensors".into()), PathElement::Index(0)])
            .unwrap();
        assert_eq!(leaf.path(), &[PathElement::Name("sensors".into()), PathElement::Index(0)]);
    }

    #[test]
    fn unknown_leaf_kind_fails_build() {
        let raw = Value::Map(vec![(Value::Text("_type".into()), Value::Text("widget".into()))]);
        assert!(matches!(
            SchemaNode::build(&raw, Vec::new()),
            Err(DecodeError::UnknownLeafKind(_))
        ));
    }

    #[test]
    fn leaf_helper_builds_expected_shape() {
        let node = leaf(vec![PathElement::Index(1)], ConfigValueKind::Bool);
        assert_eq!(node.path(), &[PathElement::Index(1)]);
    }
}
