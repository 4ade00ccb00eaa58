//! Schema paths.
//!
//! A path locates a node in the schema tree from the root: a sequence of
//! either map-key names or list indices. The empty path denotes the root
//! itself.

use ciborium::Value;

use crate::error::DecodeError;

/// One element of a [`Path`]: a map key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// A map child selected by name.
    Name(String),
    /// A list child selected by index.
    Index(u32),
}

/// An ordered sequence of path elements identifying a node from the schema
/// root. The empty vector denotes the root.
pub type Path = Vec<PathElement>;

/// Returns `path` with `element` appended, without mutating `path`.
///
/// Schema nodes each own their path outright (cloned and extended from the
/// parent's), so the tree can be disassembled or dropped in any order
/// without dangling references.
pub fn extended(path: &[PathElement], element: PathElement) -> Path {
    let mut next = Vec::with_capacity(path.len() + 1);
    next.extend_from_slice(path);
    next.push(element);
    next
}

/// Encodes a path as the CBOR array the wire protocol expects: integers for
/// indices, text strings for names.
pub fn encode_path(path: &[PathElement]) -> Value {
    Value::Array(
        path.iter()
            .map(|element| match element {
                PathElement::Name(name) => Value::Text(name.clone()),
                PathElement::Index(idx) => Value::Integer((*idx).into()),
            })
            .collect(),
    )
}

/// Decodes a CBOR array of path elements back into a [`Path`].
///
/// Used for round-trip testing of encoded requests; the device never sends
/// paths to us, only the reverse.
pub fn decode_path(value: &Value) -> Result<Path, DecodeError> {
    let items = value.as_array().ok_or(DecodeError::WrongType {
        field: "path",
        expected: "array",
    })?;
    items
        .iter()
        .map(|item| {
            if let Some(text) = item.as_text() {
                Ok(PathElement::Name(text.to_owned()))
            } else if let Some(int) = item.as_integer() {
                let idx: i128 = int.into();
                u32::try_from(idx)
                    .map(PathElement::Index)
                    .map_err(|_| DecodeError::WrongType { field: "path element", expected: "u32" })
            } else {
                Err(DecodeError::WrongType { field: "path element", expected: "string or integer" })
            }
        })
        .collect()
}
