//! Telemetry field keys and values.
//!
//! A [`FieldKey`] describes one column of the device's periodic telemetry
//! ("feed") stream: a name, and a kind that is learned lazily from the first
//! feed sample observed after the describing `description` message (see
//! [`crate::MAX_KEYS`] and the module docs on `viaems-client::protocol` for
//! why the kind starts out unknown).
//!
//! These types derive `serde::Serialize`/`Deserialize` so a host application
//! can snapshot or log telemetry state; the wire codec itself never uses
//! serde, since feed/description messages are irregularly shaped CBOR maps
//! decoded through [`ciborium::Value`] rather than a fixed struct layout.

use serde::{Deserialize, Serialize};

/// The scalar kind of one telemetry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// An unsigned 32-bit integer, narrowed from the CBOR unsigned integer
    /// on the wire.
    Uint32,
    /// An IEEE-754 single-precision float.
    Float,
}

/// A telemetry column descriptor.
///
/// The kind is `None` until the first `feed` message after the `description`
/// that introduced this key is observed — preserved from the original
/// implementation rather than defaulted, so staleness is visible in the
/// type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldKey {
    name: String,
    kind: Option<FieldKind>,
}

impl FieldKey {
    /// Creates a key with no kind learned yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: None }
    }

    /// The field's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field's kind, if it has been learned from a `feed` message yet.
    pub fn kind(&self) -> Option<FieldKind> {
        self.kind
    }

    /// Records the kind learned from a `feed` value.
    pub fn set_kind(&mut self, kind: FieldKind) {
        self.kind = Some(kind);
    }
}

/// A single telemetry sample value, tagged with the kind it was decoded as.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// An unsigned 32-bit sample.
    Uint32(u32),
    /// A single-precision float sample.
    Float(f32),
}

impl FieldValue {
    /// The kind this value was decoded as.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Uint32(_) => FieldKind::Uint32,
            Self::Float(_) => FieldKind::Float,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn field_key_serde_round_trips_through_cbor() {
        let mut key = FieldKey::new("rpm");
        key.set_kind(FieldKind::Uint32);

        let mut encoded = Vec::new();
        ciborium::into_writer(&key, &mut encoded).expect("serializes");
        let decoded: FieldKey = ciborium::de::from_reader(encoded.as_slice()).expect("deserializes");
        assert_eq!(decoded, key);
    }
}
