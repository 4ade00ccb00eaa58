//! Configuration value kinds and values.
//!
//! These are the declared types of leaves in the schema tree. `Sensor`,
//! `Table`, and `Output` are sub-object kinds whose internal shape is opaque
//! to this crate; their payloads are carried as raw [`Value`] rather than
//! decoded further.

use ciborium::Value;

use crate::error::DecodeError;

/// The declared type of a schema leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValueKind {
    /// Malformed or unrecognized; never a valid leaf on its own.
    Invalid,
    /// Unsigned 32-bit integer.
    Uint32,
    /// Single-precision float.
    Float,
    /// Boolean.
    Bool,
    /// UTF-8 string, optionally constrained to a set of `choices`.
    String,
    /// Opaque sensor sub-object.
    Sensor,
    /// Opaque table sub-object.
    Table,
    /// Opaque output sub-object.
    Output,
}

impl ConfigValueKind {
    /// Parses the `_type` discriminator string from a schema leaf.
    ///
    /// Unknown strings yield `None`, which the schema builder treats as a
    /// build failure rather than silently defaulting to `Invalid`.
    pub fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "uint32" => Self::Uint32,
            "float" => Self::Float,
            "bool" => Self::Bool,
            "string" => Self::String,
            "sensor" => Self::Sensor,
            "table" => Self::Table,
            "output" => Self::Output,
            _ => return None,
        })
    }

    /// The `_type` discriminator string for this kind.
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Uint32 => "uint32",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Sensor => "sensor",
            Self::Table => "table",
            Self::Output => "output",
        }
    }
}

/// A value read from, or written to, one schema leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// An unsigned 32-bit value.
    Uint32(u32),
    /// A single-precision float value.
    Float(f32),
    /// A boolean value.
    Bool(bool),
    /// A string value.
    String(String),
    /// A `Sensor`/`Table`/`Output` (or otherwise unrecognized) value, carried
    /// as its raw CBOR payload alongside the kind tag it was decoded under.
    Opaque(ConfigValueKind, Value),
}

impl ConfigValue {
    /// The kind of this value.
    pub fn kind(&self) -> ConfigValueKind {
        match self {
            Self::Uint32(_) => ConfigValueKind::Uint32,
            Self::Float(_) => ConfigValueKind::Float,
            Self::Bool(_) => ConfigValueKind::Bool,
            Self::String(_) => ConfigValueKind::String,
            Self::Opaque(kind, _) => *kind,
        }
    }

    /// Decodes a CBOR value as the scalar of the given declared leaf kind.
    ///
    /// `Sensor`/`Table`/`Output` payloads are not interpreted further and are
    /// always accepted as [`ConfigValue::Opaque`].
    pub fn decode(kind: ConfigValueKind, value: &Value) -> Result<Self, DecodeError> {
        match kind {
            ConfigValueKind::Uint32 => {
                let raw = value.as_integer().ok_or(DecodeError::WrongType {
                    field: "response",
                    expected: "unsigned integer",
                })?;
                let as_u64: Result<u64, _> = raw.try_into();
                let as_u64 =
                    as_u64.map_err(|_| DecodeError::WrongType {
                        field: "response",
                        expected: "unsigned integer",
                    })?;
                let narrowed = u32::try_from(as_u64).map_err(|_| DecodeError::WrongType {
                    field: "response",
                    expected: "value fitting in u32",
                })?;
                Ok(Self::Uint32(narrowed))
            },
            ConfigValueKind::Float => {
                let f = value.as_float().ok_or(DecodeError::WrongType {
                    field: "response",
                    expected: "float",
                })?;
                #[allow(clippy::cast_possible_truncation)]
                Ok(Self::Float(f as f32))
            },
            ConfigValueKind::Bool => {
                let b = value
                    .as_bool()
                    .ok_or(DecodeError::WrongType { field: "response", expected: "bool" })?;
                Ok(Self::Bool(b))
            },
            ConfigValueKind::String => {
                let s = value
                    .as_text()
                    .ok_or(DecodeError::WrongType { field: "response", expected: "string" })?;
                Ok(Self::String(s.to_owned()))
            },
            ConfigValueKind::Sensor | ConfigValueKind::Table | ConfigValueKind::Output => {
                Ok(Self::Opaque(kind, value.clone()))
            },
            ConfigValueKind::Invalid => Err(DecodeError::UnknownLeafKind("invalid".to_owned())),
        }
    }

    /// Encodes this value as the CBOR payload sent in a `set` request's
    /// `value` field.
    pub fn encode(&self) -> Value {
        match self {
            Self::Uint32(v) => Value::Integer((*v).into()),
            Self::Float(v) => Value::Float(f64::from(*v)),
            Self::Bool(v) => Value::Bool(*v),
            Self::String(v) => Value::Text(v.clone()),
            Self::Opaque(_, v) => v.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_string_is_none() {
        assert!(ConfigValueKind::from_wire("widget").is_none());
    }

    #[test]
    fn uint32_round_trips() {
        let value = ConfigValue::Uint32(42);
        let decoded = ConfigValue::decode(ConfigValueKind::Uint32, &value.encode()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn sensor_payload_is_opaque() {
        let raw = Value::Map(vec![(Value::Text("rpm".into()), Value::Integer(1.into()))]);
        let decoded = ConfigValue::decode(ConfigValueKind::Sensor, &raw).unwrap();
        assert_eq!(decoded, ConfigValue::Opaque(ConfigValueKind::Sensor, raw));
    }
}
