//! Top-level message envelopes.
//!
//! The wire protocol is CBOR-encoded maps, one per logical message,
//! concatenated on the byte stream with no framing beyond CBOR's
//! self-delimiting structure. [`decode_message`] consumes exactly one such
//! map and reports how many bytes it used, so a caller can repeatedly
//! re-invoke it over an arriving byte stream.

use std::io::Cursor;

use ciborium::Value;

use crate::{
    config::ConfigValue,
    error::DecodeError,
    path::{encode_path, Path},
};

/// One fully-decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `{ type: "feed", values: [...] }`
    Feed {
        /// Raw per-field values, not yet matched against field kinds — the
        /// caller (the broker, which owns the field-key vector) does that.
        values: Vec<Value>,
    },
    /// `{ type: "description", keys: [...] }`
    Description {
        /// Field names in positional order.
        keys: Vec<String>,
    },
    /// `{ type: "response", id: ..., response: ... }`
    Response {
        /// The request id this response correlates to.
        id: u64,
        /// The raw response payload, decoded per the request's method.
        response: Value,
    },
}

/// Decodes exactly one CBOR map from the front of `bytes`.
///
/// Returns the number of bytes consumed alongside the decode outcome. The
/// consumed count reflects the top-level CBOR value: it is `0` only when
/// that value itself was incomplete (the caller should retry once more
/// bytes have arrived); once the top-level map has been fully tokenized,
/// `consumed` covers its entire length even if dispatching on its `type`
/// subsequently fails, matching the frame decoder's contract that a
/// rejected message still advances the cursor past it.
pub fn decode_message(bytes: &[u8]) -> (usize, Result<InboundMessage, DecodeError>) {
    let mut cursor = Cursor::new(bytes);
    let value: Value = match ciborium::de::from_reader(&mut cursor) {
        Ok(value) => value,
        Err(err) => return (0, Err(err.into())),
    };
    let consumed = usize::try_from(cursor.position()).unwrap_or(bytes.len());

    (consumed, decode_body(&value))
}

fn decode_body(value: &Value) -> Result<InboundMessage, DecodeError> {
    let entries = value.as_map().ok_or(DecodeError::NotAMap)?;
    let find = |key: &str| entries.iter().find(|(k, _)| k.as_text() == Some(key)).map(|(_, v)| v);

    let Some(type_str) = find("type").and_then(Value::as_text) else {
        return Err(DecodeError::UnknownMessageType);
    };

    let message = match type_str {
        "feed" => {
            let values = find("values")
                .and_then(Value::as_array)
                .ok_or(DecodeError::MissingField("values"))?
                .clone();
            InboundMessage::Feed { values }
        },
        "description" => {
            let keys = find("keys")
                .and_then(Value::as_array)
                .ok_or(DecodeError::MissingField("keys"))?
                .iter()
                .map(|item| {
                    item.as_text().map(str::to_owned).ok_or(DecodeError::WrongType {
                        field: "keys",
                        expected: "array of strings",
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            InboundMessage::Description { keys }
        },
        "response" => {
            let id = find("id")
                .and_then(Value::as_integer)
                .and_then(|i| u64::try_from(i).ok())
                .ok_or(DecodeError::MissingField("id"))?;
            let response =
                find("response").cloned().ok_or(DecodeError::MissingField("response"))?;
            InboundMessage::Response { id, response }
        },
        _ => return Err(DecodeError::UnknownMessageType),
    };

    Ok(message)
}

/// The three request methods the device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    /// Fetch the full configuration schema tree.
    Structure,
    /// Read one leaf's value.
    Get,
    /// Write one leaf's value.
    Set,
}

impl RequestMethod {
    fn as_wire_str(self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Get => "get",
            Self::Set => "set",
        }
    }
}

/// Encodes a `structure` request.
pub fn encode_structure_request(id: u32) -> Vec<u8> {
    encode_request(RequestMethod::Structure, id, None, None)
}

/// Encodes a `get` request for the leaf at `path`.
pub fn encode_get_request(id: u32, path: &Path) -> Vec<u8> {
    encode_request(RequestMethod::Get, id, Some(path), None)
}

/// Encodes a `set` request for the leaf at `path`, carrying `value`.
pub fn encode_set_request(id: u32, path: &Path, value: &ConfigValue) -> Vec<u8> {
    encode_request(RequestMethod::Set, id, Some(path), Some(value))
}

fn encode_request(
    method: RequestMethod,
    id: u32,
    path: Option<&Path>,
    value: Option<&ConfigValue>,
) -> Vec<u8> {
    let mut entries = vec![
        (Value::Text("type".into()), Value::Text("request".into())),
        (Value::Text("method".into()), Value::Text(method.as_wire_str().into())),
        (Value::Text("id".into()), Value::Integer(id.into())),
    ];
    if let Some(path) = path {
        entries.push((Value::Text("path".into()), encode_path(path)));
    }
    if let Some(value) = value {
        entries.push((Value::Text("value".into()), value.encode()));
    }

    let mut buf = Vec::new();
    #[allow(clippy::unwrap_used)]
    ciborium::into_writer(&Value::Map(entries), &mut buf).unwrap();
    buf
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::path::PathElement;

    #[test]
    fn get_request_round_trips() {
        let path = vec![PathElement::Name("sensors".into()), PathElement::Index(0)];
        let bytes = encode_get_request(7, &path);

        let value: Value = ciborium::de::from_reader(Cursor::new(&bytes)).unwrap();
        let entries = value.as_map().unwrap();
        let find = |key: &str| entries.iter().find(|(k, _)| k.as_text() == Some(key)).map(|(_, v)| v);

        assert_eq!(find("type").and_then(Value::as_text), Some("request"));
        assert_eq!(find("method").and_then(Value::as_text), Some("get"));
        assert_eq!(find("id").and_then(Value::as_integer).and_then(|i| u64::try_from(i).ok()), Some(7));
        assert_eq!(crate::path::decode_path(find("path").unwrap()).unwrap(), path);
    }

    #[test]
    fn structure_request_has_no_path() {
        let bytes = encode_structure_request(1);
        let value: Value = ciborium::de::from_reader(Cursor::new(&bytes)).unwrap();
        let entries = value.as_map().unwrap();
        assert!(!entries.iter().any(|(k, _)| k.as_text() == Some("path")));
    }

    #[test]
    fn incomplete_buffer_reports_zero_consumed() {
        // A map header claiming one entry, with nothing following it.
        let truncated = [0xa1_u8];
        let (consumed, outcome) = decode_message(&truncated);
        assert_eq!(consumed, 0);
        assert!(matches!(outcome.unwrap_err(), DecodeError::Incomplete));
    }

    #[test]
    fn unknown_type_is_rejected_but_still_consumes_the_message() {
        let mut buf = Vec::new();
        let value = Value::Map(vec![(Value::Text("type".into()), Value::Text("bogus".into()))]);
        ciborium::into_writer(&value, &mut buf).unwrap();
        let (consumed, outcome) = decode_message(&buf);
        assert_eq!(consumed, buf.len());
        assert!(matches!(outcome.unwrap_err(), DecodeError::UnknownMessageType));
    }
}
