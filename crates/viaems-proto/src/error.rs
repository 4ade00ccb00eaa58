//! Error types for the wire codec.
//!
//! These errors cover CBOR decoding and structural validation of message
//! shapes. They carry no notion of "request" or "instance state" — that
//! belongs to the broker in `viaems-client`, which maps these into its own
//! [`ProtocolError`](https://docs.rs/viaems-client) variants.

use thiserror::Error;

/// Errors produced while decoding a single CBOR message or schema sub-tree.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The buffer did not contain a complete CBOR value yet. Callers should
    /// retry once more bytes have arrived; no bytes were consumed.
    #[error("incomplete CBOR value")]
    Incomplete,

    /// CBOR parsing failed outright (invalid encoding, truncated mid-value in
    /// a way that is not simply "need more bytes", etc.).
    #[error("malformed CBOR: {0}")]
    Malformed(String),

    /// The top-level value was not a map.
    #[error("expected a CBOR map at the top level")]
    NotAMap,

    /// A required field was missing from a map.
    #[error("missing field {0:?}")]
    MissingField(&'static str),

    /// A field had the wrong CBOR type.
    #[error("field {field:?} had the wrong type: expected {expected}")]
    WrongType {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable description of the expected type.
        expected: &'static str,
    },

    /// A leaf's `_type` discriminator did not match any known
    /// [`crate::config::ConfigValueKind`].
    #[error("unknown leaf kind {0:?}")]
    UnknownLeafKind(String),

    /// The message's `type` field was missing, non-string, or not one of the
    /// reserved top-level message types.
    #[error("unknown or missing message type")]
    UnknownMessageType,
}

impl From<ciborium::de::Error<std::io::Error>> for DecodeError {
    fn from(err: ciborium::de::Error<std::io::Error>) -> Self {
        match err {
            ciborium::de::Error::Io(io_err)
                if io_err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                Self::Incomplete
            },
            other => Self::Malformed(other.to_string()),
        }
    }
}

impl From<ciborium::value::Error> for DecodeError {
    fn from(err: ciborium::value::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
