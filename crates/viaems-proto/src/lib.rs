//! Wire types and CBOR codec for the viaems engine-management protocol.
//!
//! This crate is the sans-IO wire layer: CBOR message shapes, the schema
//! tree builder, and the typed configuration/telemetry domain model. It has
//! no threads, no callbacks, and no notion of "the device" — it only knows
//! how to turn bytes into typed values and back. The concurrent broker that
//! drives a live session lives in `viaems-client`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod field;
pub mod message;
pub mod path;
pub mod schema;

/// Maximum number of telemetry fields the protocol tracks per
/// `description`/`feed` pair. A `description` with more entries than this is
/// rejected outright.
pub const MAX_KEYS: usize = 64;

pub use config::{ConfigValue, ConfigValueKind};
pub use error::DecodeError;
pub use field::{FieldKey, FieldKind, FieldValue};
pub use message::{InboundMessage, RequestMethod};
pub use path::{Path, PathElement};
pub use schema::SchemaNode;
