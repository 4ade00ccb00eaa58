//! The single pending-request slot and its associated bookkeeping.
//!
//! A [`RequestSlot`] is shared state, guarded by the mutex/condvar pair that
//! lives on [`crate::Protocol`]. It is deliberately dumb: it just tracks
//! which request (if any) is outstanding and what to do when a matching
//! response arrives. All of the CBOR encoding/decoding and policy decisions
//! live in `protocol.rs`.

use viaems_proto::{ConfigValue, ConfigValueKind, SchemaNode};

use crate::error::ProtocolError;

/// What kind of request occupies the slot, and anything needed to decode
/// its eventual response.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RequestKind {
    /// `structure`: response is a schema tree.
    Structure,
    /// `get`: response is a scalar of the target leaf's declared kind.
    Get {
        /// The declared kind of the leaf being read.
        leaf_kind: ConfigValueKind,
    },
    /// `set`: response is an opaque acknowledgement.
    Set,
}

/// The decoded result of a completed request, handed to the request's
/// callback.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// A `structure` response, fully parsed into a schema tree.
    Structure(SchemaNode),
    /// A `get` response, decoded per the target leaf's kind.
    Value(ConfigValue),
    /// A `set` response: the device acknowledged the write.
    Ack,
}

/// A request's callback. Boxed and type-erased so the slot can hold any
/// request kind uniformly; invoked at most once, on the thread driving
/// [`crate::Protocol::ingest`].
pub(crate) type Callback = Box<dyn FnOnce(Result<ResponsePayload, ProtocolError>) + Send>;

/// An outstanding request: assigned an id, waiting for a correlated
/// response.
pub(crate) struct ActiveRequest {
    pub(crate) id: u32,
    pub(crate) kind: RequestKind,
    pub(crate) callback: Callback,
}

/// The protocol instance's single pending-request slot.
///
/// `None` means idle; `Some` means a request is pending. There is
/// intentionally no separate `active` boolean — `Option::is_some` plays
/// that role, which makes "busy" and "idle" mutually exclusive by
/// construction instead of by convention.
#[derive(Default)]
pub(crate) struct RequestSlot {
    pub(crate) active: Option<ActiveRequest>,
}
