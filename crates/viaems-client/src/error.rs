//! Error types for the protocol engine.
//!
//! Every fallible operation on [`crate::Protocol`] returns a
//! [`ProtocolError`]. Errors are always local to a single message or a
//! single request — nothing here tears down the instance, and the caller
//! observes failures only through the `Result` it gets back.

use thiserror::Error;
use viaems_proto::DecodeError;

/// Errors surfaced by the protocol engine.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// CBOR parsing failed, or a message's structure didn't match its
    /// declared `type`. The frame is dropped; the instance remains usable.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] DecodeError),

    /// The message's `type` field was missing, non-string, or not one of
    /// the reserved top-level message types.
    #[error("unknown message type")]
    UnknownMessageType,

    /// A `feed` message's value count didn't match the current field-key
    /// count, or one of its values wasn't a uint/float. The message was
    /// dropped without invoking the feed callback.
    #[error("feed message arity or type mismatch")]
    FeedMismatch,

    /// A `description` message listed more than [`viaems_proto::MAX_KEYS`]
    /// fields. The message was rejected; prior state is unchanged.
    #[error("description exceeds MAX_KEYS ({0} entries)")]
    TooManyKeys(usize),

    /// A schema leaf's `_type` discriminator did not match any known kind.
    #[error("unknown leaf kind in structure response")]
    UnknownLeafKind,

    /// An async request was submitted while another request was already
    /// active on this instance's single pending-request slot.
    #[error("a request is already pending on this instance")]
    RequestSlotBusy,

    /// The blocking call did not receive a matching response before its
    /// timeout elapsed. The slot has been cleared and is reusable; any
    /// response that arrives later for the original id will be dropped.
    #[error("request timed out waiting for a response")]
    Timeout,

    /// A `get`/`set` request was issued against a node that was not a
    /// `Leaf`.
    #[error("target schema node is not a leaf")]
    NotALeaf,
}
