//! Concurrent request/response broker for the viaems engine-management
//! protocol.
//!
//! This crate drives a live session with a device speaking the protocol
//! defined in `viaems-proto`: it owns the telemetry field-key table, decodes
//! the incoming byte stream one message at a time, and correlates requests
//! with their eventual responses through a small mutex/condvar broker that
//! supports both fire-and-forget async callbacks and blocking calls with a
//! timeout.
//!
//! See [`Protocol`] for the entry point.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod protocol;
mod request;

pub use error::ProtocolError;
pub use protocol::{FeedCallback, IngestResult, Protocol, WriteFn, DEFAULT_REQUEST_TIMEOUT};
pub use request::ResponsePayload;
