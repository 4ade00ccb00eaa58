//! The protocol engine.
//!
//! [`Protocol`] is the concurrent request/response broker, the glue that
//! drives the frame decoder over an arriving byte stream, and the keeper of
//! the telemetry field-key vector. One instance is created per device
//! session.
//!
//! # Threading model
//!
//! [`Protocol::ingest`] is expected to be called repeatedly from a single
//! "reader" thread as bytes arrive from the transport; every handler,
//! including user-supplied feed and request callbacks, runs on that thread.
//! Client threads call the request methods below, which either return
//! immediately (the async form) or block on a condition variable until a
//! response arrives or a timeout elapses (the blocking form). Share a
//! `Protocol` across threads behind an [`std::sync::Arc`].

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Condvar, Mutex,
    },
    time::{Duration, Instant},
};

use tracing::{debug, trace, warn};
use viaems_proto::{
    message::{self, InboundMessage},
    ConfigValue, DecodeError, FieldKey, FieldKind, FieldValue, Path, SchemaNode, MAX_KEYS,
};

use crate::{
    error::ProtocolError,
    request::{ActiveRequest, Callback, RequestKind, RequestSlot, ResponsePayload},
};

/// Default timeout for blocking request calls, matching the original
/// implementation's fixed 1000 ms wait.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// A process-wide monotonic request id counter, shared across every
/// [`Protocol`] instance exactly as in the original implementation, but made
/// atomic so ids never collide under concurrent multi-instance use.
static NEXT_REQUEST_ID: AtomicU32 = AtomicU32::new(1);

fn next_request_id() -> u32 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// The sink a [`Protocol`] writes encoded outbound messages to.
pub type WriteFn = Box<dyn Fn(&[u8]) + Send + Sync>;

/// The callback invoked once per successfully dispatched `feed` message.
pub type FeedCallback = Box<dyn FnMut(&[FieldKey], &[FieldValue]) + Send>;

/// The outcome of one call to [`Protocol::ingest`].
#[derive(Debug)]
pub struct IngestResult {
    /// Bytes consumed from the front of the buffer passed to `ingest`.
    /// Callers should advance their cursor by this amount and re-invoke
    /// `ingest` on the remainder, even when `outcome` is an error.
    pub consumed: usize,
    /// `Ok(())` if a message was recognized and handled (which does not
    /// imply its payload was semantically accepted — see
    /// [`ProtocolError::FeedMismatch`] and friends); `Err` otherwise.
    pub outcome: Result<(), ProtocolError>,
}

/// A client session with the device.
///
/// Owns the current telemetry schema (field-key vector), the single
/// pending-request slot, and the write-callback used to emit encoded
/// requests. See the module docs for the threading contract.
pub struct Protocol {
    field_keys: Mutex<Vec<FieldKey>>,
    feed_cb: Mutex<Option<FeedCallback>>,
    write_fn: Mutex<Option<WriteFn>>,
    slot: Mutex<RequestSlot>,
    wakeup: Condvar,
    client_mtx: Mutex<()>,
    timeout: Duration,
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol {
    /// Creates a new protocol instance with the default 1 s request
    /// timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a new protocol instance with a custom blocking-call timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            field_keys: Mutex::new(Vec::new()),
            feed_cb: Mutex::new(None),
            write_fn: Mutex::new(None),
            slot: Mutex::new(RequestSlot::default()),
            wakeup: Condvar::new(),
            client_mtx: Mutex::new(()),
            timeout,
        }
    }

    /// Installs the callback used to write encoded outbound bytes to the
    /// transport. Intended to be called once, before the reader thread
    /// starts; treated as read-only thereafter.
    pub fn set_write_fn(&self, write: impl Fn(&[u8]) + Send + Sync + 'static) {
        *lock(&self.write_fn) = Some(Box::new(write));
    }

    /// Installs the callback invoked once per successfully dispatched
    /// `feed` message.
    pub fn set_feed_callback(
        &self,
        callback: impl FnMut(&[FieldKey], &[FieldValue]) + Send + 'static,
    ) {
        *lock(&self.feed_cb) = Some(Box::new(callback));
    }

    /// The current telemetry field keys, in positional order.
    pub fn field_keys(&self) -> Vec<FieldKey> {
        lock(&self.field_keys).clone()
    }

    fn write(&self, bytes: &[u8]) {
        if let Some(write) = lock(&self.write_fn).as_ref() {
            write(bytes);
        } else {
            warn!("no write callback installed; dropping outbound message");
        }
    }

    /// Consumes exactly one CBOR message from the front of `bytes`, and
    /// dispatches it. Call repeatedly until the buffer is empty or
    /// `consumed == 0` (the buffer holds an incomplete message and more
    /// bytes are needed).
    pub fn ingest(&self, bytes: &[u8]) -> IngestResult {
        let (consumed, decoded) = message::decode_message(bytes);
        let outcome = match decoded {
            Ok(InboundMessage::Feed { values }) => self.handle_feed(&values),
            Ok(InboundMessage::Description { keys }) => self.handle_description(keys),
            Ok(InboundMessage::Response { id, response }) => self.handle_response(id, &response),
            Err(DecodeError::UnknownMessageType) => {
                debug!("dropping message with unknown or missing type");
                Err(ProtocolError::UnknownMessageType)
            },
            Err(err) => {
                debug!(error = %err, "dropping malformed frame");
                Err(ProtocolError::MalformedFrame(err))
            },
        };
        IngestResult { consumed, outcome }
    }

    fn handle_description(&self, new_keys: Vec<String>) -> Result<(), ProtocolError> {
        if new_keys.len() > MAX_KEYS {
            warn!(count = new_keys.len(), "description exceeds MAX_KEYS, rejecting");
            return Err(ProtocolError::TooManyKeys(new_keys.len()));
        }

        let mut keys = lock(&self.field_keys);
        let rebuilt = new_keys
            .into_iter()
            .enumerate()
            .map(|(i, name)| match keys.get(i) {
                // Retain the previously learned kind for a name that hasn't changed.
                Some(existing) if existing.name() == name => existing.clone(),
                _ => FieldKey::new(name),
            })
            .collect::<Vec<_>>();
        *keys = rebuilt;
        trace!(count = keys.len(), "applied description");
        Ok(())
    }

    fn handle_feed(&self, raw_values: &[ciborium::Value]) -> Result<(), ProtocolError> {
        let mut keys = lock(&self.field_keys);
        if raw_values.len() != keys.len() {
            debug!(expected = keys.len(), got = raw_values.len(), "feed arity mismatch, dropping");
            return Err(ProtocolError::FeedMismatch);
        }

        let mut values = Vec::with_capacity(raw_values.len());
        for (key, raw) in keys.iter_mut().zip(raw_values) {
            let value = if let Some(v) = raw.as_integer().and_then(|i| u32::try_from(i).ok()) {
                key.set_kind(FieldKind::Uint32);
                FieldValue::Uint32(v)
            } else if let Some(v) = raw.as_float() {
                key.set_kind(FieldKind::Float);
                #[allow(clippy::cast_possible_truncation)]
                FieldValue::Float(v as f32)
            } else {
                debug!("feed value was neither uint nor float, dropping message");
                return Err(ProtocolError::FeedMismatch);
            };
            values.push(value);
        }

        if let Some(cb) = lock(&self.feed_cb).as_mut() {
            cb(&keys, &values);
        }
        Ok(())
    }

    fn handle_response(
        &self,
        id: u64,
        response: &ciborium::Value,
    ) -> Result<(), ProtocolError> {
        let Ok(id) = u32::try_from(id) else {
            debug!("response id out of range, dropping");
            return Err(ProtocolError::MalformedFrame(DecodeError::WrongType {
                field: "id",
                expected: "u32",
            }));
        };

        // Hold the slot lock across the callback invocation, matching the
        // original broker's pattern of signaling completion only while the
        // request mutex is held: a blocking caller waiting on `wakeup` can
        // then trust that the moment it reacquires the lock, any result the
        // callback stored is already visible.
        let mut slot = lock(&self.slot);
        let Some(request) = (match &slot.active {
            Some(active) if active.id == id => slot.active.take(),
            _ => {
                debug!(id, "response id does not match pending request, dropping");
                None
            },
        }) else {
            return Ok(());
        };

        let result = decode_response(request.kind, response);
        (request.callback)(result);
        self.wakeup.notify_one();
        Ok(())
    }

    /// Reserves the pending-request slot for a new request, failing if one
    /// is already active. Encodes nothing; the caller writes the request
    /// bytes itself once the slot is reserved.
    fn reserve(&self, kind: RequestKind, callback: Callback) -> Result<u32, ProtocolError> {
        let mut slot = lock(&self.slot);
        if slot.active.is_some() {
            return Err(ProtocolError::RequestSlotBusy);
        }
        let id = next_request_id();
        slot.active = Some(ActiveRequest { id, kind, callback });
        Ok(id)
    }

    /// Async `structure` request: fetches the full configuration schema
    /// tree. Returns immediately; `callback` runs on the reader thread once
    /// the response arrives.
    pub fn get_structure_async(
        &self,
        callback: impl FnOnce(Result<SchemaNode, ProtocolError>) + Send + 'static,
    ) -> Result<u32, ProtocolError> {
        let id = self.reserve(
            RequestKind::Structure,
            Box::new(move |result| callback(result.map(unwrap_structure))),
        )?;
        self.write(&message::encode_structure_request(id));
        Ok(id)
    }

    /// Blocking `structure` request: waits up to the configured timeout for
    /// the response.
    pub fn get_structure(&self) -> Result<SchemaNode, ProtocolError> {
        let _client_guard = lock(&self.client_mtx);
        self.blocking_call(Self::get_structure_async)
    }

    /// Async `get` request for the leaf at `node`'s path.
    pub fn get_async(
        &self,
        node: &SchemaNode,
        callback: impl FnOnce(Result<ConfigValue, ProtocolError>) + Send + 'static,
    ) -> Result<u32, ProtocolError> {
        let SchemaNode::Leaf { kind, .. } = node else {
            return Err(ProtocolError::NotALeaf);
        };
        let leaf_kind = *kind;
        let path = node.path().to_vec();
        let id = self.reserve(
            RequestKind::Get { leaf_kind },
            Box::new(move |result| callback(result.map(unwrap_value))),
        )?;
        self.write(&message::encode_get_request(id, &path));
        Ok(id)
    }

    /// Blocking `get` request: waits up to the configured timeout for the
    /// response.
    pub fn get(&self, node: &SchemaNode) -> Result<ConfigValue, ProtocolError> {
        let _client_guard = lock(&self.client_mtx);
        self.blocking_call(|protocol, callback| protocol.get_async(node, callback))
    }

    /// Async `set` request, writing `value` to the leaf at `node`'s path.
    pub fn set_async(
        &self,
        node: &SchemaNode,
        value: &ConfigValue,
        callback: impl FnOnce(Result<(), ProtocolError>) + Send + 'static,
    ) -> Result<u32, ProtocolError> {
        if !matches!(node, SchemaNode::Leaf { .. }) {
            return Err(ProtocolError::NotALeaf);
        }
        let path = node.path().to_vec();
        let id = self.reserve(
            RequestKind::Set,
            Box::new(move |result| callback(result.map(|_| ()))),
        )?;
        self.write(&message::encode_set_request(id, &path, value));
        Ok(id)
    }

    /// Blocking `set` request: waits up to the configured timeout for the
    /// device's acknowledgement.
    pub fn set(&self, node: &SchemaNode, value: &ConfigValue) -> Result<(), ProtocolError> {
        let _client_guard = lock(&self.client_mtx);
        self.blocking_call(|protocol, callback| protocol.set_async(node, value, callback))
    }

    /// Shared trampoline for the blocking API: submit via `submit`, wait on
    /// the condition variable up to `self.timeout`, and translate a timeout
    /// into clearing the slot.
    ///
    /// The async callback and this thread communicate through a shared
    /// `Arc<Mutex<Option<_>>>` rather than the request slot itself, so the
    /// callback can store its result and call `notify_one` without needing
    /// to know anything about blocking callers at all — `get_async` and
    /// `get` share the exact same dispatch path.
    fn blocking_call<T: Send + 'static>(
        &self,
        submit: impl FnOnce(&Self, Box<dyn FnOnce(Result<T, ProtocolError>) + Send>) -> Result<u32, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        let slot: Arc<Mutex<Option<Result<T, ProtocolError>>>> = Arc::new(Mutex::new(None));
        let callback_slot = Arc::clone(&slot);

        let id = submit(
            self,
            Box::new(move |value| {
                *lock(&callback_slot) = Some(value);
            }),
        )?;

        let mut guard = lock(&self.slot);
        let deadline = Instant::now() + self.timeout;
        loop {
            if lock(&slot).is_some() {
                break;
            }
            if guard.active.as_ref().is_none_or(|a| a.id != id) {
                // The slot moved on without us (e.g. another blocking_call's
                // timeout already cleared it); the result, if any, is still
                // delivered via `slot` above.
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                guard.active = None;
                break;
            }
            let (next_guard, timed_out) = self
                .wakeup
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard = next_guard;
            if timed_out.timed_out() && guard.active.as_ref().is_some_and(|a| a.id == id) {
                guard.active = None;
            }
        }
        drop(guard);

        lock(&slot).take().unwrap_or(Err(ProtocolError::Timeout))
    }
}

fn unwrap_structure(payload: ResponsePayload) -> SchemaNode {
    match payload {
        ResponsePayload::Structure(node) => node,
        _ => unreachable!("structure request always completes with ResponsePayload::Structure"),
    }
}

fn unwrap_value(payload: ResponsePayload) -> ConfigValue {
    match payload {
        ResponsePayload::Value(value) => value,
        _ => unreachable!("get request always completes with ResponsePayload::Value"),
    }
}

fn decode_response(
    kind: RequestKind,
    response: &ciborium::Value,
) -> Result<ResponsePayload, ProtocolError> {
    match kind {
        RequestKind::Structure => SchemaNode::build(response, Path::new())
            .map(ResponsePayload::Structure)
            .map_err(decode_error_to_protocol_error),
        RequestKind::Get { leaf_kind } => ConfigValue::decode(leaf_kind, response)
            .map(ResponsePayload::Value)
            .map_err(decode_error_to_protocol_error),
        RequestKind::Set => Ok(ResponsePayload::Ack),
    }
}

/// A schema leaf's `_type` discriminator not matching any known kind gets
/// its own [`ProtocolError`] variant rather than folding into the generic
/// [`ProtocolError::MalformedFrame`], since it is a distinct, documented
/// failure mode (an unrecognized leaf kind, not a wire-format violation).
fn decode_error_to_protocol_error(err: DecodeError) -> ProtocolError {
    match err {
        DecodeError::UnknownLeafKind(_) => ProtocolError::UnknownLeafKind,
        other => ProtocolError::MalformedFrame(other),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
