//! Error kinds shared across the receiver state machine, the server
//! builder, and the method/event router.

use thiserror::Error;

use crate::id::ReceiverId;

/// The closed set of error kinds this crate can surface to an application.
///
/// Every operation that can fail returns one of these through a `Result`;
/// none of the machinery in this crate panics or throws on an expected
/// failure path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemConError {
    /// Operation invalid for the receiver's current state (e.g. `Connect`
    /// called twice, or `Terminate` on an already-disconnected receiver).
    #[error("unexpected receiver state for receiver {receiver:?}: {detail}")]
    UnexpectedReceiverState {
        receiver: ReceiverId,
        detail: &'static str,
    },

    /// The peer closed the side channel without sending a protocol
    /// termination frame.
    #[error("peer disconnected without protocol termination (receiver {receiver:?})")]
    PeerDisconnected { receiver: ReceiverId },

    /// The peer process ended abnormally, as detected by the side channel.
    #[error("peer crashed (receiver {receiver:?})")]
    PeerCrashed { receiver: ReceiverId },

    /// An unexpected or out-of-sequence control frame was received, or a
    /// send of a well-formed frame failed.
    #[error("protocol error for receiver {receiver:?}: {detail}")]
    ProtocolError {
        receiver: ReceiverId,
        detail: &'static str,
    },

    /// The server builder failed to allocate slot or queue memory.
    #[error("memory allocation failed while building server: {detail}")]
    MemoryError { detail: String },

    /// A method was invoked while the service instance is not offered, or
    /// a response indicated the same on the peer side.
    #[error("service not available")]
    ServiceNotAvailable,

    /// An unspecified transport or deserialization failure, also used for
    /// application errors whose domain is not configured locally.
    #[error("network binding failure: {detail}")]
    NetworkBindingFailure { detail: &'static str },

    /// The skeleton side failed to deserialize the method arguments.
    #[error("method arguments could not be retrieved: {detail}")]
    MethodArgumentsNotRetrieved { detail: String },

    /// `Server::register_receiver_for_incoming_side_channel` was called with
    /// a `ClassHandle` the server was not built with.
    #[error("unknown receiver class {class:?} (server configured with {num_classes} classes)")]
    UnknownReceiverClass {
        class: crate::id::ClassHandle,
        num_classes: usize,
    },

    /// `Server::register_receiver_for_incoming_side_channel` was called
    /// while the server already holds `max_receivers` live receivers.
    #[error("server receiver capacity exhausted ({max_receivers} max)")]
    ReceiverCapacityExhausted { max_receivers: usize },

    /// A session id arrived twice for the same (service, instance, client,
    /// method) before the first was resolved — a `kProtocolError` raised
    /// by the method router rather than the receiver state machine, so it
    /// carries a session id instead of a `ReceiverId`.
    #[error("duplicate session id {session:?} in pending request map")]
    DuplicateSession { session: crate::id::SessionId },
}

impl MemConError {
    /// Returns `true` for the errors that are always fatal to a receiver
    /// (they escalate it to `Corrupted`), as opposed to errors surfaced
    /// only through a returned `Result` to the application.
    pub fn is_receiver_fatal(&self) -> bool {
        matches!(
            self,
            MemConError::PeerDisconnected { .. }
                | MemConError::PeerCrashed { .. }
                | MemConError::ProtocolError { .. }
        )
    }
}

/// Error produced by [`crate::server::ServerBuilder`] when construction
/// parameters are incomplete or invalid.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuilderError {
    #[error("builder parameter '{0}' was set more than once")]
    ParameterAlreadySet(&'static str),

    #[error("builder parameter '{0}' was never set")]
    ParameterMissing(&'static str),

    #[error("builder was already consumed by a previous call to build()")]
    AlreadyBuilt,

    #[error("content_alignment must be a non-zero power of two, got {0}")]
    AlignmentNotPowerOfTwo(usize),

    #[error("num_slots must be >= 1")]
    ZeroSlots,

    #[error("content_size must be >= 1")]
    ZeroContentSize,

    #[error("max_receivers must be >= 1 and <= {limit}, got {actual}")]
    MaxReceiversOutOfRange { actual: usize, limit: usize },

    #[error("receiver class index {0} has no configured concurrency limit")]
    MissingClassLimit(usize),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Error produced by the shared-memory manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("failed to allocate {requested} bytes for {region}")]
    AllocationFailed { region: &'static str, requested: usize },

    #[error("exchange handle {0:?} is unknown or already consumed")]
    UnknownExchangeHandle(crate::memory::ExchangeHandle),
}

/// Well-known return codes carried by an error-response control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde_repr::Serialize_repr, serde_repr::Deserialize_repr, speedy::Readable, speedy::Writable)]
#[repr(u8)]
pub enum ReturnCode {
    Ok = 0,
    ServiceNotAvailable = 1,
    NetworkBindingFailure = 2,
    MethodArgumentsNotRetrieved = 3,
    Unknown = 255,
}

impl ReturnCode {
    /// Maps an error-response return code onto the `MemConError` the proxy
    /// should resolve its pending future with: `ServiceNotAvailable` when
    /// the return code indicates so, else `NetworkBindingFailure`.
    pub fn to_method_error(self) -> MemConError {
        match self {
            ReturnCode::ServiceNotAvailable => MemConError::ServiceNotAvailable,
            _ => MemConError::NetworkBindingFailure {
                detail: "error response return code",
            },
        }
    }
}
