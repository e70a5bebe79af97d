//! The IPC-binding method/event routing fabric: two symmetrical routing
//! tables per service instance (method-id → backend, event-id → backend),
//! a pending-request map for correlated responses, and the offer-state
//! gate that tells a proxy whether the service instance is currently up.

pub mod app_error;
pub mod connection;
pub mod event;
pub mod message;
pub mod offer_state;
pub mod packet;
pub mod pending;
pub mod proxy;
pub mod skeleton;

pub use app_error::{ApplicationErrorTable, ErrorCode, ErrorDomain};
pub use connection::{ConnectionSink, RecordingConnectionSink};
pub use event::{NotificationHandler, ProxyEventBackend, SkeletonEventBackend};
pub use message::{
    ApplicationErrorHeader, ErrorResponseHeader, EventSubscriptionHeader, FireAndForgetHeader, MessageKind,
    NotificationHeader, ProtocolMessageHeader, RequestHeader, ResponseHeader, SubscribeAckHeader,
};
pub use offer_state::OfferState;
pub use packet::{decode_envelope, split_header, DecodedEnvelope, Packet};
pub use pending::{MethodFuture, MethodOutcome, PendingRequestMap};
pub use proxy::{ProxyFireAndForgetBackend, ProxyMethodBackend};
pub use skeleton::{MethodHandler, MethodRequest, ResponseHandler, SkeletonFireAndForgetBackend, SkeletonMethodBackend};
