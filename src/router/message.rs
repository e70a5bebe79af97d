//! IPC method wire headers: `[protocol_message_header | (request|response|
//! error|app-error|subscribe|unsubscribe|notification)_header | payload]`.

use speedy::{Readable, Writable};

use crate::id::{ClientId, EventId, MethodId, ProvidedServiceInstanceId, SessionId};

/// The outermost envelope every method/event message carries, ahead of the
/// message-kind-specific header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct ProtocolMessageHeader {
    pub service: ProvidedServiceInstanceId,
    pub kind: MessageKind,
}

/// Discriminates the header that follows a [`ProtocolMessageHeader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub enum MessageKind {
    Request,
    Response,
    ErrorResponse,
    ApplicationErrorResponse,
    FireAndForget,
    Subscribe,
    Unsubscribe,
    SubscribeAck,
    SubscribeNack,
    Notification,
}

/// Request header: service/instance/major-version are carried in the
/// [`ProtocolMessageHeader`]; this carries the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct RequestHeader {
    pub method: MethodId,
    pub client: ClientId,
    pub session: SessionId,
}

/// Response header: correlates back to a request by session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct ResponseHeader {
    pub method: MethodId,
    pub client: ClientId,
    pub session: SessionId,
}

/// Error-response header, adding the well-known return-code field (see
/// [`crate::error::ReturnCode`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct ErrorResponseHeader {
    pub method: MethodId,
    pub client: ClientId,
    pub session: SessionId,
    pub return_code: crate::error::ReturnCode,
}

/// Application-error-response header; the payload that follows is the
/// ASN.1-structured `ApplicationError` encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct ApplicationErrorHeader {
    pub method: MethodId,
    pub client: ClientId,
    pub session: SessionId,
}

/// Fire-and-forget header: same shape as a request, but no session is ever
/// used to correlate a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct FireAndForgetHeader {
    pub method: MethodId,
    pub client: ClientId,
}

/// Event subscribe/unsubscribe header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct EventSubscriptionHeader {
    pub event: EventId,
    pub client: ClientId,
}

/// Subscribe ack/nack header, correlating back to a subscribe request by
/// event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct SubscribeAckHeader {
    pub event: EventId,
    pub client: ClientId,
    pub accepted: bool,
}

/// Event notification header carrying the payload of one published sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable)]
pub struct NotificationHeader {
    pub event: EventId,
}
