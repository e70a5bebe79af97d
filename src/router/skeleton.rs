//! Skeleton-side method backends: the server end of a request/response or
//! fire-and-forget method.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;

use crate::access_control::AccessControl;
use crate::error::MemConError;
use crate::id::{ClientId, MethodId, ProvidedServiceInstanceId, SessionId};
use crate::router::app_error::ErrorCode;
use crate::router::connection::ConnectionSink;
use crate::router::message::{ApplicationErrorHeader, ErrorResponseHeader, FireAndForgetHeader, MessageKind, RequestHeader, ResponseHeader};
use crate::router::packet::{split_header, Packet};
use crate::trace::TraceSink;

/// A received method request, handed to the application dispatch callback
/// alongside a [`ResponseHandler`]. The payload is kept as raw bytes —
/// deserialization happens lazily, only if the application asks for it.
#[derive(Debug, Clone)]
pub struct MethodRequest {
    pub service: ProvidedServiceInstanceId,
    pub method: MethodId,
    pub client: ClientId,
    session: SessionId,
    payload: Bytes,
}

impl MethodRequest {
    /// Raw request payload; the application deserializes this with
    /// whatever codec the interface was generated for.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// One-shot handle for replying to a [`MethodRequest`]. Consumed by
/// whichever of `respond`/`respond_error`/`respond_application_error` the
/// dispatch callback calls; dropping it without replying silently leaves
/// the caller's pending future unresolved until it times out or the
/// connection drops, matching the non-blocking nature of the rest of this
/// router.
pub struct ResponseHandler {
    service: ProvidedServiceInstanceId,
    method: MethodId,
    client: ClientId,
    session: SessionId,
    connection: Weak<dyn ConnectionSink>,
    trace: Arc<dyn TraceSink>,
    access_control: Arc<dyn AccessControl>,
}

impl ResponseHandler {
    fn transmit(&self, kind: MessageKind, header_bytes: Packet) -> Result<(), MemConError> {
        match self.connection.upgrade() {
            Some(connection) => connection.transmit(header_bytes),
            None => {
                log::debug!("dropping {kind:?} reply: connection already gone");
                Err(MemConError::PeerDisconnected {
                    receiver: crate::id::ReceiverId::new(0, 0),
                })
            }
        }
    }

    /// Sends a successful response. Serializes the header up front; the
    /// caller serializes `payload` just before calling this — there is no
    /// intermediate buffering of an unserialized result type inside this
    /// crate.
    pub fn respond(self, payload: &[u8]) -> Result<(), MemConError> {
        if !self.access_control.allow_response_tx(self.service, self.method.0, self.client) {
            log::info!("response from {:?}.{:?} denied by access control", self.service, self.method);
            return Ok(());
        }
        let header = ResponseHeader {
            method: self.method,
            client: self.client,
            session: self.session,
        };
        let packet = Packet::build(self.service, MessageKind::Response, &header, payload)?;
        self.trace.trace_response(self.service, self.method, self.client);
        self.transmit(MessageKind::Response, packet)
    }

    /// Sends a method-level error response carrying `return_code`.
    pub fn respond_error(self, return_code: crate::error::ReturnCode) -> Result<(), MemConError> {
        if !self.access_control.allow_error_response_tx(self.service, self.method.0, self.client) {
            log::info!("error response from {:?}.{:?} denied by access control", self.service, self.method);
            return Ok(());
        }
        let header = ErrorResponseHeader {
            method: self.method,
            client: self.client,
            session: self.session,
            return_code,
        };
        let packet = Packet::build(self.service, MessageKind::ErrorResponse, &header, &[])?;
        self.transmit(MessageKind::ErrorResponse, packet)
    }

    /// Sends an application-level error response.
    pub fn respond_application_error(self, error: &ErrorCode) -> Result<(), MemConError> {
        if !self
            .access_control
            .allow_application_error_response_tx(self.service, self.method.0, self.client)
        {
            log::info!("application error from {:?}.{:?} denied by access control", self.service, self.method);
            return Ok(());
        }
        let header = ApplicationErrorHeader {
            method: self.method,
            client: self.client,
            session: self.session,
        };
        let payload = error.encode();
        let packet = Packet::build(self.service, MessageKind::ApplicationErrorResponse, &header, &payload)?;
        self.trace
            .trace_application_error_response(self.service, self.method, self.client);
        self.transmit(MessageKind::ApplicationErrorResponse, packet)
    }
}

/// Dispatch callback installed by the application for one method, invoked
/// once per received request. Modeled the same way
/// [`crate::receiver::callbacks::TransitionCallback`] models the receiver's
/// transition hook.
pub type MethodHandler = Arc<dyn Fn(MethodRequest, ResponseHandler) + Send + Sync>;

/// Skeleton-side backend for a request/response method.
///
/// Dispatch is guarded by an atomic flag rather than a lock so that
/// `deregister` can take effect immediately without blocking on an
/// in-flight dispatch; requests received after deregistration are dropped
/// with a debug log instead of reaching the application.
pub struct SkeletonMethodBackend {
    service: ProvidedServiceInstanceId,
    method: MethodId,
    connection: Weak<dyn ConnectionSink>,
    trace: Arc<dyn TraceSink>,
    access_control: Arc<dyn AccessControl>,
    handler: MethodHandler,
    active: AtomicBool,
}

impl SkeletonMethodBackend {
    pub fn new(
        service: ProvidedServiceInstanceId,
        method: MethodId,
        connection: Weak<dyn ConnectionSink>,
        trace: Arc<dyn TraceSink>,
        access_control: Arc<dyn AccessControl>,
        handler: MethodHandler,
    ) -> Self {
        Self {
            service,
            method,
            connection,
            trace,
            access_control,
            handler,
            active: AtomicBool::new(true),
        }
    }

    /// Stops future dispatch. Idempotent.
    pub fn deregister(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Parses a received request packet and, if still active, invokes the
    /// dispatch callback with a [`MethodRequest`]/[`ResponseHandler`] pair.
    pub fn on_packet_received(&self, client: ClientId, rest: &Bytes) -> Result<(), MemConError> {
        let (header, payload): (RequestHeader, Bytes) = split_header(rest)?;

        if !self.access_control.allow_request_rx(self.service, self.method.0, client) {
            log::info!("request to {:?}.{:?} denied by access control", self.service, self.method);
            return Ok(());
        }
        self.trace.trace_request_receive(self.service, self.method, client);

        if !self.is_active() {
            log::debug!("dropping request for deregistered method {:?}.{:?}", self.service, self.method);
            return Ok(());
        }

        let request = MethodRequest {
            service: self.service,
            method: self.method,
            client,
            session: header.session,
            payload,
        };
        let handler = ResponseHandler {
            service: self.service,
            method: self.method,
            client,
            session: header.session,
            connection: self.connection.clone(),
            trace: self.trace.clone(),
            access_control: self.access_control.clone(),
        };
        (self.handler)(request, handler);
        Ok(())
    }
}

/// Skeleton-side backend for a fire-and-forget method: no response path at
/// all, just dispatch.
pub struct SkeletonFireAndForgetBackend {
    service: ProvidedServiceInstanceId,
    method: MethodId,
    trace: Arc<dyn TraceSink>,
    access_control: Arc<dyn AccessControl>,
    handler: Arc<dyn Fn(Bytes, ClientId) + Send + Sync>,
    active: AtomicBool,
}

impl SkeletonFireAndForgetBackend {
    pub fn new(
        service: ProvidedServiceInstanceId,
        method: MethodId,
        trace: Arc<dyn TraceSink>,
        access_control: Arc<dyn AccessControl>,
        handler: Arc<dyn Fn(Bytes, ClientId) + Send + Sync>,
    ) -> Self {
        Self {
            service,
            method,
            trace,
            access_control,
            handler,
            active: AtomicBool::new(true),
        }
    }

    pub fn deregister(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn on_packet_received(&self, rest: &Bytes) -> Result<(), MemConError> {
        let (header, payload): (FireAndForgetHeader, Bytes) = split_header(rest)?;
        if !self.access_control.allow_fire_and_forget_rx(self.service, self.method.0, header.client) {
            log::info!("fire-and-forget to {:?}.{:?} denied by access control", self.service, self.method);
            return Ok(());
        }
        if !self.active.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.trace.trace_request_receive(self.service, self.method, header.client);
        (self.handler)(payload, header.client);
        Ok(())
    }
}
