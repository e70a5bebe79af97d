//! Proxy-side method backends: the client end of a request/response or
//! fire-and-forget method.

use std::sync::Mutex;
use std::sync::Arc;

use bytes::Bytes;

use crate::access_control::AccessControl;
use crate::error::MemConError;
use crate::id::{ClientId, MethodId, ProvidedServiceInstanceId, SessionIdGenerator};
use crate::router::app_error::{ApplicationErrorTable, ErrorCode};
use crate::router::connection::ConnectionSink;
use crate::router::message::{ApplicationErrorHeader, ErrorResponseHeader, FireAndForgetHeader, MessageKind, RequestHeader, ResponseHeader};
use crate::router::offer_state::OfferState;
use crate::router::packet::{split_header, Packet};
use crate::router::pending::{MethodFuture, MethodOutcome, PendingRequestMap};
use crate::trace::TraceSink;

/// Proxy-side backend for a request/response method.
///
/// Takes the service-up lock before every call: if the service is down the
/// call resolves immediately with `kServiceNotAvailable` instead of
/// allocating a session or touching the connection.
pub struct ProxyMethodBackend {
    service: ProvidedServiceInstanceId,
    method: MethodId,
    client: ClientId,
    offer_state: Arc<OfferState>,
    sessions: Mutex<SessionIdGenerator>,
    pending: PendingRequestMap<Bytes>,
    connection: Arc<dyn ConnectionSink>,
    errors: ApplicationErrorTable,
    trace: Arc<dyn TraceSink>,
    access_control: Arc<dyn AccessControl>,
}

impl ProxyMethodBackend {
    pub fn new(
        service: ProvidedServiceInstanceId,
        method: MethodId,
        client: ClientId,
        offer_state: Arc<OfferState>,
        sessions: SessionIdGenerator,
        connection: Arc<dyn ConnectionSink>,
        errors: ApplicationErrorTable,
        trace: Arc<dyn TraceSink>,
        access_control: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            service,
            method,
            client,
            offer_state,
            sessions: Mutex::new(sessions),
            pending: PendingRequestMap::new(),
            connection,
            errors,
            trace,
            access_control,
        }
    }

    /// Issues a request. Returns a future resolving via
    /// [`ProxyMethodBackend::on_response_received`],
    /// [`ProxyMethodBackend::on_error_response_received`], or
    /// [`ProxyMethodBackend::on_application_error_received`] — or, if the
    /// service was down at call time, pre-resolved with
    /// `kServiceNotAvailable`.
    pub fn call(&self, payload: &[u8]) -> MethodFuture<Bytes> {
        if !self.offer_state.is_offered() {
            let (tx, rx) = futures::channel::oneshot::channel();
            let _ = tx.send(MethodOutcome::MethodError(MemConError::ServiceNotAvailable));
            return rx;
        }

        if !self.access_control.allow_request_tx(self.service, self.method.0, self.client) {
            log::info!("request to {:?}.{:?} denied by access control", self.service, self.method);
            let (tx, rx) = futures::channel::oneshot::channel();
            let _ = tx.send(MethodOutcome::MethodError(MemConError::NetworkBindingFailure {
                detail: "method request denied by access control",
            }));
            return rx;
        }

        let session = self.sessions.lock().unwrap().next_id();
        let rx = match self.pending.insert(session) {
            Ok(rx) => rx,
            Err(e) => {
                let (tx, rx) = futures::channel::oneshot::channel();
                let _ = tx.send(MethodOutcome::MethodError(e));
                return rx;
            }
        };

        let header = RequestHeader {
            method: self.method,
            client: self.client,
            session,
        };
        let packet = match Packet::build(self.service, MessageKind::Request, &header, payload) {
            Ok(p) => p,
            Err(e) => {
                if let Some(tx) = self.pending.move_out_request(session) {
                    let _ = tx.send(MethodOutcome::MethodError(e));
                }
                return rx;
            }
        };

        self.trace.trace_request_send(self.service, self.method, self.client);
        if let Err(e) = self.connection.transmit(packet) {
            if let Some(tx) = self.pending.move_out_request(session) {
                let _ = tx.send(MethodOutcome::MethodError(e));
            }
        }
        rx
    }

    /// Dispatches a received response/error-response/application-error
    /// packet for this method, looking up the pending promise by the
    /// session id carried in the kind-specific header.
    pub fn on_packet_received(&self, kind: MessageKind, rest: &Bytes) -> Result<(), MemConError> {
        match kind {
            MessageKind::Response => {
                let (header, payload): (ResponseHeader, Bytes) = split_header(rest)?;
                if !self.access_control.allow_response_rx(self.service, self.method.0, self.client) {
                    log::info!("response from {:?}.{:?} denied by access control", self.service, self.method);
                    return Ok(());
                }
                self.trace.trace_response(self.service, self.method, self.client);
                if let Some(tx) = self.pending.move_out_request(header.session) {
                    let _ = tx.send(MethodOutcome::Ok(payload));
                }
                Ok(())
            }
            MessageKind::ErrorResponse => {
                let (header, _payload): (ErrorResponseHeader, Bytes) = split_header(rest)?;
                if !self.access_control.allow_error_response_rx(self.service, self.method.0, self.client) {
                    log::info!("error response from {:?}.{:?} denied by access control", self.service, self.method);
                    return Ok(());
                }
                if let Some(tx) = self.pending.move_out_request(header.session) {
                    let _ = tx.send(MethodOutcome::MethodError(header.return_code.to_method_error()));
                }
                Ok(())
            }
            MessageKind::ApplicationErrorResponse => {
                let (header, payload): (ApplicationErrorHeader, Bytes) = split_header(rest)?;
                if !self
                    .access_control
                    .allow_application_error_response_rx(self.service, self.method.0, self.client)
                {
                    log::info!("application error from {:?}.{:?} denied by access control", self.service, self.method);
                    return Ok(());
                }
                self.trace
                    .trace_application_error_response(self.service, self.method, self.client);
                if let Some(tx) = self.pending.move_out_request(header.session) {
                    let outcome = if self.errors.is_empty() {
                        MethodOutcome::MethodError(MemConError::NetworkBindingFailure {
                            detail: "application error received but no error domains configured",
                        })
                    } else {
                        match ErrorCode::decode(payload) {
                            Ok(code) if self.errors.is_known(code.domain, code.code) => MethodOutcome::ApplicationError(code),
                            Ok(_) => MethodOutcome::MethodError(MemConError::NetworkBindingFailure {
                                detail: "application error carried an unconfigured domain/code",
                            }),
                            Err(e) => MethodOutcome::MethodError(e),
                        }
                    };
                    let _ = tx.send(outcome);
                }
                Ok(())
            }
            other => {
                log::warn!("proxy method backend received an unexpected message kind {other:?}");
                Err(MemConError::NetworkBindingFailure {
                    detail: "proxy method backend received an unexpected message kind",
                })
            }
        }
    }

    /// Cancels every in-flight request with `kServiceNotAvailable`; called
    /// on connection loss or a service-down transition.
    pub fn cancel_pending(&self) {
        self.pending.cancel_all();
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Proxy-side backend for a fire-and-forget method: no pending entry is
/// ever created, and a send attempted while the service is down is dropped
/// with a log line rather than surfaced as an error.
pub struct ProxyFireAndForgetBackend {
    service: ProvidedServiceInstanceId,
    method: MethodId,
    client: ClientId,
    offer_state: Arc<OfferState>,
    connection: Arc<dyn ConnectionSink>,
    trace: Arc<dyn TraceSink>,
    access_control: Arc<dyn AccessControl>,
}

impl ProxyFireAndForgetBackend {
    pub fn new(
        service: ProvidedServiceInstanceId,
        method: MethodId,
        client: ClientId,
        offer_state: Arc<OfferState>,
        connection: Arc<dyn ConnectionSink>,
        trace: Arc<dyn TraceSink>,
        access_control: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            service,
            method,
            client,
            offer_state,
            connection,
            trace,
            access_control,
        }
    }

    pub fn send(&self, payload: &[u8]) {
        if !self.offer_state.is_offered() {
            log::debug!(
                "dropping fire-and-forget call to {:?}.{:?}: service not offered",
                self.service,
                self.method
            );
            return;
        }
        if !self.access_control.allow_fire_and_forget_tx(self.service, self.method.0, self.client) {
            log::info!("fire-and-forget call to {:?}.{:?} denied by access control", self.service, self.method);
            return;
        }
        let header = FireAndForgetHeader {
            method: self.method,
            client: self.client,
        };
        let packet = match Packet::build(self.service, MessageKind::FireAndForget, &header, payload) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("failed to build fire-and-forget packet: {e}");
                return;
            }
        };
        self.trace.trace_request_no_return(self.service, self.method, self.client);
        if let Err(e) = self.connection.transmit(packet) {
            log::warn!("failed to transmit fire-and-forget packet: {e}");
        }
    }
}
