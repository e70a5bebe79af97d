//! Trace sink: eight emission points covering method request/response and
//! event traffic.
//!
//! Each call passes immutable identifiers and, for proxy-side points, the
//! client id. The default implementation is a no-op; an
//! embedder wires up a real sink by implementing
//! this trait.

use crate::id::{ClientId, EventId, MethodId, ProvidedServiceInstanceId};

/// Eight trace emission points: request send/receive,
/// fire-and-forget ("request-no-return"), response, application-error
/// response, plus the three event-side points (send, send-allocate,
/// read-sample).
pub trait TraceSink: Send + Sync {
    /// Proxy side: a method request was serialized and handed to the
    /// connection.
    fn trace_request_send(&self, _service: ProvidedServiceInstanceId, _method: MethodId, _client: ClientId) {}

    /// Skeleton side: a method request was received and dispatched.
    fn trace_request_receive(&self, _service: ProvidedServiceInstanceId, _method: MethodId, _client: ClientId) {}

    /// Proxy side: a fire-and-forget request was sent (no reply path).
    fn trace_request_no_return(&self, _service: ProvidedServiceInstanceId, _method: MethodId, _client: ClientId) {}

    /// A method response was sent or received.
    fn trace_response(&self, _service: ProvidedServiceInstanceId, _method: MethodId, _client: ClientId) {}

    /// An application-error response was sent or received.
    fn trace_application_error_response(&self, _service: ProvidedServiceInstanceId, _method: MethodId, _client: ClientId) {}

    /// An event was sent to one or more subscribed receivers.
    fn trace_event_send(&self, _service: ProvidedServiceInstanceId, _event: EventId) {}

    /// A slot was allocated for an outgoing event sample.
    fn trace_event_send_allocate(&self, _service: ProvidedServiceInstanceId, _event: EventId) {}

    /// Proxy side: an application read a received event sample.
    fn trace_event_read_sample(&self, _service: ProvidedServiceInstanceId, _event: EventId, _client: ClientId) {}
}

/// Default no-op [`TraceSink`]: every hook is a no-op, mirroring the
/// "grant all" default of the neighboring access-control hooks — here
/// there is nothing to grant, only nothing to record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {}

/// Reference [`TraceSink`] that counts calls per point, used by tests that
/// need to assert tracing actually fired without a real logging backend.
#[derive(Default)]
pub struct CountingTraceSink {
    counts: std::sync::Mutex<TraceCounts>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TraceCounts {
    pub request_send: u32,
    pub request_receive: u32,
    pub request_no_return: u32,
    pub response: u32,
    pub application_error_response: u32,
    pub event_send: u32,
    pub event_send_allocate: u32,
    pub event_read_sample: u32,
}

impl CountingTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> TraceCounts {
        *self.counts.lock().unwrap()
    }
}

impl TraceSink for CountingTraceSink {
    fn trace_request_send(&self, _service: ProvidedServiceInstanceId, _method: MethodId, _client: ClientId) {
        self.counts.lock().unwrap().request_send += 1;
    }
    fn trace_request_receive(&self, _service: ProvidedServiceInstanceId, _method: MethodId, _client: ClientId) {
        self.counts.lock().unwrap().request_receive += 1;
    }
    fn trace_request_no_return(&self, _service: ProvidedServiceInstanceId, _method: MethodId, _client: ClientId) {
        self.counts.lock().unwrap().request_no_return += 1;
    }
    fn trace_response(&self, _service: ProvidedServiceInstanceId, _method: MethodId, _client: ClientId) {
        self.counts.lock().unwrap().response += 1;
    }
    fn trace_application_error_response(&self, _service: ProvidedServiceInstanceId, _method: MethodId, _client: ClientId) {
        self.counts.lock().unwrap().application_error_response += 1;
    }
    fn trace_event_send(&self, _service: ProvidedServiceInstanceId, _event: EventId) {
        self.counts.lock().unwrap().event_send += 1;
    }
    fn trace_event_send_allocate(&self, _service: ProvidedServiceInstanceId, _event: EventId) {
        self.counts.lock().unwrap().event_send_allocate += 1;
    }
    fn trace_event_read_sample(&self, _service: ProvidedServiceInstanceId, _event: EventId, _client: ClientId) {
        self.counts.lock().unwrap().event_read_sample += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ProvidedServiceInstanceId {
        ProvidedServiceInstanceId::new(1, 1, 1, 0).unwrap()
    }

    #[test]
    fn counting_sink_tallies_each_point_independently() {
        let sink = CountingTraceSink::new();
        sink.trace_request_send(service(), MethodId(1), ClientId(1));
        sink.trace_request_send(service(), MethodId(1), ClientId(1));
        sink.trace_response(service(), MethodId(1), ClientId(1));
        let counts = sink.counts();
        assert_eq!(counts.request_send, 2);
        assert_eq!(counts.response, 1);
        assert_eq!(counts.event_send, 0);
    }

    #[test]
    fn noop_sink_accepts_every_call() {
        let sink = NoopTraceSink;
        sink.trace_event_read_sample(service(), EventId(2), ClientId(9));
    }
}
