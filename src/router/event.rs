//! Event subscribe/unsubscribe and notification delivery — the router's
//! second routing table, symmetrical to the method tables in
//! [`crate::router::proxy`]/[`crate::router::skeleton`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;
use futures::channel::oneshot;

use crate::access_control::AccessControl;
use crate::error::MemConError;
use crate::id::{ClientId, EventId, ProvidedServiceInstanceId};
use crate::router::connection::ConnectionSink;
use crate::router::message::{EventSubscriptionHeader, MessageKind, NotificationHeader, SubscribeAckHeader};
use crate::router::packet::{split_header, Packet};
use crate::trace::TraceSink;

/// Callback invoked on the proxy side for each delivered notification
/// sample.
pub type NotificationHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Proxy-side event backend: tracks this client's subscribe state for one
/// event and delivers notifications to `handler` only while subscribed.
pub struct ProxyEventBackend {
    service: ProvidedServiceInstanceId,
    event: EventId,
    client: ClientId,
    connection: Arc<dyn ConnectionSink>,
    trace: Arc<dyn TraceSink>,
    access_control: Arc<dyn AccessControl>,
    subscribed: AtomicBool,
    pending_ack: Mutex<Option<oneshot::Sender<bool>>>,
    handler: Mutex<Option<NotificationHandler>>,
}

impl ProxyEventBackend {
    pub fn new(
        service: ProvidedServiceInstanceId,
        event: EventId,
        client: ClientId,
        connection: Arc<dyn ConnectionSink>,
        trace: Arc<dyn TraceSink>,
        access_control: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            service,
            event,
            client,
            connection,
            trace,
            access_control,
            subscribed: AtomicBool::new(false),
            pending_ack: Mutex::new(None),
            handler: Mutex::new(None),
        }
    }

    /// Installs the callback invoked for every delivered notification.
    pub fn set_notification_handler(&self, handler: NotificationHandler) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    /// Sends a `Subscribe` request and returns a future resolving to
    /// whether the skeleton accepted it, fulfilled by
    /// [`ProxyEventBackend::on_ack_received`].
    pub fn subscribe(&self) -> Result<oneshot::Receiver<bool>, MemConError> {
        let (tx, rx) = oneshot::channel();
        if !self.access_control.allow_event_subscribe(self.service, self.event.0, self.client) {
            log::info!("subscribe to {:?}.{:?} denied by access control", self.service, self.event);
            let _ = tx.send(false);
            return Ok(rx);
        }
        *self.pending_ack.lock().unwrap() = Some(tx);
        let header = EventSubscriptionHeader {
            event: self.event,
            client: self.client,
        };
        let packet = Packet::build(self.service, MessageKind::Subscribe, &header, &[])?;
        self.connection.transmit(packet)?;
        Ok(rx)
    }

    /// Sends an `Unsubscribe` request. Unlike subscribe, there is no
    /// ack/nack round trip: the proxy stops accepting notifications
    /// immediately, matching the one-way teardown the side channel itself
    /// uses for termination.
    pub fn unsubscribe(&self) -> Result<(), MemConError> {
        self.subscribed.store(false, Ordering::SeqCst);
        if !self.access_control.allow_event_unsubscribe(self.service, self.event.0, self.client) {
            log::info!("unsubscribe from {:?}.{:?} denied by access control", self.service, self.event);
            return Ok(());
        }
        let header = EventSubscriptionHeader {
            event: self.event,
            client: self.client,
        };
        let packet = Packet::build(self.service, MessageKind::Unsubscribe, &header, &[])?;
        self.connection.transmit(packet)
    }

    /// Resolves the pending subscribe future and updates subscribed state.
    pub fn on_ack_received(&self, accepted: bool) {
        let hook = if accepted {
            self.access_control.allow_subscribe_ack(self.service, self.event.0, self.client)
        } else {
            self.access_control.allow_subscribe_nack(self.service, self.event.0, self.client)
        };
        if !hook {
            log::info!("subscribe ack/nack for {:?}.{:?} denied by access control", self.service, self.event);
            return;
        }
        self.subscribed.store(accepted, Ordering::SeqCst);
        if let Some(tx) = self.pending_ack.lock().unwrap().take() {
            let _ = tx.send(accepted);
        }
    }

    /// Delivers a received `Notification` packet to the installed handler,
    /// if subscribed.
    pub fn on_notification_received(&self, rest: &Bytes) -> Result<(), MemConError> {
        let (_header, payload): (NotificationHeader, Bytes) = split_header(rest)?;
        if !self.is_subscribed() {
            log::debug!("dropping notification for unsubscribed event {:?}", self.event);
            return Ok(());
        }
        if !self.access_control.allow_event_notification(self.service, self.event.0, self.client) {
            log::info!("notification for {:?}.{:?} denied by access control", self.service, self.event);
            return Ok(());
        }
        self.trace.trace_event_read_sample(self.service, self.event, self.client);
        if let Some(handler) = self.handler.lock().unwrap().as_ref() {
            handler(payload);
        }
        Ok(())
    }
}

/// Skeleton-side event backend: tracks the set of subscribed proxies for
/// one event and fans notifications out to each of them.
pub struct SkeletonEventBackend {
    service: ProvidedServiceInstanceId,
    event: EventId,
    trace: Arc<dyn TraceSink>,
    access_control: Arc<dyn AccessControl>,
    subscribers: Mutex<HashMap<ClientId, Weak<dyn ConnectionSink>>>,
}

impl SkeletonEventBackend {
    pub fn new(
        service: ProvidedServiceInstanceId,
        event: EventId,
        trace: Arc<dyn TraceSink>,
        access_control: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            service,
            event,
            trace,
            access_control,
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Registers `client` as a subscriber and replies with a `SubscribeAck`
    /// over `connection`. A request denied by access control is dropped
    /// silently: no subscriber is registered and no ack is sent.
    pub fn on_subscribe_received(&self, client: ClientId, connection: Weak<dyn ConnectionSink>) -> Result<(), MemConError> {
        if !self.access_control.allow_event_subscribe(self.service, self.event.0, client) {
            log::info!("subscribe to {:?}.{:?} denied by access control", self.service, self.event);
            return Ok(());
        }
        self.subscribers.lock().unwrap().insert(client, connection.clone());
        if !self.access_control.allow_subscribe_ack(self.service, self.event.0, client) {
            log::info!("subscribe ack for {:?}.{:?} denied by access control", self.service, self.event);
            return Ok(());
        }
        let header = SubscribeAckHeader {
            event: self.event,
            client,
            accepted: true,
        };
        let packet = Packet::build(self.service, MessageKind::SubscribeAck, &header, &[])?;
        match connection.upgrade() {
            Some(connection) => connection.transmit(packet),
            None => Ok(()),
        }
    }

    pub fn on_unsubscribe_received(&self, client: ClientId) {
        if !self.access_control.allow_event_unsubscribe(self.service, self.event.0, client) {
            log::info!("unsubscribe from {:?}.{:?} denied by access control", self.service, self.event);
            return;
        }
        self.subscribers.lock().unwrap().remove(&client);
    }

    /// Publishes one notification sample to every current subscriber. A
    /// subscriber whose connection has already been dropped is pruned
    /// instead of treated as an error.
    pub fn publish(&self, payload: &[u8]) -> Result<(), MemConError> {
        let header = NotificationHeader { event: self.event };
        let packet = Packet::build(self.service, MessageKind::Notification, &header, payload)?;
        self.trace.trace_event_send_allocate(self.service, self.event);

        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|client, connection| {
            if !self.access_control.allow_event_notification(self.service, self.event.0, *client) {
                return true;
            }
            match connection.upgrade() {
                Some(connection) => {
                    if let Err(e) = connection.transmit(packet.clone()) {
                        log::warn!("failed to deliver notification to client {client:?}: {e}");
                    }
                    true
                }
                None => false,
            }
        });
        self.trace.trace_event_send(self.service, self.event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::AllowAllAccessControl;
    use crate::router::connection::RecordingConnectionSink;
    use crate::trace::NoopTraceSink;

    fn service() -> ProvidedServiceInstanceId {
        ProvidedServiceInstanceId::new(5, 1, 1, 0).unwrap()
    }

    #[test]
    fn subscribe_then_ack_marks_the_proxy_subscribed() {
        let sink = Arc::new(RecordingConnectionSink::new());
        let backend = ProxyEventBackend::new(
            service(),
            EventId(1),
            ClientId(1),
            sink.clone(),
            Arc::new(NoopTraceSink),
            Arc::new(AllowAllAccessControl),
        );
        let mut ack = backend.subscribe().unwrap();
        assert_eq!(sink.len(), 1);
        assert!(!backend.is_subscribed());

        backend.on_ack_received(true);
        assert!(backend.is_subscribed());
        assert!(ack.try_recv().unwrap().unwrap());
    }

    #[test]
    fn notification_is_dropped_when_not_subscribed() {
        let sink = Arc::new(RecordingConnectionSink::new());
        let backend = ProxyEventBackend::new(
            service(),
            EventId(1),
            ClientId(1),
            sink,
            Arc::new(NoopTraceSink),
            Arc::new(AllowAllAccessControl),
        );
        let received = Arc::new(Mutex::new(false));
        let received2 = received.clone();
        backend.set_notification_handler(Arc::new(move |_payload| {
            *received2.lock().unwrap() = true;
        }));

        let header = NotificationHeader { event: EventId(1) };
        let packet = Packet::build(service(), MessageKind::Notification, &header, b"sample").unwrap();
        let envelope = crate::router::packet::decode_envelope(packet.as_bytes().clone()).unwrap();
        backend.on_notification_received(&envelope.rest).unwrap();

        assert!(!*received.lock().unwrap());
    }

    #[test]
    fn skeleton_fans_out_published_samples_to_every_subscriber() {
        let recording_a = Arc::new(RecordingConnectionSink::new());
        let recording_b = Arc::new(RecordingConnectionSink::new());
        let sink_a: Arc<dyn ConnectionSink> = recording_a.clone();
        let sink_b: Arc<dyn ConnectionSink> = recording_b.clone();
        let backend = SkeletonEventBackend::new(service(), EventId(2), Arc::new(NoopTraceSink), Arc::new(AllowAllAccessControl));
        backend.on_subscribe_received(ClientId(1), Arc::downgrade(&sink_a)).unwrap();
        backend.on_subscribe_received(ClientId(2), Arc::downgrade(&sink_b)).unwrap();

        backend.publish(b"sample").unwrap();

        // subscribe ack (1) + notification (1) each
        assert_eq!(recording_a.len(), 2);
        assert_eq!(recording_b.len(), 2);
        assert_eq!(backend.subscriber_count(), 2);
    }
}
