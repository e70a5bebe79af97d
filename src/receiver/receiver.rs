//! The receiver state machine itself — the hardest and most
//! central part of this crate.

use std::sync::Arc;

use log::{debug, trace, warn};

use crate::error::MemConError;
use crate::id::{ClassHandle, ReceiverId};
use crate::logic_server::LogicServer;
use crate::memory::{ExchangeHandle, QueueMemoryConfig, SharedMemoryResolver, SharedMemorySegment, SlotMemoryConfig};
use crate::receiver::callbacks::ConnectCallbacks;
use crate::receiver::state::{ConnectedSub, ReceiverState};
use crate::side_channel::{ControlMessage, DroppedInformation, SideChannelTransport};

/// The three peer/transport failure kinds `OnError` can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerErrorKind {
    Disconnected,
    Crashed,
    Protocol,
}

impl PeerErrorKind {
    fn into_error(self, receiver: ReceiverId) -> MemConError {
        match self {
            PeerErrorKind::Disconnected => MemConError::PeerDisconnected { receiver },
            PeerErrorKind::Crashed => MemConError::PeerCrashed { receiver },
            PeerErrorKind::Protocol => MemConError::ProtocolError {
                receiver,
                detail: "peer-reported protocol error",
            },
        }
    }
}

/// One server-side receiver managing a single peer's zero-copy
/// subscription.
///
/// All `on_*` methods are reactor-only and non-reentrant
///: this type is deliberately `!Sync`
/// by not implementing any interior synchronization, so a caller handing
/// it across threads without its own external serialization is a compile
/// error rather than a data race.
pub struct Receiver {
    id: ReceiverId,
    class: ClassHandle,
    side_channel: Box<dyn SideChannelTransport>,
    logic: Arc<dyn LogicServer>,
    memory_resolver: Arc<dyn SharedMemoryResolver>,

    own_slot_config: SlotMemoryConfig,
    own_slot_handle: ExchangeHandle,
    own_queue_config: QueueMemoryConfig,
    own_queue_handle: ExchangeHandle,

    state: ReceiverState,
    connect_called: bool,
    /// Present exactly while `Connected` has been reached and not yet
    /// unwound.
    receiver_handle_present: bool,
    client_queue: Option<Box<dyn SharedMemorySegment>>,
    callbacks: ConnectCallbacks,
    /// Nonzero while a public method's body is executing; used by
    /// `is_in_use` to reflect "any registered callback is executing"
    ///. Since the reactor never re-enters a receiver, this
    /// is 0 or 1 in practice, but is a counter rather than a bool to make
    /// that non-reentrancy assumption explicit rather than load-bearing.
    callback_depth: u32,
}

impl Receiver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ReceiverId,
        class: ClassHandle,
        side_channel: Box<dyn SideChannelTransport>,
        logic: Arc<dyn LogicServer>,
        memory_resolver: Arc<dyn SharedMemoryResolver>,
        own_slot_config: SlotMemoryConfig,
        own_slot_handle: ExchangeHandle,
        own_queue_config: QueueMemoryConfig,
        own_queue_handle: ExchangeHandle,
    ) -> Self {
        Self {
            id,
            class,
            side_channel,
            logic,
            memory_resolver,
            own_slot_config,
            own_slot_handle,
            own_queue_config,
            own_queue_handle,
            state: ReceiverState::Connecting,
            connect_called: false,
            receiver_handle_present: false,
            client_queue: None,
            callbacks: ConnectCallbacks::new(),
            callback_depth: 0,
        }
    }

    pub fn id(&self) -> ReceiverId {
        self.id
    }

    pub fn class(&self) -> ClassHandle {
        self.class
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Whether this receiver currently holds a registered receiver handle.
    pub fn receiver_handle_present(&self) -> bool {
        self.receiver_handle_present
    }

    /// `true` while any callback is executing, or the state has not yet
    /// reached `Disconnected`. Monotonic: once `false`, stays `false`
    ///.
    pub fn is_in_use(&self) -> bool {
        self.callback_depth > 0 || !self.state.is_terminal()
    }

    /// Installs callbacks and emits the handshake frame.
    pub fn connect(&mut self, callbacks: ConnectCallbacks) -> Result<(), MemConError> {
        self.callback_depth += 1;
        let result = self.connect_impl(callbacks);
        self.callback_depth -= 1;
        result
    }

    fn connect_impl(&mut self, callbacks: ConnectCallbacks) -> Result<(), MemConError> {
        match self.state {
            ReceiverState::Connecting if !self.connect_called => {
                self.callbacks = callbacks;
                self.connect_called = true;
                let handshake = ControlMessage::Handshake {
                    slot_mem_config: self.own_slot_config,
                    slot_mem_handle: self.own_slot_handle,
                    queue_mem_config: self.own_queue_config,
                    queue_mem_handle: self.own_queue_handle,
                };
                match self.send_frame(&handshake) {
                    Ok(()) => Ok(()),
                    Err(_) => Err(self.escalate_to_corrupted("handshake frame send failed")),
                }
            }
            ReceiverState::Connecting => Err(MemConError::UnexpectedReceiverState {
                receiver: self.id,
                detail: "Connect called twice",
            }),
            _ => Err(MemConError::UnexpectedReceiverState {
                receiver: self.id,
                detail: "Connect called outside Connecting",
            }),
        }
    }

    /// Handles the client's `AckConnection`.
    pub fn on_ack_connection(
        &mut self,
        queue_config: QueueMemoryConfig,
        queue_handle: ExchangeHandle,
    ) -> Result<(), MemConError> {
        self.callback_depth += 1;
        let result = self.on_ack_connection_impl(queue_config, queue_handle);
        self.callback_depth -= 1;
        result
    }

    fn on_ack_connection_impl(
        &mut self,
        queue_config: QueueMemoryConfig,
        queue_handle: ExchangeHandle,
    ) -> Result<(), MemConError> {
        let _ = queue_config; // carried for protocol completeness; the resolved segment is authoritative
        match self.state {
            ReceiverState::Connecting => match self.memory_resolver.resolve(queue_handle) {
                Ok(segment) => {
                    self.client_queue = Some(segment);
                    self.logic.register_receiver(self.id, self.class);
                    self.receiver_handle_present = true;
                    self.set_state(ReceiverState::Connected(ConnectedSub::Polling));
                    Ok(())
                }
                Err(_) => Err(self.escalate_to_corrupted("failed to map client queue memory")),
            },
            ReceiverState::Connected(_) => Err(self.escalate_to_corrupted("unexpected AckConnection")),
            ReceiverState::Corrupted | ReceiverState::Disconnected => Ok(()),
        }
    }

    /// `OnStartListening`.
    pub fn on_start_listening(&mut self) -> Result<(), MemConError> {
        self.callback_depth += 1;
        let result = self.on_start_listening_impl();
        self.callback_depth -= 1;
        result
    }

    fn on_start_listening_impl(&mut self) -> Result<(), MemConError> {
        match self.state {
            ReceiverState::Connecting => Err(self.escalate_to_corrupted("StartListening before handshake completed")),
            ReceiverState::Connected(ConnectedSub::Polling) => {
                self.set_state(ReceiverState::Connected(ConnectedSub::Notified));
                Ok(())
            }
            ReceiverState::Connected(ConnectedSub::Notified) => {
                Err(self.escalate_to_corrupted("StartListening while already Notified"))
            }
            ReceiverState::Corrupted | ReceiverState::Disconnected => Ok(()),
        }
    }

    /// `OnStopListening`.
    pub fn on_stop_listening(&mut self) -> Result<(), MemConError> {
        self.callback_depth += 1;
        let result = self.on_stop_listening_impl();
        self.callback_depth -= 1;
        result
    }

    fn on_stop_listening_impl(&mut self) -> Result<(), MemConError> {
        match self.state {
            ReceiverState::Connecting => Err(self.escalate_to_corrupted("StopListening before handshake completed")),
            ReceiverState::Connected(ConnectedSub::Notified) => {
                self.set_state(ReceiverState::Connected(ConnectedSub::Polling));
                Ok(())
            }
            ReceiverState::Connected(ConnectedSub::Polling) => {
                Err(self.escalate_to_corrupted("StopListening while already Polling"))
            }
            ReceiverState::Corrupted | ReceiverState::Disconnected => Ok(()),
        }
    }

    /// `OnShutdown`.
    pub fn on_shutdown(&mut self) -> Result<(), MemConError> {
        self.callback_depth += 1;
        let result = self.on_shutdown_impl();
        self.callback_depth -= 1;
        result
    }

    fn on_shutdown_impl(&mut self) -> Result<(), MemConError> {
        match self.state {
            ReceiverState::Connecting => {
                // peer left before full handshake; no LogicServer deregister needed
                self.set_state(ReceiverState::Disconnected);
                Ok(())
            }
            ReceiverState::Connected(_) => {
                self.deregister_if_registered();
                self.set_state(ReceiverState::Disconnected);
                Ok(())
            }
            ReceiverState::Corrupted | ReceiverState::Disconnected => Ok(()),
        }
    }

    /// `OnError(code)`.
    pub fn on_error(&mut self, kind: PeerErrorKind) -> Result<(), MemConError> {
        self.callback_depth += 1;
        let result = self.on_error_impl(kind);
        self.callback_depth -= 1;
        result
    }

    fn on_error_impl(&mut self, kind: PeerErrorKind) -> Result<(), MemConError> {
        match self.state {
            ReceiverState::Connecting | ReceiverState::Connected(_) => {
                self.deregister_if_registered();
                self.set_state(ReceiverState::Corrupted);
                Err(kind.into_error(self.id))
            }
            ReceiverState::Corrupted | ReceiverState::Disconnected => Ok(()),
        }
    }

    /// `Terminate()`. Idempotent law: a second call on an
    /// already-disconnected receiver errors.
    pub fn terminate(&mut self) -> Result<(), MemConError> {
        self.callback_depth += 1;
        let result = self.terminate_impl();
        self.callback_depth -= 1;
        result
    }

    fn terminate_impl(&mut self) -> Result<(), MemConError> {
        match self.state {
            ReceiverState::Connecting => {
                if self.connect_called {
                    let _ = self.send_frame(&ControlMessage::Termination);
                }
                self.callbacks = ConnectCallbacks::new();
                self.set_state(ReceiverState::Disconnected);
                Ok(())
            }
            ReceiverState::Connected(_) => {
                let _ = self.send_frame(&ControlMessage::Termination);
                self.deregister_if_registered();
                self.callbacks = ConnectCallbacks::new();
                self.set_state(ReceiverState::Disconnected);
                Ok(())
            }
            ReceiverState::Corrupted => {
                self.callbacks = ConnectCallbacks::new();
                self.set_state(ReceiverState::Disconnected);
                Ok(())
            }
            ReceiverState::Disconnected => Err(MemConError::UnexpectedReceiverState {
                receiver: self.id,
                detail: "Terminate called on an already-disconnected receiver",
            }),
        }
    }

    /// `HandleServerShutdown()`. No-op returning `Ok` when
    /// already `Disconnected`.
    pub fn handle_server_shutdown(&mut self) -> Result<(), MemConError> {
        self.callback_depth += 1;
        let result = self.handle_server_shutdown_impl();
        self.callback_depth -= 1;
        result
    }

    fn handle_server_shutdown_impl(&mut self) -> Result<(), MemConError> {
        match self.state {
            ReceiverState::Connecting => {
                let result = if self.connect_called {
                    self.send_frame(&ControlMessage::Shutdown)
                } else {
                    Ok(())
                };
                self.set_state(ReceiverState::Disconnected);
                result
            }
            ReceiverState::Connected(_) => {
                let result = self.send_frame(&ControlMessage::Shutdown);
                self.deregister_if_registered();
                self.set_state(ReceiverState::Disconnected);
                result
            }
            ReceiverState::Corrupted => {
                self.set_state(ReceiverState::Disconnected);
                Ok(())
            }
            ReceiverState::Disconnected => Ok(()),
        }
    }

    /// `NotifyNewSlotSent(drop_info)`. Calling this while
    /// `Connecting` is caller misuse: debug-asserted, and a no-op in release builds.
    pub fn notify_new_slot_sent(&mut self, drop_info: DroppedInformation) -> Result<(), MemConError> {
        self.callback_depth += 1;
        let result = self.notify_new_slot_sent_impl(drop_info);
        self.callback_depth -= 1;
        result
    }

    fn notify_new_slot_sent_impl(&mut self, drop_info: DroppedInformation) -> Result<(), MemConError> {
        match self.state {
            ReceiverState::Connecting => {
                debug_assert!(false, "NotifyNewSlotSent called before handshake completed");
                Ok(())
            }
            ReceiverState::Connected(ConnectedSub::Notified) => {
                let mut merged = self.logic.take_dropped_information(self.id);
                merged.merge(&drop_info);
                let notification = ControlMessage::Notification { dropped: merged };
                self.send_frame(&notification)
            }
            ReceiverState::Connected(ConnectedSub::Polling) => {
                trace!("receiver {:?} is polling; suppressing notification", self.id);
                Ok(())
            }
            ReceiverState::Corrupted | ReceiverState::Disconnected => Ok(()),
        }
    }

    /// `CheckAndHandleLogicCorruption()`.
    pub fn check_and_handle_logic_corruption(&mut self) -> Result<(), MemConError> {
        self.callback_depth += 1;
        let result = self.check_and_handle_logic_corruption_impl();
        self.callback_depth -= 1;
        result
    }

    fn check_and_handle_logic_corruption_impl(&mut self) -> Result<(), MemConError> {
        match self.state {
            ReceiverState::Connected(_) if self.logic.is_corrupted(self.id) => {
                self.deregister_if_registered();
                self.set_state(ReceiverState::Corrupted);
                Err(MemConError::ProtocolError {
                    receiver: self.id,
                    detail: "Logic Server flagged this receiver as corrupting",
                })
            }
            _ => Ok(()),
        }
    }

    fn set_state(&mut self, next: ReceiverState) {
        if self.state != next {
            debug!("receiver {:?}: {} -> {}", self.id, self.state, next);
            if matches!(next, ReceiverState::Corrupted) {
                warn!("receiver {:?} entered Corrupted", self.id);
            }
            let previous = self.state;
            self.state = next;
            if let Some(cb) = self.callbacks.on_transition.clone() {
                cb(self.id, previous, next);
            }
        }
    }

    /// If `opt_receiver_handle` is present, deregisters from the Logic
    /// Server and clears it.
    fn deregister_if_registered(&mut self) {
        if self.receiver_handle_present {
            self.logic.deregister_receiver(self.id);
            self.receiver_handle_present = false;
            self.client_queue = None;
        }
    }

    fn escalate_to_corrupted(&mut self, detail: &'static str) -> MemConError {
        self.deregister_if_registered();
        self.set_state(ReceiverState::Corrupted);
        MemConError::ProtocolError {
            receiver: self.id,
            detail,
        }
    }

    fn send_frame(&mut self, message: &ControlMessage) -> Result<(), MemConError> {
        self.side_channel.send(message).map_err(|e| MemConError::ProtocolError {
            receiver: self.id,
            detail: transport_error_detail(&e),
        })
    }
}

fn transport_error_detail(e: &crate::side_channel::TransportError) -> &'static str {
    use crate::side_channel::TransportError;
    match e {
        TransportError::Disconnected => "transport disconnected during send",
        TransportError::PeerCrashed(_) => "transport reported peer crash during send",
        TransportError::Protocol(_) => "transport framing error during send",
        TransportError::Io(_) => "transport I/O error during send",
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
    use std::sync::{Arc, Mutex};

    use mio::event::Source;
    use mio::{Interest, Registry, Token};
    use test_case::test_case;

    use super::*;
    use crate::logic_server::{DefaultLogicServer, SlotDecision};
    use crate::memory::{LocalMemoryAllocator, MemoryTechnology, SharedMemoryManager};
    use crate::side_channel::TransportError;

    /// Initializes `env_logger` once per test process, so the `debug!`/
    /// `warn!`/`trace!` calls in `set_state`/`notify_new_slot_sent_impl`
    /// surface under `RUST_LOG=memcon=debug cargo test -- --nocapture`.
    /// `#[test_log::test]` already captures a test's own log output on
    /// failure; this additionally lets a human opt into seeing it on a
    /// passing run.
    fn init_test_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[derive(Default)]
    struct Shared {
        sent: Mutex<Vec<ControlMessage>>,
        inbox: Mutex<Vec<ControlMessage>>,
        fail_next_send: AtomicBool,
    }

    /// In-process [`SideChannelTransport`] backed by shared, `Mutex`-guarded
    /// state: cloning shares the same recorded history, so a test can keep
    /// one clone outside the `Box<dyn SideChannelTransport>` handed to the
    /// receiver and inspect what was sent through the other.
    #[derive(Clone, Default)]
    struct MockTransport(Arc<Shared>);

    impl MockTransport {
        fn sent_messages(&self) -> Vec<ControlMessage> {
            self.0.sent.lock().unwrap().clone()
        }

        fn fail_next_send(&self) {
            self.0.fail_next_send.store(true, AtomicOrdering::SeqCst);
        }

        fn push_inbound(&self, message: ControlMessage) {
            self.0.inbox.lock().unwrap().push(message);
        }
    }

    impl SideChannelTransport for MockTransport {
        fn send(&mut self, message: &ControlMessage) -> Result<(), TransportError> {
            if self.0.fail_next_send.swap(false, AtomicOrdering::SeqCst) {
                return Err(TransportError::Disconnected);
            }
            self.0.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        fn try_recv(&mut self) -> Result<Vec<ControlMessage>, TransportError> {
            Ok(std::mem::take(&mut self.0.inbox.lock().unwrap()))
        }
    }

    impl Source for MockTransport {
        fn register(&mut self, _registry: &Registry, _token: Token, _interests: Interest) -> std::io::Result<()> {
            Ok(())
        }
        fn reregister(&mut self, _registry: &Registry, _token: Token, _interests: Interest) -> std::io::Result<()> {
            Ok(())
        }
        fn deregister(&mut self, _registry: &Registry) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// A [`LogicServer`] whose corruption flag a test can flip directly,
    /// for exercising `check_and_handle_logic_corruption` without needing
    /// to drive a receiver past its class's slot limit.
    struct CorruptibleLogicServer {
        inner: DefaultLogicServer,
        corrupted: Mutex<bool>,
    }

    impl CorruptibleLogicServer {
        fn new() -> Self {
            Self {
                inner: DefaultLogicServer::new(vec![usize::MAX]),
                corrupted: Mutex::new(false),
            }
        }

        fn mark_corrupted(&self) {
            *self.corrupted.lock().unwrap() = true;
        }
    }

    impl LogicServer for CorruptibleLogicServer {
        fn register_receiver(&self, receiver: ReceiverId, class: ClassHandle) {
            self.inner.register_receiver(receiver, class);
        }
        fn deregister_receiver(&self, receiver: ReceiverId) {
            self.inner.deregister_receiver(receiver);
        }
        fn on_slot_sent(&self, receiver: ReceiverId) -> SlotDecision {
            self.inner.on_slot_sent(receiver)
        }
        fn is_corrupted(&self, _receiver: ReceiverId) -> bool {
            *self.corrupted.lock().unwrap()
        }
        fn take_dropped_information(&self, receiver: ReceiverId) -> DroppedInformation {
            self.inner.take_dropped_information(receiver)
        }
    }

    fn slot_cfg() -> SlotMemoryConfig {
        SlotMemoryConfig::new(4, 128, 16, MemoryTechnology::Heap).unwrap()
    }

    fn queue_cfg() -> QueueMemoryConfig {
        QueueMemoryConfig::new(8, MemoryTechnology::Heap).unwrap()
    }

    /// Builds a receiver wired to a [`MockTransport`] and the given
    /// [`LogicServer`], along with a handle to both the transport (to
    /// inspect what it sent) and the allocator backing its memory resolver
    /// (to mint a client queue handle the same way `OnAckConnection`
    /// would receive one).
    fn new_test_receiver_with_logic(
        logic: Arc<dyn LogicServer>,
    ) -> (Receiver, MockTransport, Arc<SharedMemoryManager<LocalMemoryAllocator>>) {
        init_test_logging();
        let transport = MockTransport::default();
        let manager = Arc::new(SharedMemoryManager::new(LocalMemoryAllocator::new()));
        let receiver = Receiver::new(
            ReceiverId::new(0, 0),
            ClassHandle::new(0),
            Box::new(transport.clone()),
            logic,
            manager.clone(),
            slot_cfg(),
            ExchangeHandle::from_raw(1),
            queue_cfg(),
            ExchangeHandle::from_raw(2),
        );
        (receiver, transport, manager)
    }

    fn new_test_receiver() -> (Receiver, MockTransport, Arc<SharedMemoryManager<LocalMemoryAllocator>>) {
        new_test_receiver_with_logic(Arc::new(DefaultLogicServer::new(vec![2])))
    }

    /// Mints a client-queue exchange handle through the same allocator the
    /// receiver's memory resolver was built with, simulating what the
    /// client peer's own handshake would have produced.
    fn mint_client_queue_handle(manager: &SharedMemoryManager<LocalMemoryAllocator>) -> ExchangeHandle {
        manager.allocate_receiver_memory(&slot_cfg(), &queue_cfg()).unwrap().server_queue_handle
    }

    #[test_log::test]
    fn happy_handshake_reaches_connected_polling() {
        let (mut receiver, transport, manager) = new_test_receiver();
        receiver.connect(ConnectCallbacks::new()).unwrap();
        assert_eq!(receiver.state(), ReceiverState::Connecting);
        assert!(matches!(transport.sent_messages().as_slice(), [ControlMessage::Handshake { .. }]));

        let client_handle = mint_client_queue_handle(&manager);
        receiver.on_ack_connection(queue_cfg(), client_handle).unwrap();
        assert_eq!(receiver.state(), ReceiverState::Connected(ConnectedSub::Polling));
        assert!(receiver.receiver_handle_present());
    }

    #[test_log::test]
    fn ack_connection_with_unknown_handle_corrupts() {
        let (mut receiver, _transport, _manager) = new_test_receiver();
        receiver.connect(ConnectCallbacks::new()).unwrap();
        let bogus_handle = ExchangeHandle::from_raw(999_999);
        assert_eq!(
            receiver.on_ack_connection(queue_cfg(), bogus_handle),
            Err(MemConError::ProtocolError {
                receiver: ReceiverId::new(0, 0),
                detail: "failed to map client queue memory",
            })
        );
        assert_eq!(receiver.state(), ReceiverState::Corrupted);
        assert!(!receiver.receiver_handle_present());
    }

    #[test_log::test]
    fn double_connect_is_rejected() {
        let (mut receiver, _transport, _manager) = new_test_receiver();
        receiver.connect(ConnectCallbacks::new()).unwrap();
        assert_eq!(
            receiver.connect(ConnectCallbacks::new()),
            Err(MemConError::UnexpectedReceiverState {
                receiver: ReceiverId::new(0, 0),
                detail: "Connect called twice",
            })
        );
        assert_eq!(receiver.state(), ReceiverState::Connecting);
    }

    /// The two ways a listening-toggle event can arrive out of sequence
    /// (§4.1: "two consecutive transitions in the same direction are a
    /// protocol error").
    #[derive(Clone, Copy, Debug)]
    enum ListeningMisuse {
        StartListeningTwice,
        StopListeningWhilePolling,
    }

    #[test_case(ListeningMisuse::StartListeningTwice, "StartListening while already Notified" ; "start listening twice")]
    #[test_case(ListeningMisuse::StopListeningWhilePolling, "StopListening while already Polling" ; "stop listening while still polling")]
    #[test_log::test]
    fn out_of_order_listening_transitions_corrupt_and_deregister(misuse: ListeningMisuse, expected_detail: &'static str) {
        let (mut receiver, _transport, manager) = new_test_receiver();
        receiver.connect(ConnectCallbacks::new()).unwrap();
        let client_handle = mint_client_queue_handle(&manager);
        receiver.on_ack_connection(queue_cfg(), client_handle).unwrap();
        assert_eq!(receiver.state(), ReceiverState::Connected(ConnectedSub::Polling));

        let result = match misuse {
            ListeningMisuse::StartListeningTwice => {
                receiver.on_start_listening().unwrap();
                receiver.on_start_listening()
            }
            ListeningMisuse::StopListeningWhilePolling => receiver.on_stop_listening(),
        };

        assert_eq!(
            result,
            Err(MemConError::ProtocolError {
                receiver: ReceiverId::new(0, 0),
                detail: expected_detail,
            })
        );
        assert_eq!(receiver.state(), ReceiverState::Corrupted);
        assert!(!receiver.receiver_handle_present());
    }

    #[test_log::test]
    fn notification_gating_suppresses_while_polling_and_sends_once_notified() {
        let (mut receiver, transport, manager) = new_test_receiver();
        receiver.connect(ConnectCallbacks::new()).unwrap();
        let client_handle = mint_client_queue_handle(&manager);
        receiver.on_ack_connection(queue_cfg(), client_handle).unwrap();

        assert_eq!(receiver.notify_new_slot_sent(DroppedInformation::empty(1)), Ok(()));
        assert_eq!(transport.sent_messages().len(), 1, "only the handshake frame, no Notification");

        receiver.on_start_listening().unwrap();
        assert_eq!(receiver.state(), ReceiverState::Connected(ConnectedSub::Notified));
        assert_eq!(receiver.notify_new_slot_sent(DroppedInformation::empty(1)), Ok(()));
        let sent = transport.sent_messages();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[1], ControlMessage::Notification { .. }));
    }

    #[test_log::test]
    fn notify_new_slot_send_failure_reports_protocol_error_without_changing_state() {
        let (mut receiver, transport, manager) = new_test_receiver();
        receiver.connect(ConnectCallbacks::new()).unwrap();
        let client_handle = mint_client_queue_handle(&manager);
        receiver.on_ack_connection(queue_cfg(), client_handle).unwrap();
        receiver.on_start_listening().unwrap();

        transport.fail_next_send();
        assert_eq!(
            receiver.notify_new_slot_sent(DroppedInformation::empty(1)),
            Err(MemConError::ProtocolError {
                receiver: ReceiverId::new(0, 0),
                detail: "transport disconnected during send",
            })
        );
        assert_eq!(receiver.state(), ReceiverState::Connected(ConnectedSub::Notified));
    }

    #[test_log::test]
    fn terminate_is_idempotent_error_on_second_call() {
        let (mut receiver, _transport, _manager) = new_test_receiver();
        receiver.terminate().unwrap();
        assert_eq!(receiver.state(), ReceiverState::Disconnected);
        assert_eq!(
            receiver.terminate(),
            Err(MemConError::UnexpectedReceiverState {
                receiver: ReceiverId::new(0, 0),
                detail: "Terminate called on an already-disconnected receiver",
            })
        );
    }

    #[test_log::test]
    fn terminate_from_connected_sends_termination_and_deregisters() {
        let (mut receiver, transport, manager) = new_test_receiver();
        receiver.connect(ConnectCallbacks::new()).unwrap();
        let client_handle = mint_client_queue_handle(&manager);
        receiver.on_ack_connection(queue_cfg(), client_handle).unwrap();

        receiver.terminate().unwrap();
        assert_eq!(receiver.state(), ReceiverState::Disconnected);
        assert!(!receiver.receiver_handle_present());
        let sent = transport.sent_messages();
        assert!(matches!(sent.last(), Some(ControlMessage::Termination)));
    }

    #[test_log::test]
    fn handle_server_shutdown_on_disconnected_receiver_is_a_no_op() {
        let (mut receiver, _transport, _manager) = new_test_receiver();
        receiver.terminate().unwrap();
        assert_eq!(receiver.handle_server_shutdown(), Ok(()));
        assert_eq!(receiver.state(), ReceiverState::Disconnected);
    }

    #[test_log::test]
    fn handle_server_shutdown_from_corrupted_disconnects_without_a_frame() {
        let (mut receiver, transport, _manager) = new_test_receiver();
        receiver.on_error(PeerErrorKind::Protocol).unwrap_err();
        assert_eq!(receiver.state(), ReceiverState::Corrupted);
        assert_eq!(receiver.handle_server_shutdown(), Ok(()));
        assert_eq!(receiver.state(), ReceiverState::Disconnected);
        assert!(transport.sent_messages().is_empty());
    }

    #[test_log::test]
    fn notify_new_slot_sent_in_connecting_is_a_no_op() {
        let (mut receiver, transport, _manager) = new_test_receiver();
        assert_eq!(receiver.notify_new_slot_sent(DroppedInformation::empty(1)), Ok(()));
        assert!(transport.sent_messages().is_empty());
    }

    #[test_log::test]
    fn on_shutdown_in_connecting_disconnects_without_deregistering() {
        let (mut receiver, _transport, _manager) = new_test_receiver();
        receiver.on_shutdown().unwrap();
        assert_eq!(receiver.state(), ReceiverState::Disconnected);
        assert!(!receiver.receiver_handle_present());
    }

    /// The three `OnError(code)` kinds §4.1 lists for the `Connecting`
    /// row, each escalating to `Corrupted` with the matching error.
    #[derive(Clone, Copy, Debug)]
    enum ErrorScenario {
        Disconnected,
        Crashed,
        Protocol,
    }

    impl ErrorScenario {
        fn kind(self) -> PeerErrorKind {
            match self {
                ErrorScenario::Disconnected => PeerErrorKind::Disconnected,
                ErrorScenario::Crashed => PeerErrorKind::Crashed,
                ErrorScenario::Protocol => PeerErrorKind::Protocol,
            }
        }

        fn expected(self) -> MemConError {
            let receiver = ReceiverId::new(0, 0);
            match self {
                ErrorScenario::Disconnected => MemConError::PeerDisconnected { receiver },
                ErrorScenario::Crashed => MemConError::PeerCrashed { receiver },
                ErrorScenario::Protocol => MemConError::ProtocolError {
                    receiver,
                    detail: "peer-reported protocol error",
                },
            }
        }
    }

    #[test_case(ErrorScenario::Disconnected ; "peer disconnected")]
    #[test_case(ErrorScenario::Crashed ; "peer crashed")]
    #[test_case(ErrorScenario::Protocol ; "protocol error")]
    #[test_log::test]
    fn on_error_from_connecting_escalates_to_corrupted(scenario: ErrorScenario) {
        let (mut receiver, _transport, _manager) = new_test_receiver();
        assert_eq!(receiver.on_error(scenario.kind()), Err(scenario.expected()));
        assert_eq!(receiver.state(), ReceiverState::Corrupted);
    }

    /// The three events §4.1 lists as no-ops once a receiver has left
    /// `Connected` for `Corrupted`.
    #[derive(Clone, Copy, Debug)]
    enum ReceiverEvent {
        StartListening,
        StopListening,
        Shutdown,
    }

    impl ReceiverEvent {
        fn fire(self, receiver: &mut Receiver) -> Result<(), MemConError> {
            match self {
                ReceiverEvent::StartListening => receiver.on_start_listening(),
                ReceiverEvent::StopListening => receiver.on_stop_listening(),
                ReceiverEvent::Shutdown => receiver.on_shutdown(),
            }
        }
    }

    #[test_case(ReceiverEvent::StartListening ; "start listening")]
    #[test_case(ReceiverEvent::StopListening ; "stop listening")]
    #[test_case(ReceiverEvent::Shutdown ; "shutdown")]
    #[test_log::test]
    fn events_in_corrupted_are_ignored(event: ReceiverEvent) {
        let (mut receiver, _transport, _manager) = new_test_receiver();
        receiver.on_error(PeerErrorKind::Protocol).unwrap_err();
        assert_eq!(receiver.state(), ReceiverState::Corrupted);
        assert_eq!(event.fire(&mut receiver), Ok(()));
        assert_eq!(receiver.state(), ReceiverState::Corrupted);
    }

    #[test_log::test]
    fn events_in_disconnected_remain_ignored_forever() {
        let (mut receiver, _transport, _manager) = new_test_receiver();
        receiver.on_error(PeerErrorKind::Protocol).unwrap_err();
        receiver.on_shutdown().unwrap();
        assert_eq!(receiver.state(), ReceiverState::Disconnected);

        // Once Disconnected, every event remains a no-op and the state
        // never moves again.
        assert_eq!(receiver.on_start_listening(), Ok(()));
        assert_eq!(receiver.state(), ReceiverState::Disconnected);
    }

    #[test_log::test]
    fn check_and_handle_logic_corruption_escalates_when_flagged() {
        let logic = Arc::new(CorruptibleLogicServer::new());
        let (mut receiver, _transport, manager) = new_test_receiver_with_logic(logic.clone());
        receiver.connect(ConnectCallbacks::new()).unwrap();
        let client_handle = mint_client_queue_handle(&manager);
        receiver.on_ack_connection(queue_cfg(), client_handle).unwrap();

        logic.mark_corrupted();
        assert_eq!(
            receiver.check_and_handle_logic_corruption(),
            Err(MemConError::ProtocolError {
                receiver: ReceiverId::new(0, 0),
                detail: "Logic Server flagged this receiver as corrupting",
            })
        );
        assert_eq!(receiver.state(), ReceiverState::Corrupted);
    }

    #[test_log::test]
    fn check_and_handle_logic_corruption_is_a_no_op_outside_connected() {
        let logic = Arc::new(CorruptibleLogicServer::new());
        logic.mark_corrupted();
        let (mut receiver, _transport, _manager) = new_test_receiver_with_logic(logic);
        assert_eq!(receiver.check_and_handle_logic_corruption(), Ok(()));
        assert_eq!(receiver.state(), ReceiverState::Connecting);
    }

    #[test_log::test]
    fn is_in_use_becomes_false_only_after_disconnected() {
        let (mut receiver, _transport, _manager) = new_test_receiver();
        assert!(receiver.is_in_use());
        receiver.terminate().unwrap();
        assert!(!receiver.is_in_use());
    }

    #[test_log::test]
    fn push_inbound_is_available_for_future_reactor_driven_tests() {
        // Exercises MockTransport::push_inbound so its existence as a test
        // seam for a future reactor-loop test is actually used/checked.
        let transport = MockTransport::default();
        transport.push_inbound(ControlMessage::AckConnection {
            queue_mem_config: queue_cfg(),
            queue_mem_handle: ExchangeHandle::from_raw(7),
        });
        let mut t = transport.clone();
        let received = t.try_recv().unwrap();
        assert_eq!(received.len(), 1);
    }
}
