//! Callback surfaces installed on `Connect()` and invoked by the reactor
//! as the receiver's state changes.

use std::sync::Arc;

use crate::id::ReceiverId;
use crate::receiver::ReceiverState;

/// Fired after every state transition, successful or not — including
/// transitions into `Corrupted` — so an embedder can observe the
/// receiver's full lifecycle, not only the happy path.
pub type TransitionCallback = Arc<dyn Fn(ReceiverId, ReceiverState, ReceiverState) + Send + Sync>;

/// Callbacks a caller installs via `Connect()`. `on_transition` is the one
/// this crate calls directly; the rest are reserved hooks an embedder may
/// widen later without changing the state machine's shape.
#[derive(Clone, Default)]
pub struct ConnectCallbacks {
    pub on_transition: Option<TransitionCallback>,
}

impl ConnectCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_transition(mut self, f: impl Fn(ReceiverId, ReceiverState, ReceiverState) + Send + Sync + 'static) -> Self {
        self.on_transition = Some(Arc::new(f));
        self
    }
}
