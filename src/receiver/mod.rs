//! One server-side receiver's state machine.

mod callbacks;
mod receiver;
mod state;

pub use callbacks::{ConnectCallbacks, TransitionCallback};
pub use receiver::{PeerErrorKind, Receiver};
pub use state::{ConnectedSub, ReceiverState, ReceiverStateKind};
