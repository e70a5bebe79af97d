//! The four-state tagged variant driving one receiver's lifecycle: all
//! transition logic lives in one place and is matched exhaustively.

use std::fmt;

/// Sub-state of `Connected`: whether this receiver currently wants to be
/// woken by notifications (`Notified`) or is polling on its own
/// (`Polling`). Initial sub-state on entering `Connected` is `Polling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectedSub {
    Polling,
    Notified,
}

/// The receiver's lifecycle state. `Disconnected` is
/// terminal: no event ever transitions out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Connecting,
    Connected(ConnectedSub),
    Corrupted,
    Disconnected,
}

impl ReceiverState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ReceiverState::Connected(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReceiverState::Disconnected)
    }

    /// The coarse state name, stable across `ConnectedSub` changes — used
    /// by [`crate::server::Server::receivers_in_state`].
    pub fn kind(&self) -> ReceiverStateKind {
        match self {
            ReceiverState::Connecting => ReceiverStateKind::Connecting,
            ReceiverState::Connected(_) => ReceiverStateKind::Connected,
            ReceiverState::Corrupted => ReceiverStateKind::Corrupted,
            ReceiverState::Disconnected => ReceiverStateKind::Disconnected,
        }
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverState::Connecting => write!(f, "Connecting"),
            ReceiverState::Connected(ConnectedSub::Polling) => write!(f, "Connected(Polling)"),
            ReceiverState::Connected(ConnectedSub::Notified) => write!(f, "Connected(Notified)"),
            ReceiverState::Corrupted => write!(f, "Corrupted"),
            ReceiverState::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Coarse state discriminant, ignoring `ConnectedSub`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverStateKind {
    Connecting,
    Connected,
    Corrupted,
    Disconnected,
}
