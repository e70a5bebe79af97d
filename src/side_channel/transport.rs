//! The trait boundary standing in for the POSIX side-channel transport,
//! treated here as an external collaborator: only a reliable, ordered,
//! local delivery contract is assumed.

use mio::event::Source;
use thiserror::Error;

use crate::side_channel::ControlMessage;

/// Transport-level failure, distinct from a protocol-level
/// [`crate::error::MemConError::ProtocolError`]: this is what a
/// [`SideChannelTransport`] reports when the underlying connection itself
/// is unusable.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer disconnected")]
    Disconnected,
    #[error("peer crashed: {0}")]
    PeerCrashed(String),
    #[error("malformed frame: {0}")]
    Protocol(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A reliable, in-order, local control-message channel between one server
/// receiver and its peer. Implementations are polled by the single
/// reactor; they must never block on `try_send`/`try_recv`.
///
/// This crate ships [`crate::side_channel::posix`] as a reference
/// implementation, but callers may substitute their own as long as it
/// upholds the same ordering and reliability contract.
pub trait SideChannelTransport: Source {
    /// Enqueues `message` for sending. Returns a [`TransportError`] if the
    /// transport cannot accept it (e.g. the peer has gone away); never
    /// blocks.
    fn send(&mut self, message: &ControlMessage) -> Result<(), TransportError>;

    /// Attempts to drain all complete frames currently available without
    /// blocking. Returns an empty vector if none are ready.
    fn try_recv(&mut self) -> Result<Vec<ControlMessage>, TransportError>;
}
