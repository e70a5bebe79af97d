//! The "connection sink" a method/event backend hands a [`Packet`] to for
//! transmission — the router's consumed contract onto the rest of the IPC
//! binding's connection layer.

use crate::error::MemConError;
use crate::router::packet::Packet;

/// A transmit handler for fully-serialized method/event packets. Analogous
/// to the per-connection transmit queue a generated IPC binding connection
/// exposes; this crate only depends on the narrow "accept a packet"
/// contract.
pub trait ConnectionSink: Send + Sync {
    fn transmit(&self, packet: Packet) -> Result<(), MemConError>;
}

/// Reference [`ConnectionSink`] that records every transmitted packet,
/// used by proxy/skeleton unit tests that need to assert on what was sent
/// without a real side channel.
#[derive(Default)]
pub struct RecordingConnectionSink {
    sent: std::sync::Mutex<Vec<Packet>>,
}

impl RecordingConnectionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Packet> {
        self.sent.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConnectionSink for RecordingConnectionSink {
    fn transmit(&self, packet: Packet) -> Result<(), MemConError> {
        self.sent.lock().unwrap().push(packet);
        Ok(())
    }
}
