//! The opaque, transport-specific credential that grants a peer process
//! map-access to a shared-memory region.

use std::fmt;

use speedy::{Readable, Writable};

/// An opaque exchange handle. This crate never interprets its bits: it is
/// minted by a [`crate::memory::SharedMemoryManager`] implementation and
/// consumed by the matching [`SharedMemorySegment`](crate::memory::SharedMemorySegment)
/// implementation on the peer side.
///
/// The reference in-process backing ([`crate::memory::local`]) represents
/// it as a generation-tagged token; a real implementation would typically
/// carry a file descriptor or a `HANDLE`, which is why this type carries an
/// opaque `u64` rather than anything more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Readable, Writable)]
pub struct ExchangeHandle(u64);

impl ExchangeHandle {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub(crate) fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExchangeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exchange-handle:{:#x}", self.0)
    }
}
