//! Allocates and maps the two regions a receiver needs — a slot pool and a
//! server queue — and mints the exchange handles the handshake carries to
//! the peer.

use crate::error::MemoryError;
use crate::memory::{ExchangeHandle, QueueMemoryConfig, SharedMemoryAllocator, SlotMemoryConfig};

/// The pair of mapped regions backing one receiver, plus the exchange
/// handles the handshake frame carries to the peer so it can map them
/// itself.
pub struct ReceiverMemory<S> {
    pub slot_pool: S,
    pub slot_pool_handle: ExchangeHandle,
    pub server_queue: S,
    pub server_queue_handle: ExchangeHandle,
}

/// Thin façade over a [`SharedMemoryAllocator`] that knows the two region
/// shapes a receiver needs: a [`SlotMemoryConfig`] pool and a
/// [`QueueMemoryConfig`] queue.
pub struct SharedMemoryManager<A: SharedMemoryAllocator> {
    allocator: A,
}

impl<A: SharedMemoryAllocator> SharedMemoryManager<A> {
    pub fn new(allocator: A) -> Self {
        Self { allocator }
    }

    /// Allocates the slot pool and server queue for one receiver.
    pub fn allocate_receiver_memory(
        &self,
        slot_cfg: &SlotMemoryConfig,
        queue_cfg: &QueueMemoryConfig,
    ) -> Result<ReceiverMemory<A::Segment>, MemoryError> {
        let (slot_pool, slot_pool_handle) = self
            .allocator
            .allocate("slot_pool", slot_cfg.total_bytes())?;
        let (server_queue, server_queue_handle) = self
            .allocator
            .allocate("server_queue", queue_cfg.total_bytes())?;
        Ok(ReceiverMemory {
            slot_pool,
            slot_pool_handle,
            server_queue,
            server_queue_handle,
        })
    }

    /// Resolves the client's readable queue from the exchange handle it
    /// sent in `AckConnection`.
    pub fn resolve_client_queue(&self, handle: ExchangeHandle) -> Result<A::Segment, MemoryError> {
        self.allocator.resolve(handle)
    }
}
