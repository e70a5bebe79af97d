//! The trait boundary standing in for the underlying shared-memory mapping
//! library, treated here as an external collaborator.

use crate::error::MemoryError;
use crate::memory::ExchangeHandle;

/// A mapped shared-memory region. Implementations are expected to be
/// cheaply cloneable handles (e.g. an `Arc` around the actual mapping) so
/// that both the [`crate::receiver::Receiver`] that mapped it and the
/// `LogicServer` that reads it can hold a reference for as long as either
/// needs it.
pub trait SharedMemorySegment: Send + Sync + std::fmt::Debug {
    /// Size of the mapped region in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw byte access to the mapped region. Safety of concurrent access
    /// across the process boundary is the caller's responsibility; this
    /// crate only ever reads/writes its own framing, never interprets
    /// slot payloads.
    fn as_bytes(&self) -> &[u8];
}

/// Collaborator that allocates and maps shared-memory regions and mints
/// [`ExchangeHandle`]s that grant a peer process access to them.
pub trait SharedMemoryAllocator: Send + Sync {
    /// The concrete segment type this allocator produces.
    type Segment: SharedMemorySegment + 'static;

    /// Allocates a region of `size` bytes and returns it along with the
    /// exchange handle a peer can use to request map-access to it.
    fn allocate(&self, region: &'static str, size: usize) -> Result<(Self::Segment, ExchangeHandle), MemoryError>;

    /// Resolves a previously-minted exchange handle back to its segment,
    /// used on the peer side of the handshake.
    fn resolve(&self, handle: ExchangeHandle) -> Result<Self::Segment, MemoryError>;
}

/// Object-safe resolver a [`crate::receiver::Receiver`] holds to map the
/// client's queue handle on `OnAckConnection`, decoupling it from any
/// particular [`SharedMemoryAllocator`] implementation's associated
/// `Segment` type.
pub trait SharedMemoryResolver: Send + Sync {
    fn resolve(&self, handle: ExchangeHandle) -> Result<Box<dyn SharedMemorySegment>, MemoryError>;
}

impl<A> SharedMemoryResolver for crate::memory::SharedMemoryManager<A>
where
    A: SharedMemoryAllocator,
{
    fn resolve(&self, handle: ExchangeHandle) -> Result<Box<dyn SharedMemorySegment>, MemoryError> {
        self.resolve_client_queue(handle)
            .map(|segment| Box::new(segment) as Box<dyn SharedMemorySegment>)
    }
}
