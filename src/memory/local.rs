//! In-process reference backing for [`SharedMemoryAllocator`], standing in
//! for a real POSIX `shm_open`/`mmap`-based implementation. Exercises the
//! same trait a production allocator would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::MemoryError;
use crate::memory::{ExchangeHandle, SharedMemoryAllocator, SharedMemorySegment};

/// A region of heap memory shared between handles via `Arc`, simulating
/// (within one process) what a real shared-memory mapping provides across
/// processes.
#[derive(Debug, Clone)]
pub struct LocalSegment {
    bytes: Arc<Vec<u8>>,
}

impl SharedMemorySegment for LocalSegment {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Reference allocator used by tests and by callers who do not need a real
/// cross-process mapping (e.g. single-process simulation of client and
/// server).
#[derive(Debug, Default)]
pub struct LocalMemoryAllocator {
    next_handle: AtomicU64,
    regions: Mutex<HashMap<u64, LocalSegment>>,
}

impl LocalMemoryAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SharedMemoryAllocator for LocalMemoryAllocator {
    type Segment = LocalSegment;

    fn allocate(&self, region: &'static str, size: usize) -> Result<(LocalSegment, ExchangeHandle), MemoryError> {
        if size == 0 {
            return Err(MemoryError::AllocationFailed { region, requested: size });
        }
        let segment = LocalSegment {
            bytes: Arc::new(vec![0u8; size]),
        };
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.regions.lock().unwrap().insert(raw, segment.clone());
        Ok((segment, ExchangeHandle::from_raw(raw)))
    }

    fn resolve(&self, handle: ExchangeHandle) -> Result<LocalSegment, MemoryError> {
        self.regions
            .lock()
            .unwrap()
            .get(&handle.raw())
            .cloned()
            .ok_or(MemoryError::UnknownExchangeHandle(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_then_resolve_round_trips() {
        let allocator = LocalMemoryAllocator::new();
        let (segment, handle) = allocator.allocate("slot_pool", 256).unwrap();
        assert_eq!(segment.len(), 256);
        let resolved = allocator.resolve(handle).unwrap();
        assert_eq!(resolved.len(), 256);
    }

    #[test]
    fn resolving_unknown_handle_errors() {
        let allocator = LocalMemoryAllocator::new();
        let bogus = ExchangeHandle::from_raw(999);
        assert!(matches!(
            allocator.resolve(bogus),
            Err(MemoryError::UnknownExchangeHandle(_))
        ));
    }

    #[test]
    fn zero_size_allocation_fails() {
        let allocator = LocalMemoryAllocator::new();
        assert!(allocator.allocate("queue", 0).is_err());
    }
}
