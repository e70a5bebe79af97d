//! Shared-memory region configuration value objects.

use serde::{Deserialize, Serialize};
use speedy::{Readable, Writable};
use static_assertions::const_assert_eq;

// `QueueMemoryConfig::total_bytes` assumes one `u64` sequence-number slot
// per ring entry; this pins that assumption to the platform's actual `u64`
// layout instead of leaving it implicit.
const_assert_eq!(std::mem::size_of::<u64>(), 8);

/// Backing technology for a shared-memory region. Kept as a small closed
/// enum so a caller-supplied allocator can interpret it without this crate
/// needing to know the platform details.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde_repr::Serialize_repr,
    serde_repr::Deserialize_repr,
    Readable,
    Writable,
)]
#[repr(u8)]
pub enum MemoryTechnology {
    /// Anonymous heap memory, valid only within one process (tests,
    /// single-process simulation).
    Heap = 0,
    /// POSIX shared memory (`shm_open`/`mmap`).
    Posix = 1,
    /// System V shared memory (`shmget`/`shmat`).
    Sysv = 2,
    /// Let the platform's default allocator choose.
    PlatformDefault = 3,
}

impl Default for MemoryTechnology {
    fn default() -> Self {
        MemoryTechnology::PlatformDefault
    }
}

/// Returns whether `value` is a non-zero power of two.
pub fn is_power_of_two(value: usize) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

/// Rounds `size` up to the next multiple of `alignment`. `alignment` must
/// be a non-zero power of two; callers validate this at construction time.
fn round_up_to_alignment(size: usize, alignment: usize) -> usize {
    debug_assert!(is_power_of_two(alignment));
    (size + alignment - 1) & !(alignment - 1)
}

/// Configuration for the slot pool backing a zero-copy connection.
///
/// Invariant: `content_size` is rounded up to a multiple of
/// `content_alignment` at construction time; `stride()` returns that
/// rounded size, and `total_bytes()` is `num_slots * stride()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Readable, Writable)]
pub struct SlotMemoryConfig {
    num_slots: u32,
    content_size: usize,
    content_alignment: usize,
    memory_technology: MemoryTechnology,
}

/// Error building a [`SlotMemoryConfig`] or [`QueueMemoryConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryConfigError {
    #[error("num_slots must be >= 1")]
    ZeroSlots,
    #[error("content_size must be >= 1")]
    ZeroContentSize,
    #[error("content_alignment must be a non-zero power of two, got {0}")]
    AlignmentNotPowerOfTwo(usize),
}

impl SlotMemoryConfig {
    pub fn new(
        num_slots: u32,
        content_size: usize,
        content_alignment: usize,
        memory_technology: MemoryTechnology,
    ) -> Result<Self, MemoryConfigError> {
        if num_slots == 0 {
            return Err(MemoryConfigError::ZeroSlots);
        }
        if content_size == 0 {
            return Err(MemoryConfigError::ZeroContentSize);
        }
        if !is_power_of_two(content_alignment) {
            return Err(MemoryConfigError::AlignmentNotPowerOfTwo(content_alignment));
        }
        Ok(Self {
            num_slots,
            content_size,
            content_alignment,
            memory_technology,
        })
    }

    pub fn num_slots(&self) -> u32 {
        self.num_slots
    }

    /// The per-slot stride: `content_size` rounded up to a multiple of
    /// `content_alignment`.
    pub fn stride(&self) -> usize {
        round_up_to_alignment(self.content_size, self.content_alignment)
    }

    pub fn content_alignment(&self) -> usize {
        self.content_alignment
    }

    pub fn memory_technology(&self) -> MemoryTechnology {
        self.memory_technology
    }

    /// Total size of the slot pool region: `num_slots * stride()`.
    pub fn total_bytes(&self) -> usize {
        self.num_slots as usize * self.stride()
    }
}

/// Layout parameters for the per-direction lock-free notification queue
/// ring backing a receiver's readable client queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Readable, Writable)]
pub struct QueueMemoryConfig {
    capacity: u32,
    memory_technology: MemoryTechnology,
}

impl QueueMemoryConfig {
    pub fn new(capacity: u32, memory_technology: MemoryTechnology) -> Result<Self, MemoryConfigError> {
        if capacity == 0 {
            return Err(MemoryConfigError::ZeroSlots);
        }
        Ok(Self {
            capacity,
            memory_technology,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn memory_technology(&self) -> MemoryTechnology {
        self.memory_technology
    }

    /// Queue ring size in bytes, assuming one `u64` sequence-number slot
    /// per entry.
    pub fn total_bytes(&self) -> usize {
        self.capacity as usize * std::mem::size_of::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_rounds_up_to_alignment() {
        let cfg = SlotMemoryConfig::new(4, 100, 16, MemoryTechnology::Heap).unwrap();
        assert_eq!(cfg.stride(), 112); // 100 rounded up to multiple of 16
        assert_eq!(cfg.total_bytes(), 4 * 112);
    }

    #[test]
    fn rejects_non_power_of_two_alignment() {
        assert_eq!(
            SlotMemoryConfig::new(4, 100, 3, MemoryTechnology::Heap),
            Err(MemoryConfigError::AlignmentNotPowerOfTwo(3))
        );
    }

    #[test]
    fn rejects_zero_slots() {
        assert_eq!(
            SlotMemoryConfig::new(0, 100, 16, MemoryTechnology::Heap),
            Err(MemoryConfigError::ZeroSlots)
        );
    }

    #[test]
    fn stride_exact_multiple_is_unchanged() {
        let cfg = SlotMemoryConfig::new(1, 128, 16, MemoryTechnology::Heap).unwrap();
        assert_eq!(cfg.stride(), 128);
    }

    #[test]
    fn valid_slot_and_queue_configs_chain_with_the_question_mark_operator() -> anyhow::Result<()> {
        let slots = SlotMemoryConfig::new(4, 100, 16, MemoryTechnology::Heap)?;
        let queue = QueueMemoryConfig::new(8, MemoryTechnology::Heap)?;
        assert_eq!(slots.total_bytes(), 4 * 112);
        assert_eq!(queue.total_bytes(), 8 * std::mem::size_of::<u64>());
        Ok(())
    }
}
