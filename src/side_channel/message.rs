//! Control-plane wire types for the side channel: `AckConnection`,
//! `StartListening`, `StopListening`, `Notification`, `Shutdown`,
//! `Termination`.

use bit_vec::BitVec;
use speedy::{Context, Readable, Reader, Writable, Writer};

use crate::memory::{ExchangeHandle, QueueMemoryConfig, SlotMemoryConfig};

/// Per-receiver-class counts of slots that were produced but suppressed
/// for this receiver since the last notification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DroppedInformation {
    per_class_dropped: Vec<u32>,
}

impl DroppedInformation {
    pub fn empty(num_classes: usize) -> Self {
        Self {
            per_class_dropped: vec![0; num_classes],
        }
    }

    /// Records one more dropped slot for `class`, growing the table if
    /// needed. Used to coalesce multiple drops between two notifications
    /// into a single payload.
    pub fn record_drop(&mut self, class: usize) {
        if class >= self.per_class_dropped.len() {
            self.per_class_dropped.resize(class + 1, 0);
        }
        self.per_class_dropped[class] += 1;
    }

    pub fn dropped_for_class(&self, class: usize) -> u32 {
        self.per_class_dropped.get(class).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.per_class_dropped.iter().all(|&c| c == 0)
    }

    /// Merges `other` into `self`, summing per-class counts. Used when a
    /// notification could not be sent immediately and a further drop
    /// needs to be folded into the pending report.
    pub fn merge(&mut self, other: &DroppedInformation) {
        if other.per_class_dropped.len() > self.per_class_dropped.len() {
            self.per_class_dropped.resize(other.per_class_dropped.len(), 0);
        }
        for (i, &count) in other.per_class_dropped.iter().enumerate() {
            self.per_class_dropped[i] += count;
        }
    }
}

impl<'a, C: Context> Readable<'a, C> for DroppedInformation {
    fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
        let counts = Vec::<u32>::read_from(reader)?;
        Ok(DroppedInformation {
            per_class_dropped: counts,
        })
    }
}

impl<C: Context> Writable<C> for DroppedInformation {
    fn write_to<W: ?Sized + Writer<C>>(&self, writer: &mut W) -> Result<(), C::Error> {
        self.per_class_dropped.write_to(writer)
    }
}

/// A bitmap of which classes currently have any suppressed slot, a compact
/// companion view over [`DroppedInformation`] used by the Logic Server's
/// bookkeeping.
pub fn dropped_classes_bitmap(info: &DroppedInformation) -> BitVec {
    BitVec::from_fn(info.per_class_dropped.len(), |i| info.per_class_dropped[i] > 0)
}

/// One control message exchanged over the side channel, server → client or
/// client → server.
#[derive(Debug, Clone, PartialEq, Readable, Writable)]
pub enum ControlMessage {
    /// First frame sent by the server after `Connect()`: slot-memory
    /// config + exchange handle, then queue-memory config + exchange
    /// handle.
    Handshake {
        slot_mem_config: SlotMemoryConfig,
        slot_mem_handle: ExchangeHandle,
        queue_mem_config: QueueMemoryConfig,
        queue_mem_handle: ExchangeHandle,
    },
    /// Client → server: handshake accepted, carrying the client's own
    /// readable queue configuration and exchange handle.
    AckConnection {
        queue_mem_config: QueueMemoryConfig,
        queue_mem_handle: ExchangeHandle,
    },
    /// Client → server: start waking this receiver on new slots.
    StartListening,
    /// Client → server: stop waking this receiver; it will poll instead.
    StopListening,
    /// Server → client: content-free wake-up, carrying coalesced drop
    /// information since the last notification.
    Notification { dropped: DroppedInformation },
    /// Either direction: graceful shutdown of this one connection.
    Shutdown,
    /// Server → client: the whole server is going down.
    Termination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTechnology;
    use speedy::{Readable, Writable};

    #[test]
    fn handshake_round_trips_through_speedy() {
        let slot_cfg = SlotMemoryConfig::new(4, 128, 16, MemoryTechnology::Heap).unwrap();
        let queue_cfg = QueueMemoryConfig::new(8, MemoryTechnology::Heap).unwrap();
        let msg = ControlMessage::Handshake {
            slot_mem_config: slot_cfg,
            slot_mem_handle: ExchangeHandle::from_raw(1),
            queue_mem_config: queue_cfg,
            queue_mem_handle: ExchangeHandle::from_raw(2),
        };
        let bytes = msg.write_to_vec().unwrap();
        let decoded = ControlMessage::read_from_buffer(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn notification_round_trips_with_dropped_info() {
        let mut dropped = DroppedInformation::empty(2);
        dropped.record_drop(1);
        dropped.record_drop(1);
        let msg = ControlMessage::Notification { dropped: dropped.clone() };
        let bytes = msg.write_to_vec().unwrap();
        let decoded = ControlMessage::read_from_buffer(&bytes).unwrap();
        assert_eq!(msg, decoded);
        if let ControlMessage::Notification { dropped: d } = decoded {
            assert_eq!(d.dropped_for_class(1), 2);
        } else {
            panic!("wrong variant");
        }
    }

    #[test]
    fn dropped_information_merge_sums_counts() {
        let mut a = DroppedInformation::empty(1);
        a.record_drop(0);
        let mut b = DroppedInformation::empty(1);
        b.record_drop(0);
        b.record_drop(0);
        a.merge(&b);
        assert_eq!(a.dropped_for_class(0), 3);
    }
}
