//! The accounting engine that tracks which receivers currently hold which
//! slots and decides drops per receiver class.
//!
//! This module gives that accounting engine a trait, [`LogicServer`], plus
//! a straightforward default implementation, [`DefaultLogicServer`], that
//! the [`crate::server::Server`] wires up for callers who do not need a
//! custom slot-accounting policy.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::id::{ClassHandle, ReceiverId};
use crate::side_channel::DroppedInformation;

/// Per-receiver registration record the Logic Server keeps between
/// `register_receiver` and `deregister_receiver`.
#[derive(Debug, Clone, Copy)]
struct Registration {
    class: ClassHandle,
}

/// Registers and deregisters receivers, decides per-receiver-class whether
/// a newly sent slot is consumed or dropped, and reports whether a
/// receiver's own misbehavior caused a corruption condition.
pub trait LogicServer: Send + Sync {
    /// Registers a newly-connected receiver under `class`, called from
    /// `OnAckConnection`.
    fn register_receiver(&self, receiver: ReceiverId, class: ClassHandle);

    /// Deregisters a receiver, called on `OnShutdown`/`Terminate`/
    /// `HandleServerShutdown`/escalation-to-`Corrupted`.
    fn deregister_receiver(&self, receiver: ReceiverId);

    /// Decides, for one newly-produced slot, whether `receiver` consumes
    /// it or it is dropped for that receiver.
    fn on_slot_sent(&self, receiver: ReceiverId) -> SlotDecision;

    /// Returns `true` if this receiver's own behavior (e.g. holding slots
    /// past its class's concurrency limit in a way that violates the
    /// class's invariants) has been flagged as a corruption condition,
    /// consumed by `CheckAndHandleLogicCorruption`.
    fn is_corrupted(&self, receiver: ReceiverId) -> bool;

    /// Returns the coalesced drop information accumulated for `receiver`
    /// since it was last cleared by a successful notification send.
    fn take_dropped_information(&self, receiver: ReceiverId) -> DroppedInformation;
}

/// Outcome of [`LogicServer::on_slot_sent`] for one receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDecision {
    Consumed,
    Dropped,
}

/// Straightforward in-memory [`LogicServer`]: each class has a fixed
/// concurrency limit; a receiver consumes a slot while its class is under
/// the limit and drops it otherwise. This is a simple, auditable default —
/// callers with more specific accounting policies (priority classes,
/// weighted fairness) implement [`LogicServer`] themselves.
pub struct DefaultLogicServer {
    class_limits: Vec<usize>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    registrations: HashMap<ReceiverId, Registration>,
    in_flight_per_class: HashMap<ClassHandle, usize>,
    dropped: HashMap<ReceiverId, DroppedInformation>,
    corrupted: HashMap<ReceiverId, bool>,
}

impl DefaultLogicServer {
    /// `class_limits[i]` is the maximum number of slots class `i` may have
    /// concurrently in flight across all of its receivers.
    pub fn new(class_limits: Vec<usize>) -> Self {
        Self {
            class_limits,
            state: Mutex::new(State::default()),
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_limits.len()
    }
}

impl LogicServer for DefaultLogicServer {
    fn register_receiver(&self, receiver: ReceiverId, class: ClassHandle) {
        let mut state = self.state.lock().unwrap();
        state.registrations.insert(receiver, Registration { class });
        state
            .dropped
            .insert(receiver, DroppedInformation::empty(self.num_classes()));
        state.corrupted.insert(receiver, false);
    }

    fn deregister_receiver(&self, receiver: ReceiverId) {
        let mut state = self.state.lock().unwrap();
        if let Some(reg) = state.registrations.remove(&receiver) {
            if let Some(count) = state.in_flight_per_class.get_mut(&reg.class) {
                *count = count.saturating_sub(1);
            }
        }
        state.dropped.remove(&receiver);
        state.corrupted.remove(&receiver);
    }

    fn on_slot_sent(&self, receiver: ReceiverId) -> SlotDecision {
        let mut state = self.state.lock().unwrap();
        let Some(reg) = state.registrations.get(&receiver).copied() else {
            return SlotDecision::Dropped;
        };
        let limit = self.class_limits.get(reg.class.index()).copied().unwrap_or(0);
        let count = state.in_flight_per_class.entry(reg.class).or_insert(0);
        if *count < limit {
            *count += 1;
            SlotDecision::Consumed
        } else {
            let class_index = reg.class.index();
            state
                .dropped
                .entry(receiver)
                .or_insert_with(|| DroppedInformation::empty(self.num_classes()))
                .record_drop(class_index);
            SlotDecision::Dropped
        }
    }

    fn is_corrupted(&self, receiver: ReceiverId) -> bool {
        let state = self.state.lock().unwrap();
        state.corrupted.get(&receiver).copied().unwrap_or(false)
    }

    fn take_dropped_information(&self, receiver: ReceiverId) -> DroppedInformation {
        let mut state = self.state.lock().unwrap();
        state
            .dropped
            .insert(receiver, DroppedInformation::empty(self.num_classes()))
            .unwrap_or_else(|| DroppedInformation::empty(self.num_classes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(i: usize) -> ReceiverId {
        ReceiverId::new(i, 0)
    }

    #[test]
    fn slots_consumed_until_class_limit_then_dropped() {
        let logic = DefaultLogicServer::new(vec![2]);
        let class = ClassHandle::new(0);
        logic.register_receiver(rid(0), class);
        assert_eq!(logic.on_slot_sent(rid(0)), SlotDecision::Consumed);
        assert_eq!(logic.on_slot_sent(rid(0)), SlotDecision::Consumed);
        assert_eq!(logic.on_slot_sent(rid(0)), SlotDecision::Dropped);
    }

    #[test]
    fn deregistering_unregistered_receiver_is_a_no_op() {
        let logic = DefaultLogicServer::new(vec![1]);
        logic.deregister_receiver(rid(42));
    }

    #[test]
    fn dropped_information_accumulates_until_taken() {
        let logic = DefaultLogicServer::new(vec![0]);
        let class = ClassHandle::new(0);
        logic.register_receiver(rid(0), class);
        logic.on_slot_sent(rid(0));
        logic.on_slot_sent(rid(0));
        let info = logic.take_dropped_information(rid(0));
        assert_eq!(info.dropped_for_class(0), 2);
        let info_after = logic.take_dropped_information(rid(0));
        assert!(info_after.is_empty());
    }

    #[test]
    fn unregistered_receiver_slot_is_dropped() {
        let logic = DefaultLogicServer::new(vec![5]);
        assert_eq!(logic.on_slot_sent(rid(7)), SlotDecision::Dropped);
    }
}
