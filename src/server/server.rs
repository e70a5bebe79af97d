//! The built server: a live arena of receivers plus the shared-memory and
//! logic-server collaborators they were built with.

use std::sync::Arc;

use log::info;

use crate::error::MemConError;
use crate::id::{ClassHandle, ReceiverId};
use crate::logic_server::LogicServer;
use crate::memory::{QueueMemoryConfig, SharedMemoryAllocator, SharedMemoryManager, SharedMemoryResolver, SlotMemoryConfig};
use crate::receiver::{ConnectCallbacks, Receiver, ReceiverState, ReceiverStateKind, TransitionCallback};
use crate::side_channel::SideChannelTransport;

enum Slot<S> {
    Vacant,
    Occupied {
        receiver: Receiver,
        // Kept alive so the regions back the handles handed out in the
        // handshake for as long as the receiver that owns them exists.
        _slot_pool: S,
        _server_queue: S,
    },
}

/// Arena of [`Receiver`]s indexed by [`ReceiverId`], with generation
/// counters so a stale id captured before an index was recycled can be told
/// apart from that index's new occupant.
struct ReceiverArena<S> {
    slots: Vec<Slot<S>>,
    generations: Vec<u64>,
    free: Vec<usize>,
}

impl<S> Default for ReceiverArena<S> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<S> ReceiverArena<S> {
    fn reserve_id(&mut self) -> ReceiverId {
        if let Some(index) = self.free.pop() {
            ReceiverId::new(index, self.generations[index])
        } else {
            let index = self.slots.len();
            self.slots.push(Slot::Vacant);
            self.generations.push(0);
            ReceiverId::new(index, 0)
        }
    }

    fn place(&mut self, id: ReceiverId, receiver: Receiver, slot_pool: S, server_queue: S) {
        self.slots[id.index()] = Slot::Occupied {
            receiver,
            _slot_pool: slot_pool,
            _server_queue: server_queue,
        };
    }

    fn get(&self, id: ReceiverId) -> Option<&Receiver> {
        if self.generations.get(id.index()).copied() != Some(id.generation()) {
            return None;
        }
        match self.slots.get(id.index())? {
            Slot::Occupied { receiver, .. } => Some(receiver),
            Slot::Vacant => None,
        }
    }

    fn get_mut(&mut self, id: ReceiverId) -> Option<&mut Receiver> {
        if self.generations.get(id.index()).copied() != Some(id.generation()) {
            return None;
        }
        match self.slots.get_mut(id.index())? {
            Slot::Occupied { receiver, .. } => Some(receiver),
            Slot::Vacant => None,
        }
    }

    fn remove(&mut self, id: ReceiverId) -> bool {
        if self.generations.get(id.index()).copied() != Some(id.generation()) {
            return false;
        }
        match self.slots.get(id.index()) {
            Some(Slot::Occupied { .. }) => {
                self.slots[id.index()] = Slot::Vacant;
                self.generations[id.index()] += 1;
                self.free.push(id.index());
                true
            }
            _ => false,
        }
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (ReceiverId, &mut Receiver)> {
        self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Occupied { receiver, .. } => Some((receiver.id(), receiver)),
            Slot::Vacant => None,
        })
    }

    fn iter(&self) -> impl Iterator<Item = &Receiver> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied { receiver, .. } => Some(receiver),
            Slot::Vacant => None,
        })
    }

    fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// A built MemCon server: owns the shared-memory manager, the logic
/// server, and the arena of live receivers.
pub struct Server<A: SharedMemoryAllocator> {
    memory: Arc<SharedMemoryManager<A>>,
    logic: Arc<dyn LogicServer>,
    slot_config: SlotMemoryConfig,
    queue_config: QueueMemoryConfig,
    max_receivers: usize,
    num_classes: usize,
    on_receiver_state_transition: Option<TransitionCallback>,
    arena: ReceiverArena<A::Segment>,
}

impl<A: SharedMemoryAllocator> Server<A> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        memory: Arc<SharedMemoryManager<A>>,
        logic: Arc<dyn LogicServer>,
        slot_config: SlotMemoryConfig,
        queue_config: QueueMemoryConfig,
        max_receivers: usize,
        num_classes: usize,
        on_receiver_state_transition: Option<TransitionCallback>,
    ) -> Self {
        Self {
            memory,
            logic,
            slot_config,
            queue_config,
            max_receivers,
            num_classes,
            on_receiver_state_transition,
            arena: ReceiverArena::default(),
        }
    }

    /// Registers a new [`Receiver`] in `Connecting` for a freshly-accepted
    /// side channel, under the given [`ClassHandle`]. The caller still owns
    /// calling `Connect` on the returned receiver.
    pub fn register_receiver_for_incoming_side_channel(
        &mut self,
        side_channel: Box<dyn SideChannelTransport>,
        class: ClassHandle,
    ) -> Result<ReceiverId, MemConError> {
        if class.index() >= self.num_classes {
            return Err(MemConError::UnknownReceiverClass {
                class,
                num_classes: self.num_classes,
            });
        }
        if self.arena.len() >= self.max_receivers {
            return Err(MemConError::ReceiverCapacityExhausted {
                max_receivers: self.max_receivers,
            });
        }

        let memory = self
            .memory
            .allocate_receiver_memory(&self.slot_config, &self.queue_config)
            .map_err(|e| MemConError::MemoryError { detail: e.to_string() })?;

        let id = self.arena.reserve_id();
        let resolver: Arc<dyn SharedMemoryResolver> = self.memory.clone();
        let receiver = Receiver::new(
            id,
            class,
            side_channel,
            self.logic.clone(),
            resolver,
            self.slot_config,
            memory.slot_pool_handle,
            self.queue_config,
            memory.server_queue_handle,
        );
        self.arena.place(id, receiver, memory.slot_pool, memory.server_queue);
        info!("registered receiver {id:?} in class {class:?}");
        Ok(id)
    }

    /// The default [`ConnectCallbacks`] a caller should pass to
    /// [`Receiver::connect`] to wire up the server-wide
    /// `on_receiver_state_transition` callback configured at build time.
    pub fn default_connect_callbacks(&self) -> ConnectCallbacks {
        match &self.on_receiver_state_transition {
            Some(cb) => {
                let cb = cb.clone();
                ConnectCallbacks::new().with_on_transition(move |id, from, to| cb(id, from, to))
            }
            None => ConnectCallbacks::new(),
        }
    }

    pub fn receiver(&self, id: ReceiverId) -> Option<&Receiver> {
        self.arena.get(id)
    }

    pub fn receiver_mut(&mut self, id: ReceiverId) -> Option<&mut Receiver> {
        self.arena.get_mut(id)
    }

    /// Fans `HandleServerShutdown` out to every live receiver.
    pub fn broadcast_shutdown(&mut self) -> Vec<(ReceiverId, Result<(), MemConError>)> {
        self.arena
            .iter_mut()
            .map(|(id, receiver)| (id, receiver.handle_server_shutdown()))
            .collect()
    }

    /// Removes every receiver that has reached `Disconnected` and is no
    /// longer in use. Returns the number of receivers removed.
    pub fn prune_disconnected(&mut self) -> usize {
        let to_remove: Vec<ReceiverId> = self
            .arena
            .iter()
            .filter(|r| r.state() == ReceiverState::Disconnected && !r.is_in_use())
            .map(|r| r.id())
            .collect();
        let removed = to_remove.len();
        for id in to_remove {
            self.arena.remove(id);
        }
        removed
    }

    pub fn receiver_count(&self) -> usize {
        self.arena.len()
    }

    pub fn receivers_in_state(&self, kind: ReceiverStateKind) -> usize {
        self.arena.iter().filter(|r| r.state().kind() == kind).count()
    }
}
