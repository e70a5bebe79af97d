//! Collects server construction parameters with set-once semantics and
//! validates them at `build()`.

use std::sync::Arc;

use crate::error::{BuilderError, MemConError, MemoryError};
use crate::id::ClassHandle;
use crate::logic_server::{DefaultLogicServer, LogicServer};
use crate::memory::{
    LocalMemoryAllocator, MemoryTechnology, QueueMemoryConfig, SharedMemoryAllocator, SharedMemoryManager,
    SlotMemoryConfig,
};
use crate::receiver::TransitionCallback;
use crate::server::server::Server;

/// Upper bound on `max_receivers`, independent of any particular platform's
/// `ptrdiff_t` range.
pub const MAX_RECEIVERS_LIMIT: usize = 65536;

/// Builds a [`Server`]. Every setter may be called at most once; calling a
/// setter twice, or calling any setter after [`ServerBuilder::build`] has
/// consumed the builder, returns a [`BuilderError`] rather than panicking.
pub struct ServerBuilder<A: SharedMemoryAllocator = LocalMemoryAllocator> {
    num_slots: Option<u32>,
    content_size: Option<usize>,
    content_alignment: Option<usize>,
    memory_technology: Option<MemoryTechnology>,
    max_receivers: Option<usize>,
    class_limits: Option<Vec<Option<usize>>>,
    on_receiver_state_transition: Option<TransitionCallback>,
    logic_server: Option<Arc<dyn LogicServer>>,
    allocator: Option<A>,
    built: bool,
}

impl<A: SharedMemoryAllocator> Default for ServerBuilder<A> {
    fn default() -> Self {
        Self {
            num_slots: None,
            content_size: None,
            content_alignment: None,
            memory_technology: None,
            max_receivers: None,
            class_limits: None,
            on_receiver_state_transition: None,
            logic_server: None,
            allocator: None,
            built: false,
        }
    }
}

impl<A: SharedMemoryAllocator> ServerBuilder<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_num_slots(&mut self, num_slots: u32) -> Result<&mut Self, BuilderError> {
        self.check_not_built()?;
        if self.num_slots.is_some() {
            return Err(BuilderError::ParameterAlreadySet("num_slots"));
        }
        self.num_slots = Some(num_slots);
        Ok(self)
    }

    pub fn set_content_size(&mut self, content_size: usize) -> Result<&mut Self, BuilderError> {
        self.check_not_built()?;
        if self.content_size.is_some() {
            return Err(BuilderError::ParameterAlreadySet("content_size"));
        }
        self.content_size = Some(content_size);
        Ok(self)
    }

    pub fn set_content_alignment(&mut self, content_alignment: usize) -> Result<&mut Self, BuilderError> {
        self.check_not_built()?;
        if self.content_alignment.is_some() {
            return Err(BuilderError::ParameterAlreadySet("content_alignment"));
        }
        self.content_alignment = Some(content_alignment);
        Ok(self)
    }

    pub fn set_memory_technology(&mut self, technology: MemoryTechnology) -> Result<&mut Self, BuilderError> {
        self.check_not_built()?;
        if self.memory_technology.is_some() {
            return Err(BuilderError::ParameterAlreadySet("memory_technology"));
        }
        self.memory_technology = Some(technology);
        Ok(self)
    }

    pub fn set_max_receivers(&mut self, max_receivers: usize) -> Result<&mut Self, BuilderError> {
        self.check_not_built()?;
        if self.max_receivers.is_some() {
            return Err(BuilderError::ParameterAlreadySet("max_receivers"));
        }
        if max_receivers == 0 || max_receivers > MAX_RECEIVERS_LIMIT {
            return Err(BuilderError::MaxReceiversOutOfRange {
                actual: max_receivers,
                limit: MAX_RECEIVERS_LIMIT,
            });
        }
        self.max_receivers = Some(max_receivers);
        Ok(self)
    }

    /// Sets the number of receiver classes. Each class's concurrency limit
    /// is then set individually via [`ServerBuilder::set_class_limit`].
    pub fn set_num_receiver_classes(&mut self, num_classes: usize) -> Result<&mut Self, BuilderError> {
        self.check_not_built()?;
        if self.class_limits.is_some() {
            return Err(BuilderError::ParameterAlreadySet("num_receiver_classes"));
        }
        self.class_limits = Some(vec![None; num_classes]);
        Ok(self)
    }

    /// Sets the concurrency limit for receiver class `index`. Requires
    /// [`ServerBuilder::set_num_receiver_classes`] to have been called
    /// first.
    pub fn set_class_limit(&mut self, index: usize, limit: usize) -> Result<&mut Self, BuilderError> {
        self.check_not_built()?;
        let classes = self
            .class_limits
            .as_mut()
            .ok_or(BuilderError::ParameterMissing("num_receiver_classes"))?;
        let slot = classes.get_mut(index).ok_or(BuilderError::MissingClassLimit(index))?;
        if slot.is_some() {
            return Err(BuilderError::ParameterAlreadySet("class_limit"));
        }
        *slot = Some(limit);
        Ok(self)
    }

    pub fn set_on_receiver_state_transition(&mut self, callback: TransitionCallback) -> Result<&mut Self, BuilderError> {
        self.check_not_built()?;
        if self.on_receiver_state_transition.is_some() {
            return Err(BuilderError::ParameterAlreadySet("on_receiver_state_transition"));
        }
        self.on_receiver_state_transition = Some(callback);
        Ok(self)
    }

    /// Overrides the default [`LogicServer`] (otherwise a
    /// [`DefaultLogicServer`] built from the configured class limits).
    pub fn set_logic_server(&mut self, logic_server: Arc<dyn LogicServer>) -> Result<&mut Self, BuilderError> {
        self.check_not_built()?;
        if self.logic_server.is_some() {
            return Err(BuilderError::ParameterAlreadySet("logic_server"));
        }
        self.logic_server = Some(logic_server);
        Ok(self)
    }

    /// Overrides the default shared-memory allocator (otherwise `A::default()`).
    pub fn set_allocator(&mut self, allocator: A) -> Result<&mut Self, BuilderError> {
        self.check_not_built()?;
        if self.allocator.is_some() {
            return Err(BuilderError::ParameterAlreadySet("allocator"));
        }
        self.allocator = Some(allocator);
        Ok(self)
    }

    fn check_not_built(&self) -> Result<(), BuilderError> {
        if self.built {
            Err(BuilderError::AlreadyBuilt)
        } else {
            Ok(())
        }
    }

    /// Validates completeness, allocates slot and queue memory, and returns
    /// a ready-to-use [`Server`]. Further setter calls after this error with
    /// [`BuilderError::AlreadyBuilt`].
    pub fn build(&mut self) -> Result<Server<A>, BuilderError>
    where
        A: Default,
    {
        self.check_not_built()?;

        let num_slots = self.num_slots.ok_or(BuilderError::ParameterMissing("num_slots"))?;
        let content_size = self
            .content_size
            .ok_or(BuilderError::ParameterMissing("content_size"))?;
        let content_alignment = self
            .content_alignment
            .ok_or(BuilderError::ParameterMissing("content_alignment"))?;
        let max_receivers = self
            .max_receivers
            .ok_or(BuilderError::ParameterMissing("max_receivers"))?;
        let class_limits = self
            .class_limits
            .clone()
            .ok_or(BuilderError::ParameterMissing("num_receiver_classes"))?;

        if num_slots == 0 {
            return Err(BuilderError::ZeroSlots);
        }
        if content_size == 0 {
            return Err(BuilderError::ZeroContentSize);
        }
        if !crate::memory::is_power_of_two(content_alignment) {
            return Err(BuilderError::AlignmentNotPowerOfTwo(content_alignment));
        }

        let num_classes = class_limits.len();
        let mut resolved_limits = Vec::with_capacity(num_classes);
        for (index, limit) in class_limits.into_iter().enumerate() {
            resolved_limits.push(limit.ok_or(BuilderError::MissingClassLimit(index))?);
        }

        let technology = self.memory_technology.unwrap_or_default();
        let slot_config = SlotMemoryConfig::new(num_slots, content_size, content_alignment, technology)
            .map_err(|_| BuilderError::AlignmentNotPowerOfTwo(content_alignment))?;
        let queue_config = QueueMemoryConfig::new(num_slots, technology).map_err(|_| BuilderError::ZeroSlots)?;

        let allocator = self.allocator.take().unwrap_or_default();
        let memory = Arc::new(SharedMemoryManager::new(allocator));

        let logic: Arc<dyn LogicServer> = match self.logic_server.take() {
            Some(custom) => custom,
            None => Arc::new(DefaultLogicServer::new(resolved_limits)),
        };

        self.built = true;

        Ok(Server::new(
            memory,
            logic,
            slot_config,
            queue_config,
            max_receivers,
            num_classes,
            self.on_receiver_state_transition.take(),
        ))
    }
}

/// Convenience alias for mapping a [`MemoryError`] surfaced while building
/// into the [`MemConError`] the rest of the crate's operations return.
pub fn memory_error_to_memcon(detail: MemoryError) -> MemConError {
    MemConError::MemoryError {
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTechnology;

    #[test]
    fn happy_path_builds_a_server() {
        let mut builder = ServerBuilder::<LocalMemoryAllocator>::new();
        builder
            .set_num_slots(4)
            .unwrap()
            .set_content_size(128)
            .unwrap()
            .set_content_alignment(16)
            .unwrap()
            .set_memory_technology(MemoryTechnology::Heap)
            .unwrap()
            .set_max_receivers(2)
            .unwrap()
            .set_num_receiver_classes(1)
            .unwrap()
            .set_class_limit(0, 2)
            .unwrap();
        let server = builder.build().unwrap();
        assert_eq!(server.receiver_count(), 0);
    }

    #[test]
    fn setting_a_parameter_twice_errors() {
        let mut builder = ServerBuilder::<LocalMemoryAllocator>::new();
        builder.set_num_slots(4).unwrap();
        assert_eq!(
            builder.set_num_slots(8),
            Err(BuilderError::ParameterAlreadySet("num_slots"))
        );
    }

    #[test]
    fn missing_parameter_is_reported_at_build() {
        let mut builder = ServerBuilder::<LocalMemoryAllocator>::new();
        builder.set_num_slots(4).unwrap();
        assert_eq!(builder.build(), Err(BuilderError::ParameterMissing("content_size")));
    }

    #[test]
    fn building_twice_errors() {
        let mut builder = ServerBuilder::<LocalMemoryAllocator>::new();
        builder
            .set_num_slots(4)
            .unwrap()
            .set_content_size(128)
            .unwrap()
            .set_content_alignment(16)
            .unwrap()
            .set_max_receivers(2)
            .unwrap()
            .set_num_receiver_classes(1)
            .unwrap()
            .set_class_limit(0, 2)
            .unwrap();
        builder.build().unwrap();
        assert_eq!(builder.set_num_slots(1), Err(BuilderError::AlreadyBuilt));
        assert_eq!(builder.build(), Err(BuilderError::AlreadyBuilt));
    }

    #[test]
    fn unconfigured_class_limit_is_reported_at_build() {
        let mut builder = ServerBuilder::<LocalMemoryAllocator>::new();
        builder
            .set_num_slots(4)
            .unwrap()
            .set_content_size(128)
            .unwrap()
            .set_content_alignment(16)
            .unwrap()
            .set_max_receivers(2)
            .unwrap()
            .set_num_receiver_classes(2)
            .unwrap()
            .set_class_limit(0, 2)
            .unwrap();
        assert_eq!(builder.build(), Err(BuilderError::MissingClassLimit(1)));
    }
}
