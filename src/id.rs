//! Identity and header types: `ProvidedServiceInstanceId`, `ReceiverId`,
//! `ClassHandle`, session identifiers, and the integrity-level type used at
//! bind time.

use std::fmt;

use serde::{Deserialize, Serialize};
use speedy::{Readable, Writable};

/// Instance id reserved to mean "all instances"; forbidden on a concrete
/// provided service instance.
pub const INSTANCE_ID_ALL: u32 = 0xFFFF_FFFF;

/// Minor version reserved to mean "any minor version"; forbidden on a
/// concrete provided service instance.
pub const MINOR_VERSION_ANY: u32 = 0xFFFF_FFFF;

/// Error returned when constructing a [`ProvidedServiceInstanceId`] with a
/// sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InstanceIdError {
    #[error("instance_id 0xFFFFFFFF (ALL) is forbidden for a provided service instance")]
    InstanceIsAll,
    #[error("minor_version 0xFFFFFFFF (ANY) is forbidden for a provided service instance")]
    MinorVersionIsAny,
}

/// A concrete offering of a service: `(ServiceId, InstanceId, MajorVersion,
/// MinorVersion)`. Immutable after construction; totally ordered
/// lexicographically by field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Readable, Writable)]
pub struct ProvidedServiceInstanceId {
    service_id: u32,
    instance_id: u32,
    major_version: u8,
    minor_version: u32,
}

impl ProvidedServiceInstanceId {
    /// Constructs a new identity, rejecting the reserved sentinel values.
    pub fn new(
        service_id: u32,
        instance_id: u32,
        major_version: u8,
        minor_version: u32,
    ) -> Result<Self, InstanceIdError> {
        if instance_id == INSTANCE_ID_ALL {
            return Err(InstanceIdError::InstanceIsAll);
        }
        if minor_version == MINOR_VERSION_ANY {
            return Err(InstanceIdError::MinorVersionIsAny);
        }
        Ok(Self {
            service_id,
            instance_id,
            major_version,
            minor_version,
        })
    }

    pub fn service_id(&self) -> u32 {
        self.service_id
    }
    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }
    pub fn major_version(&self) -> u8 {
        self.major_version
    }
    pub fn minor_version(&self) -> u32 {
        self.minor_version
    }
}

impl fmt::Display for ProvidedServiceInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#06x}.{:#06x}:{}.{}",
            self.service_id, self.instance_id, self.major_version, self.minor_version
        )
    }
}

/// Identifies a single receiver managed by one [`crate::server::Server`].
///
/// `index` is unique among currently-active receivers and is always less
/// than the server's configured `max_receivers`. `generation` increments
/// every time an index is re-used after a receiver reaches `Disconnected`
/// and is destroyed, so a stale [`ReceiverId`] captured before re-use can be
/// told apart from the new occupant of the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReceiverId {
    index: usize,
    generation: u64,
}

impl ReceiverId {
    pub(crate) fn new(index: usize, generation: u64) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Opaque index into a server's receiver-class table. A receiver class
/// shares an upper bound on concurrent slot occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassHandle(usize);

impl ClassHandle {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// A client identifier, scoping session IDs and pending requests to a
/// particular proxy-side connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u16);

/// A method identifier within a service interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Readable, Writable)]
pub struct MethodId(pub u16);

/// An event identifier within a service interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Readable, Writable)]
pub struct EventId(pub u16);

/// A per-client, monotonically increasing identifier correlating a method
/// request with its response or application-error.
///
/// Wrap-around is arithmetic modulo a configurable maximum: see
/// [`SessionIdGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Readable, Writable)]
pub struct SessionId(pub u32);

/// Upper bound for a [`SessionIdGenerator`]. `Natural` makes the "use the
/// natural type max when no limit is configured" default explicit instead
/// of relying on a magic zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLimit {
    Natural,
    Bounded(u32),
}

impl SessionLimit {
    fn max(self) -> u32 {
        match self {
            SessionLimit::Natural => u32::MAX,
            SessionLimit::Bounded(m) => m,
        }
    }
}

/// Generates session IDs for a single client's method invocations,
/// wrapping back to zero once the configured limit is exceeded.
#[derive(Debug)]
pub struct SessionIdGenerator {
    next: u32,
    limit: SessionLimit,
}

impl SessionIdGenerator {
    pub fn new(limit: SessionLimit) -> Self {
        Self { next: 0, limit }
    }

    /// Returns the next session ID and advances the generator. When the
    /// generator's current value exceeds the configured limit, it resets
    /// to 0 before being returned.
    pub fn next_id(&mut self) -> SessionId {
        if self.next > self.limit.max() {
            self.next = 0;
        }
        let id = SessionId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// Minimum integrity level a peer must present at bind time.
/// Ordered so a skeleton can reject a peer whose level is below its
/// configured minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Readable, Writable)]
pub struct IntegrityLevel(pub u8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_instance_all_sentinel() {
        assert_eq!(
            ProvidedServiceInstanceId::new(1, INSTANCE_ID_ALL, 1, 0),
            Err(InstanceIdError::InstanceIsAll)
        );
    }

    #[test]
    fn rejects_minor_version_any_sentinel() {
        assert_eq!(
            ProvidedServiceInstanceId::new(1, 2, 1, MINOR_VERSION_ANY),
            Err(InstanceIdError::MinorVersionIsAny)
        );
    }

    #[test]
    fn total_order_is_lexicographic() {
        let a = ProvidedServiceInstanceId::new(1, 1, 1, 0).unwrap();
        let b = ProvidedServiceInstanceId::new(1, 1, 2, 0).unwrap();
        assert!(a < b);
    }

    #[test]
    fn session_generator_wraps_to_zero() {
        let mut gen = SessionIdGenerator::new(SessionLimit::Bounded(2));
        assert_eq!(gen.next_id(), SessionId(0));
        assert_eq!(gen.next_id(), SessionId(1));
        assert_eq!(gen.next_id(), SessionId(2));
        // next() was 3 > limit(2) -> wraps
        assert_eq!(gen.next_id(), SessionId(0));
    }

    #[test]
    fn session_generator_natural_limit_uses_u32_max() {
        let gen = SessionIdGenerator::new(SessionLimit::Natural);
        assert_eq!(gen.limit.max(), u32::MAX);
    }
}
