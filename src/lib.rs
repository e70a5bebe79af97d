//! `memcon` — a zero-copy shared-memory IPC stack in the style of an
//! AUTOSAR Adaptive binding: a server-side receiver state machine and
//! shared-memory slot/queue protocol coordinated over a bidirectional
//! side channel, plus a method/event routing fabric for request/response,
//! fire-and-forget, and event traffic between transformation-layer
//! endpoints and connection sinks.
//!
//! # Module map
//!
//! - [`id`] — service-instance identity, receiver/class handles, session
//!   ids, integrity levels.
//! - [`error`] — the closed set of error kinds this crate can surface.
//! - [`memory`] — shared-memory region configuration, mapping, and
//!   allocation.
//! - [`side_channel`] — the control-message framing and transport trait
//!   coordinating a receiver's lifecycle.
//! - [`logic_server`] — the per-receiver slot accounting collaborator.
//! - [`receiver`] — the receiver state machine itself: the hardest and
//!   most central part of this crate.
//! - [`server`] — server construction, parameter validation, and the live
//!   receiver arena.
//! - [`router`] — the method/event routing fabric: proxy and skeleton
//!   backends, the pending-request map, and offer-state gating.
//! - [`access_control`] — the yes/no decision points gating method and
//!   event traffic.
//! - [`trace`] — the trace sink surface.
//! - [`util`] — move-only callables, fatal exit, and typed error dispatch.
//! - [`location`] — cheap call-site capture used by error reporting.
//!
//! This crate treats the POSIX side-channel transport's concrete socket
//! implementation, the underlying shared-memory mapping library, the
//! ASN.1/X.509 certificate plumbing, the crypto key containers, and the
//! generated per-service glue code as external collaborators: only the
//! contracts this crate consumes from them are modeled, behind traits a
//! caller can implement against their own concrete infrastructure.
//! Serialization of on-the-wire payloads is left to caller-supplied (de)
//! serializers; this crate treats payload bytes as opaque.

pub mod access_control;
pub mod error;
pub mod id;
pub mod location;
pub mod logic_server;
pub mod memory;
pub mod receiver;
pub mod router;
pub mod server;
pub mod side_channel;
pub mod trace;
pub mod util;

pub use error::MemConError;
pub use id::{ClassHandle, ProvidedServiceInstanceId, ReceiverId};
pub use logic_server::LogicServer;
pub use receiver::Receiver;
pub use server::{Server, ServerBuilder};
