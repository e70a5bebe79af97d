//! Server construction and the live receiver arena.

mod builder;
#[allow(clippy::module_inception)]
mod server;

pub use builder::{ServerBuilder, MAX_RECEIVERS_LIMIT};
pub use server::Server;
