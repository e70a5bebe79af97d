//! Side-channel control-message framing.

mod codec;
mod message;
#[cfg(feature = "posix-transport")]
pub mod posix;
mod transport;

pub use codec::{encode_frame, FrameDecoder};
pub use message::{dropped_classes_bitmap, ControlMessage, DroppedInformation};
pub use transport::{SideChannelTransport, TransportError};
