//! Length-prefixed framing over a byte stream: a `u32` little-endian
//! length prefix followed by a `speedy`-encoded [`ControlMessage`].

use speedy::{Readable, Writable};

use crate::side_channel::transport::TransportError;
use crate::side_channel::ControlMessage;

const LENGTH_PREFIX_BYTES: usize = 4;

/// Encodes one message as `[len:u32 LE][speedy bytes]`.
pub fn encode_frame(message: &ControlMessage) -> Result<Vec<u8>, TransportError> {
    let payload = message
        .write_to_vec()
        .map_err(|e| TransportError::Protocol(format!("failed to encode control message: {e}")))?;
    let mut framed = Vec::with_capacity(LENGTH_PREFIX_BYTES + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// Incremental decoder: accumulates bytes from a non-blocking read loop
/// and yields complete [`ControlMessage`]s as soon as enough bytes have
/// arrived, without re-parsing already-consumed bytes.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds newly-read bytes into the decoder's internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Drains every complete frame currently buffered.
    pub fn drain_messages(&mut self) -> Result<Vec<ControlMessage>, TransportError> {
        let mut messages = Vec::new();
        loop {
            if self.buffer.len() < LENGTH_PREFIX_BYTES {
                break;
            }
            let len = u32::from_le_bytes(self.buffer[0..LENGTH_PREFIX_BYTES].try_into().unwrap()) as usize;
            let total = LENGTH_PREFIX_BYTES + len;
            if self.buffer.len() < total {
                break;
            }
            let payload = &self.buffer[LENGTH_PREFIX_BYTES..total];
            let message = ControlMessage::read_from_buffer(payload)
                .map_err(|e| TransportError::Protocol(format!("failed to decode control message: {e}")))?;
            messages.push(message);
            self.buffer.drain(0..total);
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_frame_fed_whole() {
        let mut decoder = FrameDecoder::new();
        let frame = encode_frame(&ControlMessage::StartListening).unwrap();
        decoder.feed(&frame);
        let msgs = decoder.drain_messages().unwrap();
        assert_eq!(msgs, vec![ControlMessage::StartListening]);
    }

    #[test]
    fn decodes_frame_fed_in_two_pieces() {
        let mut decoder = FrameDecoder::new();
        let frame = encode_frame(&ControlMessage::StopListening).unwrap();
        let (first, second) = frame.split_at(2);
        decoder.feed(first);
        assert!(decoder.drain_messages().unwrap().is_empty());
        decoder.feed(second);
        assert_eq!(decoder.drain_messages().unwrap(), vec![ControlMessage::StopListening]);
    }

    #[test]
    fn decodes_two_frames_fed_together() {
        let mut decoder = FrameDecoder::new();
        let mut combined = encode_frame(&ControlMessage::Shutdown).unwrap();
        combined.extend(encode_frame(&ControlMessage::Termination).unwrap());
        decoder.feed(&combined);
        let msgs = decoder.drain_messages().unwrap();
        assert_eq!(msgs, vec![ControlMessage::Shutdown, ControlMessage::Termination]);
    }
}
