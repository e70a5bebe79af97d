//! Packet assembly: `[protocol_message_header | kind-specific header |
//! payload]`, ref-counted so one allocation can be handed to a transmit
//! handler without copying the payload again.

use bytes::Bytes;
use speedy::{Readable, Writable};

use crate::error::MemConError;
use crate::id::ProvidedServiceInstanceId;
use crate::router::message::{MessageKind, ProtocolMessageHeader};

/// A fully-serialized method/event message, ready for
/// [`crate::router::ConnectionSink::transmit`]. Cloning is O(1) (an
/// `Arc`-backed `Bytes` refcount bump).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Bytes,
}

impl Packet {
    /// Assembles `[ProtocolMessageHeader][header][payload]` into one
    /// contiguous buffer, sized `protocol_header + request_header +
    /// payload` up front.
    pub fn build<H>(service: ProvidedServiceInstanceId, kind: MessageKind, header: &H, payload: &[u8]) -> Result<Self, MemConError>
    where
        H: Writable<speedy::LittleEndian>,
    {
        let protocol_header = ProtocolMessageHeader { service, kind };
        let protocol_bytes = protocol_header
            .write_to_vec()
            .map_err(|e| encode_error(&e))?;
        let header_bytes = header.write_to_vec().map_err(|e| encode_error(&e))?;

        let mut buf = Vec::with_capacity(protocol_bytes.len() + header_bytes.len() + payload.len());
        buf.extend_from_slice(&protocol_bytes);
        buf.extend_from_slice(&header_bytes);
        buf.extend_from_slice(payload);
        Ok(Self { bytes: Bytes::from(buf) })
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Decoded envelope: the protocol header plus the remaining bytes, which
/// the caller re-parses as the kind-specific header once `kind` is known.
pub struct DecodedEnvelope {
    pub service: ProvidedServiceInstanceId,
    pub kind: MessageKind,
    pub rest: Bytes,
}

/// Splits a received buffer into its [`ProtocolMessageHeader`] and the
/// remaining bytes (kind-specific header + payload, still combined).
///
/// `ProtocolMessageHeader` is a fixed-size type (no `Vec`/`String` fields),
/// so `minimum_bytes_needed()` gives its exact wire length; the header is
/// decoded from a slice of exactly that length rather than from the whole
/// buffer, since the buffer also carries the kind-specific header and
/// payload that follow it.
pub fn decode_envelope(bytes: Bytes) -> Result<DecodedEnvelope, MemConError> {
    let header_len = ProtocolMessageHeader::minimum_bytes_needed();
    if bytes.len() < header_len {
        return Err(decode_error_detail("buffer shorter than protocol message header"));
    }
    let header = ProtocolMessageHeader::read_from_buffer(&bytes[..header_len]).map_err(|e| decode_error(&e))?;
    Ok(DecodedEnvelope {
        service: header.service,
        kind: header.kind,
        rest: bytes.slice(header_len..),
    })
}

/// Reads a kind-specific header off the front of `rest`, returning it
/// along with the payload bytes that follow. Every kind-specific header in
/// [`crate::router::message`] is fixed-size, so `minimum_bytes_needed()`
/// gives its exact wire length the same way [`decode_envelope`] uses it.
pub fn split_header<H>(rest: &Bytes) -> Result<(H, Bytes), MemConError>
where
    H: for<'a> Readable<'a, speedy::LittleEndian>,
{
    let header_len = H::minimum_bytes_needed();
    if rest.len() < header_len {
        return Err(decode_error_detail("buffer shorter than message header"));
    }
    let header = H::read_from_buffer(&rest[..header_len]).map_err(|e| decode_error(&e))?;
    Ok((header, rest.slice(header_len..)))
}

fn encode_error(e: &speedy::Error) -> MemConError {
    log::warn!("failed to encode method message: {e}");
    MemConError::NetworkBindingFailure {
        detail: "failed to encode method message",
    }
}

fn decode_error(e: &speedy::Error) -> MemConError {
    log::warn!("failed to decode method message: {e}");
    MemConError::NetworkBindingFailure {
        detail: "failed to decode method message",
    }
}

fn decode_error_detail(detail: &'static str) -> MemConError {
    log::warn!("failed to decode method message: {detail}");
    MemConError::NetworkBindingFailure { detail }
}
