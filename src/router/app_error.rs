//! Application-error payload: `(error_domain:u64, error_code:u64,
//! support_data:u64, user_message:length-prefixed-utf8)`, ASN.1/big-endian
//! structured. The user message is always parsed but always
//! yielded as the empty string — "R19-11 compatibility".

use std::collections::HashMap;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::{Buf, Bytes};

use crate::error::MemConError;

/// A domain-scoped application error code, the payload of a method
/// application-error response.
///
/// `user_message` is always the empty string: the field is parsed off
/// the wire (so a malformed length prefix is still a decode error) but
/// never surfaced, preserving wire compatibility with peers that still
/// send a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode {
    pub domain: u64,
    pub code: u64,
    pub support_data: u64,
    pub user_message: String,
}

impl ErrorCode {
    pub fn new(domain: u64, code: u64, support_data: u64) -> Self {
        Self {
            domain,
            code,
            support_data,
            user_message: String::new(),
        }
    }

    /// Encodes `(domain, code, support_data, user_message)` big-endian,
    /// with `user_message` length-prefixed as a `u32` byte count followed
    /// by its UTF-8 bytes.
    pub fn encode(&self) -> Vec<u8> {
        let message_bytes = self.user_message.as_bytes();
        let mut buf = Vec::with_capacity(8 * 3 + 4 + message_bytes.len());
        buf.write_u64::<BigEndian>(self.domain).unwrap();
        buf.write_u64::<BigEndian>(self.code).unwrap();
        buf.write_u64::<BigEndian>(self.support_data).unwrap();
        buf.write_u32::<BigEndian>(message_bytes.len() as u32).unwrap();
        buf.extend_from_slice(message_bytes);
        buf
    }

    /// Decodes a payload produced by [`ErrorCode::encode`]. The wire
    /// `user_message` is fully parsed (a truncated or non-UTF-8 message is
    /// still a decode error) but discarded; it is always yielded as the
    /// empty string.
    pub fn decode(mut payload: Bytes) -> Result<Self, MemConError> {
        if payload.remaining() < 8 * 3 + 4 {
            return Err(truncated());
        }
        let domain = payload.get_u64();
        let code = payload.get_u64();
        let support_data = payload.get_u64();
        let message_len = payload.get_u32() as usize;
        if payload.remaining() < message_len {
            return Err(truncated());
        }
        let message_bytes = payload.copy_to_bytes(message_len);
        let _ = std::str::from_utf8(&message_bytes).map_err(|_| truncated())?;
        Ok(Self {
            domain,
            code,
            support_data,
            user_message: String::new(),
        })
    }
}

fn truncated() -> MemConError {
    MemConError::NetworkBindingFailure {
        detail: "truncated or malformed application-error payload",
    }
}

/// One error domain: a name plus the set of codes it is allowed to raise,
/// consulted when deciding whether an incoming application error maps to a
/// configured `ErrorCode` or falls back to the network-binding-failure
/// error.
#[derive(Debug, Clone)]
pub struct ErrorDomain {
    pub name: &'static str,
    pub codes: Vec<u64>,
}

/// Maps `error_domain` values configured for one proxy method backend to
/// the set of codes that domain may raise.
#[derive(Debug, Clone, Default)]
pub struct ApplicationErrorTable {
    domains: HashMap<u64, ErrorDomain>,
}

impl ApplicationErrorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, domain_id: u64, domain: ErrorDomain) -> Self {
        self.domains.insert(domain_id, domain);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// `true` if `domain_id` is configured and `code` is one of its known
    /// codes.
    pub fn is_known(&self, domain_id: u64, code: u64) -> bool {
        self.domains
            .get(&domain_id)
            .is_some_and(|d| d.codes.contains(&code))
    }
}
