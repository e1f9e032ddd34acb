//! Handshake message types, reassembly, and per-message coders.

pub mod codec;
pub mod codec12;
pub mod extensions_codec;
pub mod kem;
pub mod key_exchange;
pub mod signing;

use ferrotls_types::TlsError;

/// Handshake message types (RFC 5246 §7.4, RFC 8446 §4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    NewSessionTicket = 4,
    EncryptedExtensions = 8,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
    KeyUpdate = 24,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Result<Self, TlsError> {
        match v {
            0 => Ok(HandshakeType::HelloRequest),
            1 => Ok(HandshakeType::ClientHello),
            2 => Ok(HandshakeType::ServerHello),
            4 => Ok(HandshakeType::NewSessionTicket),
            8 => Ok(HandshakeType::EncryptedExtensions),
            11 => Ok(HandshakeType::Certificate),
            12 => Ok(HandshakeType::ServerKeyExchange),
            13 => Ok(HandshakeType::CertificateRequest),
            14 => Ok(HandshakeType::ServerHelloDone),
            15 => Ok(HandshakeType::CertificateVerify),
            16 => Ok(HandshakeType::ClientKeyExchange),
            20 => Ok(HandshakeType::Finished),
            24 => Ok(HandshakeType::KeyUpdate),
            _ => Err(TlsError::BadMessage(format!("unknown handshake type {v}"))),
        }
    }
}

/// A complete handshake message: `raw` is the full wire form including the
/// 4-byte header, exactly what the transcript hash consumes.
#[derive(Debug, Clone)]
pub struct HandshakeMessage {
    pub msg_type: HandshakeType,
    pub raw: Vec<u8>,
}

impl HandshakeMessage {
    /// The message body after the 4-byte header.
    pub fn body(&self) -> &[u8] {
        &self.raw[4..]
    }
}

/// Wrap a handshake body with `msg_type(1) || length(3)`.
pub fn wrap_handshake(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let len = body.len();
    let mut out = Vec::with_capacity(4 + len);
    out.push(msg_type as u8);
    out.push((len >> 16) as u8);
    out.push((len >> 8) as u8);
    out.push(len as u8);
    out.extend_from_slice(body);
    out
}

/// Reassembles handshake messages that span record boundaries.
///
/// Records of handshake type are appended as they decrypt; `next_message`
/// yields one complete message at a time and leaves partial tail bytes
/// buffered until the rest arrives. This is what makes the state machine
/// resumable mid-message: the pending bytes simply stay here across
/// would-block suspensions.
#[derive(Default)]
pub struct MessageReassembler {
    pending: Vec<u8>,
}

impl MessageReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &[u8]) {
        self.pending.extend_from_slice(fragment);
    }

    /// Bytes buffered but not yet forming a complete message.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pop the next complete message, if one is fully buffered.
    pub fn next_message(&mut self) -> Result<Option<HandshakeMessage>, TlsError> {
        if self.pending.len() < 4 {
            return Ok(None);
        }
        let msg_type = HandshakeType::from_u8(self.pending[0])?;
        let length = ((self.pending[1] as usize) << 16)
            | ((self.pending[2] as usize) << 8)
            | (self.pending[3] as usize);
        let total = 4 + length;
        if self.pending.len() < total {
            return Ok(None);
        }
        let raw: Vec<u8> = self.pending.drain(..total).collect();
        Ok(Some(HandshakeMessage { msg_type, raw }))
    }
}
