//! TLS record layer: framing, size limits, and protection dispatch.

pub mod aead12;
pub mod aead13;
pub mod cbc;

use crate::{TlsVersion, TlsError};
use aead12::Aead12;
use aead13::Aead13;
use cbc::CbcCipher;

/// Maximum plaintext fragment (RFC 8446 §5.1).
pub const MAX_PLAINTEXT_LENGTH: usize = 16384;

/// Maximum ciphertext expansion accepted on receive.
pub const MAX_CIPHERTEXT_OVERHEAD: usize = 256;

/// Maximum record payload length accepted on the wire.
pub const MAX_CIPHERTEXT_LENGTH: usize = MAX_PLAINTEXT_LENGTH + MAX_CIPHERTEXT_OVERHEAD;

/// Record header size: type(1) + version(2) + length(2).
pub const RECORD_HEADER_LEN: usize = 5;

/// TLS record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_u8(v: u8) -> Result<Self, TlsError> {
        match v {
            20 => Ok(ContentType::ChangeCipherSpec),
            21 => Ok(ContentType::Alert),
            22 => Ok(ContentType::Handshake),
            23 => Ok(ContentType::ApplicationData),
            _ => Err(TlsError::BadRecord(format!("unknown content type {v}"))),
        }
    }
}

/// A parsed record header.
#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: u16,
    pub length: usize,
}

/// Parse the five header bytes; validates type and payload length.
pub fn parse_record_header(header: &[u8; RECORD_HEADER_LEN]) -> Result<RecordHeader, TlsError> {
    let content_type = ContentType::from_u8(header[0])?;
    let version = u16::from_be_bytes([header[1], header[2]]);
    let length = u16::from_be_bytes([header[3], header[4]]) as usize;
    if length > MAX_CIPHERTEXT_LENGTH {
        return Err(TlsError::BadRecord(format!("record too large: {length}")));
    }
    Ok(RecordHeader {
        content_type,
        version,
        length,
    })
}

/// Serialize `type || version || length` ahead of a payload.
pub fn encode_record_header(
    content_type: ContentType,
    version: u16,
    length: usize,
) -> [u8; RECORD_HEADER_LEN] {
    let len = (length as u16).to_be_bytes();
    let ver = version.to_be_bytes();
    [content_type as u8, ver[0], ver[1], len[0], len[1]]
}

/// One direction's active record protection.
///
/// Each variant owns its sequence number; installing a new cipher is a new
/// value, so the counter resets exactly when the bank switches.
pub enum RecordCipher {
    /// Initial state and ChangeCipherSpec-less plaintext.
    Plaintext,
    Aead13(Aead13),
    Aead12(Aead12),
    Cbc(CbcCipher),
}

impl RecordCipher {
    /// Maximum plaintext this protection can carry in one record, after
    /// subtracting MAC, padding slack, explicit IV, and AEAD expansion.
    pub fn max_plaintext(&self) -> usize {
        match self {
            RecordCipher::Plaintext => MAX_PLAINTEXT_LENGTH,
            RecordCipher::Aead13(c) => c.max_plaintext(),
            RecordCipher::Aead12(c) => c.max_plaintext(),
            RecordCipher::Cbc(c) => c.max_plaintext(),
        }
    }

    /// Protect a fragment; returns the on-the-wire payload (no header), and
    /// the content type to put in the header (TLS 1.3 hides the real one).
    pub fn seal(
        &mut self,
        content_type: ContentType,
        version: u16,
        plaintext: &[u8],
    ) -> Result<(ContentType, Vec<u8>), TlsError> {
        if plaintext.len() > self.max_plaintext() {
            return Err(TlsError::BadRecord(
                "plaintext exceeds maximum fragment length".into(),
            ));
        }
        match self {
            RecordCipher::Plaintext => Ok((content_type, plaintext.to_vec())),
            RecordCipher::Aead13(c) => {
                let payload = c.seal(content_type, plaintext)?;
                Ok((ContentType::ApplicationData, payload))
            }
            RecordCipher::Aead12(c) => {
                let payload = c.seal(content_type, version, plaintext)?;
                Ok((content_type, payload))
            }
            RecordCipher::Cbc(c) => {
                let payload = c.seal(content_type, version, plaintext)?;
                Ok((content_type, payload))
            }
        }
    }

    /// Unprotect a record payload; returns the actual content type (inner
    /// type for TLS 1.3) and the plaintext.
    pub fn open(
        &mut self,
        content_type: ContentType,
        version: u16,
        payload: &[u8],
    ) -> Result<(ContentType, Vec<u8>), TlsError> {
        if payload.len() > MAX_CIPHERTEXT_LENGTH {
            return Err(TlsError::BadRecord("record overflow".into()));
        }
        let (ct, plaintext) = match self {
            RecordCipher::Plaintext => (content_type, payload.to_vec()),
            RecordCipher::Aead13(c) => c.open(content_type, payload)?,
            RecordCipher::Aead12(c) => {
                (content_type, c.open(content_type, version, payload)?)
            }
            RecordCipher::Cbc(c) => (content_type, c.open(content_type, version, payload)?),
        };
        if plaintext.len() > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::BadRecord(
                "decrypted plaintext exceeds maximum length".into(),
            ));
        }
        Ok((ct, plaintext))
    }

    pub fn is_plaintext(&self) -> bool {
        matches!(self, RecordCipher::Plaintext)
    }
}

/// The record version stamped on outbound records.
///
/// The first ClientHello flight advertises {3,1} for maximum middlebox
/// tolerance; after negotiation the in-effect version is used, except TLS
/// 1.3 which keeps {3,3} on the wire.
pub fn wire_version(negotiated: Option<TlsVersion>) -> u16 {
    match negotiated {
        None => TlsVersion::Tls10.wire(),
        Some(TlsVersion::Tls13) => TlsVersion::Tls12.wire(),
        Some(v) => v.wire(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let hdr = encode_record_header(ContentType::Handshake, 0x0303, 517);
        let parsed = parse_record_header(&hdr).unwrap();
        assert_eq!(parsed.content_type, ContentType::Handshake);
        assert_eq!(parsed.version, 0x0303);
        assert_eq!(parsed.length, 517);
    }

    #[test]
    fn test_header_rejects_unknown_type() {
        let hdr = [0x2A, 0x03, 0x03, 0x00, 0x10];
        assert!(parse_record_header(&hdr).is_err());
    }

    #[test]
    fn test_header_rejects_oversize() {
        // 16640 is the last acceptable length
        let ok = encode_record_header(ContentType::ApplicationData, 0x0303, 16640);
        assert!(parse_record_header(&ok).is_ok());
        let bad = encode_record_header(ContentType::ApplicationData, 0x0303, 16641);
        assert!(parse_record_header(&bad).is_err());
    }

    #[test]
    fn test_content_type_values() {
        assert_eq!(ContentType::ChangeCipherSpec as u8, 20);
        assert_eq!(ContentType::Alert as u8, 21);
        assert_eq!(ContentType::Handshake as u8, 22);
        assert_eq!(ContentType::ApplicationData as u8, 23);
        assert!(ContentType::from_u8(19).is_err());
    }

    #[test]
    fn test_plaintext_cipher_passthrough() {
        let mut c = RecordCipher::Plaintext;
        let (ct, payload) = c.seal(ContentType::Handshake, 0x0301, b"hello").unwrap();
        assert_eq!(ct, ContentType::Handshake);
        assert_eq!(payload, b"hello");
        let (ct, plain) = c.open(ContentType::Handshake, 0x0301, &payload).unwrap();
        assert_eq!(ct, ContentType::Handshake);
        assert_eq!(plain, b"hello");
    }

    #[test]
    fn test_wire_version_selection() {
        assert_eq!(wire_version(None), 0x0301);
        assert_eq!(wire_version(Some(TlsVersion::Tls11)), 0x0302);
        assert_eq!(wire_version(Some(TlsVersion::Tls12)), 0x0303);
        assert_eq!(wire_version(Some(TlsVersion::Tls13)), 0x0303);
    }

    fn cipher_pair(suite_key: &str) -> (RecordCipher, RecordCipher) {
        use crate::crypt::hash::HashAlg;
        use crate::crypt::traffic_keys::TrafficKeys;

        match suite_key {
            "aes128-cbc-sha" => {
                let make = || {
                    cbc::CbcCipher::new(&[0x42; 16], vec![0xAB; 20], HashAlg::Sha1, None)
                        .map(RecordCipher::Cbc)
                        .unwrap()
                };
                (make(), make())
            }
            "aes256-cbc-sha" => {
                let make = || {
                    cbc::CbcCipher::new(&[0x42; 32], vec![0xAB; 20], HashAlg::Sha1, None)
                        .map(RecordCipher::Cbc)
                        .unwrap()
                };
                (make(), make())
            }
            "aes128-gcm" => {
                let make = || {
                    aead12::Aead12::new(
                        &[0x42; 16],
                        vec![0xAB; 4],
                        aead12::NonceForm::Explicit,
                        false,
                    )
                    .map(RecordCipher::Aead12)
                    .unwrap()
                };
                (make(), make())
            }
            "aes256-gcm" => {
                let keys = TrafficKeys {
                    key: vec![0x42; 32],
                    iv: vec![0xAB; 12],
                };
                let make = || {
                    aead13::Aead13::new(crate::CipherSuite::TLS_AES_256_GCM_SHA384, &keys)
                        .map(RecordCipher::Aead13)
                        .unwrap()
                };
                (make(), make())
            }
            _ => {
                let keys = TrafficKeys {
                    key: vec![0x42; 32],
                    iv: vec![0xAB; 12],
                };
                let make = || {
                    aead13::Aead13::new(crate::CipherSuite::TLS_CHACHA20_POLY1305_SHA256, &keys)
                        .map(RecordCipher::Aead13)
                        .unwrap()
                };
                (make(), make())
            }
        }
    }

    #[test]
    fn test_roundtrip_sweep_across_suites_and_sizes() {
        let version = 0x0303;
        for suite_key in [
            "aes128-cbc-sha",
            "aes256-cbc-sha",
            "aes128-gcm",
            "aes256-gcm",
            "chacha20",
        ] {
            let (mut seal_side, mut open_side) = cipher_pair(suite_key);
            for size in [0usize, 1, 15, 16, 17, 255, 4096, 16000] {
                if size > seal_side.max_plaintext() {
                    continue;
                }
                let plaintext: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
                let (outer, payload) = seal_side
                    .seal(ContentType::ApplicationData, version, &plaintext)
                    .unwrap();
                let (ct, plain) = open_side.open(outer, version, &payload).unwrap();
                assert_eq!(ct, ContentType::ApplicationData, "{suite_key}/{size}");
                assert_eq!(plain, plaintext, "{suite_key}/{size}");
            }
        }
    }

    #[test]
    fn test_seal_rejects_oversize_plaintext() {
        let (mut cipher, _) = cipher_pair("aes256-gcm");
        let at_cap = vec![0u8; cipher.max_plaintext()];
        assert!(cipher
            .seal(ContentType::ApplicationData, 0x0303, &at_cap)
            .is_ok());
        let over = vec![0u8; cipher.max_plaintext() + 1];
        assert!(cipher
            .seal(ContentType::ApplicationData, 0x0303, &over)
            .is_err());
    }
}
