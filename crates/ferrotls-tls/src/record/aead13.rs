//! TLS 1.3 record protection (RFC 8446 §5).
//!
//! The plaintext is framed as `content || content_type(1) || zeros`, the
//! nonce is the write IV XORed with the left-padded sequence number, and
//! the AAD is the 5-byte record header of the ciphertext. Every protected
//! record travels as ApplicationData.

use super::{ContentType, MAX_CIPHERTEXT_LENGTH, MAX_PLAINTEXT_LENGTH};
use crate::crypt::aead::{create_aead, TlsAead};
use crate::crypt::traffic_keys::TrafficKeys;
use crate::crypt::CipherSuiteParams;
use crate::CipherSuite;
use ferrotls_types::TlsError;
use zeroize::Zeroize;

fn build_nonce(iv: &[u8], seq: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[4..].copy_from_slice(&seq.to_be_bytes());
    for (n, v) in nonce.iter_mut().zip(iv.iter()) {
        *n ^= v;
    }
    nonce
}

fn build_aad(ciphertext_len: u16) -> [u8; 5] {
    let len = ciphertext_len.to_be_bytes();
    [ContentType::ApplicationData as u8, 0x03, 0x03, len[0], len[1]]
}

fn parse_inner_plaintext(inner: &[u8]) -> Result<(ContentType, &[u8]), TlsError> {
    // Strip zero padding from the end; the first non-zero byte is the type.
    for i in (0..inner.len()).rev() {
        if inner[i] != 0 {
            let ct = ContentType::from_u8(inner[i])
                .map_err(|_| TlsError::BadRecord("unknown inner content type".into()))?;
            return Ok((ct, &inner[..i]));
        }
    }
    Err(TlsError::BadRecord("inner plaintext has no content type".into()))
}

/// One direction's TLS 1.3 record protection.
pub struct Aead13 {
    aead: Box<dyn TlsAead>,
    iv: Vec<u8>,
    seq: u64,
    tag_len: usize,
}

impl Drop for Aead13 {
    fn drop(&mut self) {
        self.iv.zeroize();
    }
}

impl Aead13 {
    pub fn new(suite: CipherSuite, keys: &TrafficKeys) -> Result<Self, TlsError> {
        CipherSuiteParams::from_suite(suite)?;
        let chacha = suite == CipherSuite::TLS_CHACHA20_POLY1305_SHA256;
        let aead = create_aead(&keys.key, chacha)?;
        let tag_len = aead.tag_len();
        Ok(Self {
            aead,
            iv: keys.iv.clone(),
            seq: 0,
            tag_len,
        })
    }

    pub fn max_plaintext(&self) -> usize {
        MAX_PLAINTEXT_LENGTH
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq
    }

    fn bump_seq(&mut self) -> Result<(), TlsError> {
        if self.seq == u64::MAX {
            return Err(TlsError::RecordLimit);
        }
        self.seq += 1;
        Ok(())
    }

    /// Protect one fragment. Returns the ciphertext payload; the caller
    /// stamps the opaque ApplicationData header.
    pub fn seal(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        let mut inner = Vec::with_capacity(plaintext.len() + 1);
        inner.extend_from_slice(plaintext);
        inner.push(content_type as u8);

        let ciphertext_len = inner.len() + self.tag_len;
        if ciphertext_len > MAX_CIPHERTEXT_LENGTH {
            return Err(TlsError::BadRecord(
                "ciphertext would exceed maximum length".into(),
            ));
        }

        let nonce = build_nonce(&self.iv, self.seq);
        let aad = build_aad(ciphertext_len as u16);
        let ciphertext = self.aead.seal(&nonce, &aad, &inner)?;
        inner.zeroize();
        self.bump_seq()?;
        Ok(ciphertext)
    }

    /// Unprotect one record payload, recovering the inner content type.
    pub fn open(
        &mut self,
        content_type: ContentType,
        payload: &[u8],
    ) -> Result<(ContentType, Vec<u8>), TlsError> {
        if content_type != ContentType::ApplicationData {
            return Err(TlsError::BadRecord(
                "protected records must be ApplicationData on the wire".into(),
            ));
        }
        if payload.len() < self.tag_len + 1 {
            return Err(TlsError::BadRecord("encrypted record too short".into()));
        }

        let nonce = build_nonce(&self.iv, self.seq);
        let aad = build_aad(payload.len() as u16);
        let inner = self.aead.open(&nonce, &aad, payload)?;
        let (ct, plaintext) = parse_inner_plaintext(&inner)?;
        let out = plaintext.to_vec();
        self.bump_seq()?;
        Ok((ct, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(len: usize) -> TrafficKeys {
        TrafficKeys {
            key: vec![0x42; len],
            iv: vec![0xAB; 12],
        }
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let keys = make_keys(16);
        let suite = CipherSuite::TLS_AES_128_GCM_SHA256;
        let mut enc = Aead13::new(suite, &keys).unwrap();
        let mut dec = Aead13::new(suite, &keys).unwrap();

        let payload = enc.seal(ContentType::Handshake, b"hello tls 1.3").unwrap();
        // inner plaintext(13 + 1) + tag(16)
        assert_eq!(payload.len(), 13 + 1 + 16);

        let (ct, plain) = dec.open(ContentType::ApplicationData, &payload).unwrap();
        assert_eq!(ct, ContentType::Handshake);
        assert_eq!(plain, b"hello tls 1.3");
    }

    #[test]
    fn test_content_type_hiding() {
        let keys = make_keys(32);
        let suite = CipherSuite::TLS_CHACHA20_POLY1305_SHA256;
        let mut enc = Aead13::new(suite, &keys).unwrap();
        let mut dec = Aead13::new(suite, &keys).unwrap();

        for inner_type in [
            ContentType::Alert,
            ContentType::Handshake,
            ContentType::ApplicationData,
        ] {
            let payload = enc.seal(inner_type, b"x").unwrap();
            let (ct, _) = dec.open(ContentType::ApplicationData, &payload).unwrap();
            assert_eq!(ct, inner_type);
        }
    }

    #[test]
    fn test_nonce_construction() {
        let iv: Vec<u8> = (1..=12).collect();
        let nonce0 = build_nonce(&iv, 0);
        assert_eq!(nonce0.as_slice(), iv.as_slice());

        let nonce1 = build_nonce(&iv, 1);
        assert_eq!(nonce1[..11], iv[..11]);
        assert_eq!(nonce1[11], iv[11] ^ 1);

        let seq = 0x0102030405060708u64;
        let nonce = build_nonce(&iv, seq);
        for (i, b) in nonce.iter().enumerate() {
            let pad = if i < 4 { 0 } else { seq.to_be_bytes()[i - 4] };
            assert_eq!(*b, iv[i] ^ pad);
        }
    }

    #[test]
    fn test_aad_layout() {
        assert_eq!(build_aad(100), [0x17, 0x03, 0x03, 0x00, 0x64]);
        assert_eq!(build_aad(16384), [0x17, 0x03, 0x03, 0x40, 0x00]);
    }

    #[test]
    fn test_padding_stripped() {
        let mut inner = b"data".to_vec();
        inner.push(ContentType::Handshake as u8);
        inner.extend_from_slice(&[0u8; 10]);
        let (ct, content) = parse_inner_plaintext(&inner).unwrap();
        assert_eq!(ct, ContentType::Handshake);
        assert_eq!(content, b"data");

        assert!(parse_inner_plaintext(&[0u8; 8]).is_err());
    }

    #[test]
    fn test_sequence_increments_and_desync_fails() {
        let keys = make_keys(16);
        let suite = CipherSuite::TLS_AES_128_GCM_SHA256;
        let mut enc = Aead13::new(suite, &keys).unwrap();
        let mut dec = Aead13::new(suite, &keys).unwrap();

        let p1 = enc.seal(ContentType::ApplicationData, b"one").unwrap();
        let p2 = enc.seal(ContentType::ApplicationData, b"two").unwrap();
        assert_eq!(enc.sequence_number(), 2);

        // Records decrypted out of order fail the tag check
        assert!(dec.open(ContentType::ApplicationData, &p2).is_err());
        // The failed attempt consumed sequence 0; resync a fresh decryptor
        let mut dec = Aead13::new(suite, &keys).unwrap();
        dec.open(ContentType::ApplicationData, &p1).unwrap();
        let (_, plain) = dec.open(ContentType::ApplicationData, &p2).unwrap();
        assert_eq!(plain, b"two");
    }

    #[test]
    fn test_empty_plaintext() {
        let keys = make_keys(16);
        let suite = CipherSuite::TLS_AES_128_GCM_SHA256;
        let mut enc = Aead13::new(suite, &keys).unwrap();
        let mut dec = Aead13::new(suite, &keys).unwrap();
        let payload = enc.seal(ContentType::ApplicationData, b"").unwrap();
        let (ct, plain) = dec.open(ContentType::ApplicationData, &payload).unwrap();
        assert_eq!(ct, ContentType::ApplicationData);
        assert!(plain.is_empty());
    }

    #[test]
    fn test_tampered_record_rejected() {
        let keys = make_keys(16);
        let suite = CipherSuite::TLS_AES_128_GCM_SHA256;
        let mut enc = Aead13::new(suite, &keys).unwrap();
        let mut dec = Aead13::new(suite, &keys).unwrap();
        let mut payload = enc.seal(ContentType::Handshake, b"secret").unwrap();
        payload[2] ^= 0x40;
        assert!(dec.open(ContentType::ApplicationData, &payload).is_err());
    }

    #[test]
    fn test_wrong_outer_type_rejected() {
        let keys = make_keys(16);
        let mut dec = Aead13::new(CipherSuite::TLS_AES_128_GCM_SHA256, &keys).unwrap();
        assert!(dec.open(ContentType::Handshake, &[0u8; 32]).is_err());
    }
}
