//! TLS 1.2 AEAD record protection.
//!
//! AES-GCM (RFC 5288): nonce = `fixed_iv(4) || explicit_nonce(8)`, with the
//! explicit part carried on the wire ahead of the ciphertext.
//! ChaCha20-Poly1305 (RFC 7905): nonce = `iv(12) XOR pad_left(seq)` with
//! nothing explicit on the wire.
//! Both authenticate the 13-byte AAD
//! `seq(8) || type(1) || version(2) || plaintext_length(2)`.

use super::{ContentType, MAX_CIPHERTEXT_LENGTH};
use crate::crypt::aead::{create_aead, TlsAead};
use ferrotls_types::TlsError;
use zeroize::Zeroize;

const EXPLICIT_NONCE_LEN: usize = 8;

/// Nonce layout negotiated by the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceForm {
    /// 4-byte salt from the key block plus an 8-byte explicit wire nonce.
    Explicit,
    /// 12-byte implicit IV XORed with the sequence number.
    Xor,
}

fn build_aad(seq: u64, content_type: ContentType, version: u16, plaintext_len: u16) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[..8].copy_from_slice(&seq.to_be_bytes());
    aad[8] = content_type as u8;
    aad[9..11].copy_from_slice(&version.to_be_bytes());
    aad[11..13].copy_from_slice(&plaintext_len.to_be_bytes());
    aad
}

/// One direction's TLS 1.2 AEAD protection.
pub struct Aead12 {
    aead: Box<dyn TlsAead>,
    iv: Vec<u8>,
    form: NonceForm,
    seq: u64,
    tag_len: usize,
}

impl Drop for Aead12 {
    fn drop(&mut self) {
        self.iv.zeroize();
    }
}

impl Aead12 {
    /// `iv` is the key-block IV material: 4 bytes for the explicit form,
    /// 12 for the XOR form. `chacha` selects ChaCha20-Poly1305.
    pub fn new(
        key: &[u8],
        iv: Vec<u8>,
        form: NonceForm,
        chacha: bool,
    ) -> Result<Self, TlsError> {
        let expected_iv = match form {
            NonceForm::Explicit => 4,
            NonceForm::Xor => 12,
        };
        if iv.len() != expected_iv {
            return Err(TlsError::KeyInit);
        }
        let aead = create_aead(key, chacha)?;
        let tag_len = aead.tag_len();
        Ok(Self {
            aead,
            iv,
            form,
            seq: 0,
            tag_len,
        })
    }

    pub fn max_plaintext(&self) -> usize {
        let overhead = match self.form {
            NonceForm::Explicit => EXPLICIT_NONCE_LEN + self.tag_len,
            NonceForm::Xor => self.tag_len,
        };
        super::MAX_PLAINTEXT_LENGTH.min(MAX_CIPHERTEXT_LENGTH - overhead)
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

    fn nonce_for(&self, explicit: &[u8; EXPLICIT_NONCE_LEN]) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        match self.form {
            NonceForm::Explicit => {
                nonce[..4].copy_from_slice(&self.iv);
                nonce[4..].copy_from_slice(explicit);
            }
            NonceForm::Xor => {
                nonce[4..].copy_from_slice(explicit);
                for (n, v) in nonce.iter_mut().zip(self.iv.iter()) {
                    *n ^= v;
                }
            }
        }
        nonce
    }

    /// Protect one fragment; the sequence number doubles as the explicit
    /// nonce where one is carried.
    pub fn seal(
        &mut self,
        content_type: ContentType,
        version: u16,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        let explicit = self.seq.to_be_bytes();
        let nonce = self.nonce_for(&explicit);
        let aad = build_aad(self.seq, content_type, version, plaintext.len() as u16);
        let ciphertext = self.aead.seal(&nonce, &aad, plaintext)?;

        let mut payload = match self.form {
            NonceForm::Explicit => {
                let mut p = Vec::with_capacity(EXPLICIT_NONCE_LEN + ciphertext.len());
                p.extend_from_slice(&explicit);
                p
            }
            NonceForm::Xor => Vec::with_capacity(ciphertext.len()),
        };
        payload.extend_from_slice(&ciphertext);
        self.bump_seq()?;
        Ok(payload)
    }

    /// Unprotect one record payload.
    pub fn open(
        &mut self,
        content_type: ContentType,
        version: u16,
        payload: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        let (explicit, ciphertext): ([u8; EXPLICIT_NONCE_LEN], &[u8]) = match self.form {
            NonceForm::Explicit => {
                if payload.len() < EXPLICIT_NONCE_LEN + self.tag_len {
                    return Err(TlsError::BadRecord("encrypted record too short".into()));
                }
                let mut e = [0u8; EXPLICIT_NONCE_LEN];
                e.copy_from_slice(&payload[..EXPLICIT_NONCE_LEN]);
                (e, &payload[EXPLICIT_NONCE_LEN..])
            }
            NonceForm::Xor => {
                if payload.len() < self.tag_len + 1 {
                    return Err(TlsError::BadRecord("encrypted record too short".into()));
                }
                (self.seq.to_be_bytes(), payload)
            }
        };

        let plaintext_len = ciphertext.len() - self.tag_len;
        let nonce = self.nonce_for(&explicit);
        let aad = build_aad(self.seq, content_type, version, plaintext_len as u16);
        let plaintext = self.aead.open(&nonce, &aad, ciphertext)?;
        self.bump_seq()?;
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TLS12: u16 = 0x0303;

    fn gcm_pair(key_len: usize) -> (Aead12, Aead12) {
        let key = vec![0x42u8; key_len];
        let iv = vec![0xABu8; 4];
        (
            Aead12::new(&key, iv.clone(), NonceForm::Explicit, false).unwrap(),
            Aead12::new(&key, iv, NonceForm::Explicit, false).unwrap(),
        )
    }

    fn chacha_pair() -> (Aead12, Aead12) {
        let key = vec![0x42u8; 32];
        let iv = vec![0xCDu8; 12];
        (
            Aead12::new(&key, iv.clone(), NonceForm::Xor, true).unwrap(),
            Aead12::new(&key, iv, NonceForm::Xor, true).unwrap(),
        )
    }

    #[test]
    fn test_gcm128_roundtrip() {
        let (mut enc, mut dec) = gcm_pair(16);
        let payload = enc
            .seal(ContentType::ApplicationData, TLS12, b"hello tls 1.2 gcm")
            .unwrap();
        // explicit nonce(8) + plaintext(17) + tag(16)
        assert_eq!(payload.len(), 8 + 17 + 16);
        let plain = dec
            .open(ContentType::ApplicationData, TLS12, &payload)
            .unwrap();
        assert_eq!(plain, b"hello tls 1.2 gcm");
    }

    #[test]
    fn test_gcm256_roundtrip() {
        let (mut enc, mut dec) = gcm_pair(32);
        let payload = enc
            .seal(ContentType::Handshake, TLS12, b"finished")
            .unwrap();
        let plain = dec.open(ContentType::Handshake, TLS12, &payload).unwrap();
        assert_eq!(plain, b"finished");
    }

    #[test]
    fn test_chacha_roundtrip_no_explicit_nonce() {
        let (mut enc, mut dec) = chacha_pair();
        let payload = enc
            .seal(ContentType::ApplicationData, TLS12, b"chacha record")
            .unwrap();
        // plaintext(13) + tag(16), nothing explicit
        assert_eq!(payload.len(), 13 + 16);
        let plain = dec
            .open(ContentType::ApplicationData, TLS12, &payload)
            .unwrap();
        assert_eq!(plain, b"chacha record");
    }

    #[test]
    fn test_sequence_as_explicit_nonce() {
        let (mut enc, _) = gcm_pair(16);
        let p0 = enc.seal(ContentType::ApplicationData, TLS12, b"a").unwrap();
        let p1 = enc.seal(ContentType::ApplicationData, TLS12, b"b").unwrap();
        assert_eq!(&p0[..8], &[0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&p1[..8], &[0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(enc.sequence_number(), 2);
    }

    #[test]
    fn test_aad_layout() {
        let aad = build_aad(42, ContentType::ApplicationData, TLS12, 100);
        assert_eq!(&aad[..8], &[0, 0, 0, 0, 0, 0, 0, 42]);
        assert_eq!(aad[8], 23);
        assert_eq!(&aad[9..11], &[0x03, 0x03]);
        assert_eq!(&aad[11..13], &[0x00, 0x64]);
    }

    #[test]
    fn test_type_or_version_mismatch_fails() {
        let (mut enc, mut dec) = gcm_pair(16);
        let payload = enc
            .seal(ContentType::ApplicationData, TLS12, b"data")
            .unwrap();
        // The AAD binds the header fields
        assert!(dec.open(ContentType::Handshake, TLS12, &payload).is_err());
        let (mut enc, mut dec) = gcm_pair(16);
        let payload = enc
            .seal(ContentType::ApplicationData, TLS12, b"data")
            .unwrap();
        assert!(dec
            .open(ContentType::ApplicationData, 0x0302, &payload)
            .is_err());
    }

    #[test]
    fn test_tampered_record_rejected() {
        let (mut enc, mut dec) = chacha_pair();
        let mut payload = enc
            .seal(ContentType::Handshake, TLS12, b"secret")
            .unwrap();
        payload[3] ^= 0x01;
        assert!(dec.open(ContentType::Handshake, TLS12, &payload).is_err());
    }

    #[test]
    fn test_iv_length_validation() {
        assert!(Aead12::new(&[0u8; 16], vec![0; 12], NonceForm::Explicit, false).is_err());
        assert!(Aead12::new(&[0u8; 32], vec![0; 4], NonceForm::Xor, true).is_err());
    }

    #[test]
    fn test_multi_record_stream() {
        let (mut enc, mut dec) = gcm_pair(16);
        for i in 0..5u32 {
            let msg = format!("record {i}");
            let payload = enc
                .seal(ContentType::ApplicationData, TLS12, msg.as_bytes())
                .unwrap();
            let plain = dec
                .open(ContentType::ApplicationData, TLS12, &payload)
                .unwrap();
            assert_eq!(plain, msg.as_bytes());
        }
        assert_eq!(enc.sequence_number(), 5);
        assert_eq!(dec.sequence_number(), 5);
    }
}
