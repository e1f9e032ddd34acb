//! CBC MAC-then-encrypt record protection for TLS 1.0-1.2 (RFC 2246 §6.2.3,
//! RFC 5246 §6.2.3.2).
//!
//! Fragment layout: `[explicit_IV(16)] || encrypt(plaintext || MAC || padding)`.
//! MAC = HMAC(mac_key, `seq(8) || type(1) || version(2) || length(2) || plaintext`).
//! TLS 1.1+ prepends a fresh random IV per record; TLS 1.0 chains the last
//! ciphertext block of the previous record.
//!
//! Decrypt verification is constant time: the padding bytes and the MAC are
//! always checked, over a fixed-position slice when the claimed padding is
//! bogus, and both verdicts merge into a single failure branch.

use super::{ContentType, MAX_CIPHERTEXT_LENGTH, MAX_PLAINTEXT_LENGTH};
use crate::crypt::hash::HashAlg;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};
use ferrotls_types::TlsError;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

const BLOCK: usize = 16;

enum AesKey {
    Aes128(Box<Aes128>),
    Aes256(Box<Aes256>),
}

impl AesKey {
    fn new(key: &[u8]) -> Result<Self, TlsError> {
        match key.len() {
            16 => Ok(AesKey::Aes128(Box::new(
                Aes128::new_from_slice(key).map_err(|_| TlsError::KeyInit)?,
            ))),
            32 => Ok(AesKey::Aes256(Box::new(
                Aes256::new_from_slice(key).map_err(|_| TlsError::KeyInit)?,
            ))),
            _ => Err(TlsError::KeyInit),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesKey::Aes128(c) => c.encrypt_block(block),
            AesKey::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesKey::Aes128(c) => c.decrypt_block(block),
            AesKey::Aes256(c) => c.decrypt_block(block),
        }
    }
}

/// CBC-encrypt `data` in place; `data` must be block-aligned.
fn cbc_encrypt(key: &AesKey, iv: &[u8; BLOCK], data: &mut [u8]) {
    let mut prev = *iv;
    for chunk in data.chunks_mut(BLOCK) {
        for (b, p) in chunk.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        key.encrypt_block(chunk);
        prev.copy_from_slice(chunk);
    }
}

/// CBC-decrypt `data` in place without removing padding.
fn cbc_decrypt(key: &AesKey, iv: &[u8; BLOCK], data: &mut [u8]) {
    let mut prev = *iv;
    for chunk in data.chunks_mut(BLOCK) {
        let mut saved = [0u8; BLOCK];
        saved.copy_from_slice(chunk);
        key.decrypt_block(chunk);
        for (b, p) in chunk.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        prev = saved;
    }
}

/// TLS padding: `padding_length + 1` bytes, each equal to `padding_length`.
fn padding_for(data_len: usize) -> Vec<u8> {
    let padding_length = (BLOCK - ((data_len + 1) % BLOCK)) % BLOCK;
    vec![padding_length as u8; padding_length + 1]
}

/// One direction's CBC record protection.
pub struct CbcCipher {
    key: AesKey,
    mac_hash: HashAlg,
    mac_key: Vec<u8>,
    /// TLS 1.0 chained-IV state; `None` selects an explicit random IV.
    chain_iv: Option<[u8; BLOCK]>,
    seq: u64,
}

impl Drop for CbcCipher {
    fn drop(&mut self) {
        self.mac_key.zeroize();
        if let Some(iv) = self.chain_iv.as_mut() {
            iv.zeroize();
        }
    }
}

impl CbcCipher {
    /// `chain_iv` is the key-block IV for TLS 1.0; pass `None` for the
    /// explicit-IV record format of TLS 1.1 and later.
    pub fn new(
        key: &[u8],
        mac_key: Vec<u8>,
        mac_hash: HashAlg,
        chain_iv: Option<Vec<u8>>,
    ) -> Result<Self, TlsError> {
        let chain_iv = match chain_iv {
            Some(iv) => {
                if iv.len() != BLOCK {
                    return Err(TlsError::KeyInit);
                }
                let mut arr = [0u8; BLOCK];
                arr.copy_from_slice(&iv);
                Some(arr)
            }
            None => None,
        };
        Ok(Self {
            key: AesKey::new(key)?,
            mac_hash,
            mac_key,
            chain_iv,
            seq: 0,
        })
    }

    pub fn mac_len(&self) -> usize {
        self.mac_hash.output_len()
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq
    }

    /// The largest plaintext that still leaves room for MAC, padding, and
    /// the explicit IV inside an aligned maximum-size fragment.
    pub fn max_plaintext(&self) -> usize {
        MAX_PLAINTEXT_LENGTH - self.mac_len() - BLOCK - 1
    }

    /// Predicted on-the-wire payload length for a plaintext of `len` bytes.
    pub fn sealed_len(&self, len: usize) -> usize {
        let padded = (len + self.mac_len() + 1).div_ceil(BLOCK) * BLOCK;
        match self.chain_iv {
            Some(_) => padded,
            None => BLOCK + padded,
        }
    }

    fn bump_seq(&mut self) -> Result<(), TlsError> {
        if self.seq == u64::MAX {
            return Err(TlsError::RecordLimit);
        }
        self.seq += 1;
        Ok(())
    }

    fn compute_mac(
        &self,
        content_type: ContentType,
        version: u16,
        fragment: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        let mut input = Vec::with_capacity(13 + fragment.len());
        input.extend_from_slice(&self.seq.to_be_bytes());
        input.push(content_type as u8);
        input.extend_from_slice(&version.to_be_bytes());
        input.extend_from_slice(&(fragment.len() as u16).to_be_bytes());
        input.extend_from_slice(fragment);
        self.mac_hash.hmac(&self.mac_key, &input)
    }

    /// Protect one fragment.
    pub fn seal(
        &mut self,
        content_type: ContentType,
        version: u16,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        let mac = self.compute_mac(content_type, version, plaintext)?;

        let mut data = Vec::with_capacity(plaintext.len() + mac.len() + BLOCK);
        data.extend_from_slice(plaintext);
        data.extend_from_slice(&mac);
        data.extend_from_slice(&padding_for(plaintext.len() + mac.len()));

        let iv = match self.chain_iv {
            Some(iv) => iv,
            None => {
                let mut iv = [0u8; BLOCK];
                getrandom::getrandom(&mut iv).map_err(|_| TlsError::Entropy)?;
                iv
            }
        };

        cbc_encrypt(&self.key, &iv, &mut data);

        // TLS 1.0 chains the next record off our last ciphertext block
        if let Some(chain) = self.chain_iv.as_mut() {
            chain.copy_from_slice(&data[data.len() - BLOCK..]);
        }

        let payload = match self.chain_iv {
            Some(_) => data,
            None => {
                let mut p = Vec::with_capacity(BLOCK + data.len());
                p.extend_from_slice(&iv);
                p.extend_from_slice(&data);
                p
            }
        };
        self.bump_seq()?;
        Ok(payload)
    }

    /// Unprotect one record payload with constant-time verification.
    pub fn open(
        &mut self,
        content_type: ContentType,
        version: u16,
        payload: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        if payload.len() > MAX_CIPHERTEXT_LENGTH {
            return Err(TlsError::BadRecord("record overflow".into()));
        }
        let min_encrypted = (self.mac_len() + 1).div_ceil(BLOCK) * BLOCK;
        let iv_overhead = if self.chain_iv.is_some() { 0 } else { BLOCK };
        if payload.len() < iv_overhead + min_encrypted {
            return Err(TlsError::BadRecord("CBC record too short".into()));
        }

        let (iv, encrypted) = match self.chain_iv {
            Some(iv) => (iv, payload),
            None => {
                let mut iv = [0u8; BLOCK];
                iv.copy_from_slice(&payload[..BLOCK]);
                (iv, &payload[BLOCK..])
            }
        };
        if encrypted.is_empty() || encrypted.len() % BLOCK != 0 {
            return Err(TlsError::BadRecord("CBC ciphertext not block-aligned".into()));
        }

        // Chain before decrypting: the last ciphertext block received is the
        // next record's IV under TLS 1.0
        if let Some(chain) = self.chain_iv.as_mut() {
            chain.copy_from_slice(&encrypted[encrypted.len() - BLOCK..]);
        }

        let mut decrypted = encrypted.to_vec();
        cbc_decrypt(&self.key, &iv, &mut decrypted);

        let mac_len = self.mac_len();
        let padding_length = decrypted[decrypted.len() - 1] as usize;
        let total_overhead = padding_length + 1 + mac_len;
        let good_length: u8 = u8::from(total_overhead <= decrypted.len());

        // Check every claimed padding byte; on a bogus length this walks a
        // fixed-position tail so the work done does not depend on secrets
        let pad_start = decrypted.len().saturating_sub(padding_length + 1);
        let mut pad_ok = good_length;
        for &b in &decrypted[pad_start..] {
            pad_ok &= b.ct_eq(&(padding_length as u8)).unwrap_u8();
        }

        let content_len = if good_length == 1 {
            decrypted.len() - total_overhead
        } else {
            0
        };

        // The MAC is computed whether or not the padding verified
        let expected_mac = self.compute_mac(content_type, version, &decrypted[..content_len])?;
        let mac_slice = if good_length == 1 {
            &decrypted[content_len..content_len + mac_len]
        } else {
            &decrypted[..mac_len]
        };
        let mac_ok = mac_slice.ct_eq(&expected_mac).unwrap_u8();

        if pad_ok & mac_ok != 1 {
            return Err(TlsError::BadRecordMac);
        }

        let plaintext = decrypted[..content_len].to_vec();
        decrypted.zeroize();
        self.bump_seq()?;
        Ok(plaintext)
    }
}
