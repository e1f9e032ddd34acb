//! AEAD dispatch over the RustCrypto cipher crates.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce};
use chacha20poly1305::ChaCha20Poly1305;
use ferrotls_types::TlsError;

/// Record-protection AEAD: seal appends the tag, open verifies it.
pub trait TlsAead: Send {
    fn seal(&self, nonce: &[u8; 12], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, TlsError>;
    fn open(&self, nonce: &[u8; 12], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, TlsError>;
    fn tag_len(&self) -> usize;
}

macro_rules! impl_tls_aead {
    ($name:ident, $cipher:ty) => {
        struct $name($cipher);

        impl TlsAead for $name {
            fn seal(
                &self,
                nonce: &[u8; 12],
                aad: &[u8],
                plaintext: &[u8],
            ) -> Result<Vec<u8>, TlsError> {
                self.0
                    .encrypt(
                        Nonce::from_slice(nonce),
                        Payload {
                            msg: plaintext,
                            aad,
                        },
                    )
                    .map_err(|_| TlsError::Encrypt)
            }

            fn open(
                &self,
                nonce: &[u8; 12],
                aad: &[u8],
                ciphertext: &[u8],
            ) -> Result<Vec<u8>, TlsError> {
                self.0
                    .decrypt(
                        Nonce::from_slice(nonce),
                        Payload {
                            msg: ciphertext,
                            aad,
                        },
                    )
                    .map_err(|_| TlsError::BadRecordMac)
            }

            fn tag_len(&self) -> usize {
                16
            }
        }
    };
}

impl_tls_aead!(Aes128GcmAead, Aes128Gcm);
impl_tls_aead!(Aes256GcmAead, Aes256Gcm);
impl_tls_aead!(ChaChaAead, ChaCha20Poly1305);

/// Instantiate the AEAD matching the key length and cipher family.
///
/// `chacha` selects ChaCha20-Poly1305 (32-byte key); otherwise the key
/// length picks AES-128-GCM or AES-256-GCM.
pub fn create_aead(key: &[u8], chacha: bool) -> Result<Box<dyn TlsAead>, TlsError> {
    if chacha {
        let cipher =
            ChaCha20Poly1305::new_from_slice(key).map_err(|_| TlsError::KeyInit)?;
        return Ok(Box::new(ChaChaAead(cipher)));
    }
    match key.len() {
        16 => {
            let cipher = Aes128Gcm::new_from_slice(key).map_err(|_| TlsError::KeyInit)?;
            Ok(Box::new(Aes128GcmAead(cipher)))
        }
        32 => {
            let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| TlsError::KeyInit)?;
            Ok(Box::new(Aes256GcmAead(cipher)))
        }
        _ => Err(TlsError::KeyInit),
    }
}
