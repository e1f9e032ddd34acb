//! Hash and HMAC dispatch over the RustCrypto digest crates.

use ferrotls_types::TlsError;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384};

/// Hash algorithm selector for transcript, PRF, and HKDF work.
///
/// `Md5Sha1` is the pre-TLS-1.2 concatenated transcript hash (16 + 20
/// bytes); it is never used for HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlg {
    Md5Sha1,
    Md5,
    Sha1,
    Sha256,
    Sha384,
}

macro_rules! hmac_with {
    ($digest:ty, $key:expr, $data:expr) => {{
        let mut m = <Hmac<$digest> as Mac>::new_from_slice($key)
            .map_err(|_| TlsError::KeyInit)?;
        m.update($data);
        Ok(m.finalize().into_bytes().to_vec())
    }};
}

impl HashAlg {
    /// Digest output size in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlg::Md5Sha1 => 36,
            HashAlg::Md5 => 16,
            HashAlg::Sha1 => 20,
            HashAlg::Sha256 => 32,
            HashAlg::Sha384 => 48,
        }
    }

    /// One-shot digest.
    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlg::Md5Sha1 => {
                let mut out = Vec::with_capacity(36);
                out.extend_from_slice(&Md5::digest(data));
                out.extend_from_slice(&Sha1::digest(data));
                out
            }
            HashAlg::Md5 => Md5::digest(data).to_vec(),
            HashAlg::Sha1 => Sha1::digest(data).to_vec(),
            HashAlg::Sha256 => Sha256::digest(data).to_vec(),
            HashAlg::Sha384 => Sha384::digest(data).to_vec(),
        }
    }

    /// One-shot HMAC keyed with `key` over `data`.
    pub fn hmac(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, TlsError> {
        match self {
            HashAlg::Md5Sha1 => Err(TlsError::Internal(
                "HMAC is undefined for the concatenated MD5/SHA1 hash".into(),
            )),
            HashAlg::Md5 => hmac_with!(Md5, key, data),
            HashAlg::Sha1 => hmac_with!(Sha1, key, data),
            HashAlg::Sha256 => hmac_with!(Sha256, key, data),
            HashAlg::Sha384 => hmac_with!(Sha384, key, data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_output_lengths() {
        assert_eq!(HashAlg::Md5.output_len(), 16);
        assert_eq!(HashAlg::Sha1.output_len(), 20);
        assert_eq!(HashAlg::Sha256.output_len(), 32);
        assert_eq!(HashAlg::Sha384.output_len(), 48);
        assert_eq!(HashAlg::Md5Sha1.output_len(), 36);
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            to_hex(&HashAlg::Sha256.hash(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            to_hex(&HashAlg::Sha256.hash(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_md5_sha1_concatenation() {
        let combined = HashAlg::Md5Sha1.hash(b"abc");
        assert_eq!(combined.len(), 36);
        assert_eq!(&combined[..16], HashAlg::Md5.hash(b"abc").as_slice());
        assert_eq!(&combined[16..], HashAlg::Sha1.hash(b"abc").as_slice());
    }

    #[test]
    fn test_hmac_sha256_rfc4231_case1() {
        let key = [0x0b; 20];
        let out = HashAlg::Sha256.hmac(&key, b"Hi There").unwrap();
        assert_eq!(
            to_hex(&out),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
        );
    }

    #[test]
    fn test_hmac_sha384_rfc4231_case1() {
        let key = [0x0b; 20];
        let out = HashAlg::Sha384.hmac(&key, b"Hi There").unwrap();
        assert_eq!(
            to_hex(&out),
            "afd03944d84895626b0825f4ab46907f15f9dadbe4101ec682aa034c7cebc59c\
             faea9ea9076ede7f4af152e8b2fa9cb6"
        );
    }

    #[test]
    fn test_hmac_deterministic_and_key_sensitive() {
        let a = HashAlg::Sha256.hmac(b"key1", b"payload").unwrap();
        let b = HashAlg::Sha256.hmac(b"key1", b"payload").unwrap();
        let c = HashAlg::Sha256.hmac(b"key2", b"payload").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hmac_md5sha1_rejected() {
        assert!(HashAlg::Md5Sha1.hmac(b"k", b"d").is_err());
    }
}
