//! HKDF primitives for the TLS 1.3 key schedule (RFC 5869, RFC 8446 §7.1).

use super::hash::HashAlg;
use ferrotls_types::TlsError;
use zeroize::Zeroize;

/// HKDF-Extract(salt, IKM) -> PRK.
///
/// An empty salt stands in for `hash_len` zero bytes.
pub fn hkdf_extract(hash: HashAlg, salt: &[u8], ikm: &[u8]) -> Result<Vec<u8>, TlsError> {
    if salt.is_empty() {
        let zero_salt = vec![0u8; hash.output_len()];
        hash.hmac(&zero_salt, ikm)
    } else {
        hash.hmac(salt, ikm)
    }
}

/// HKDF-Expand(PRK, info, length) -> OKM.
pub fn hkdf_expand(
    hash: HashAlg,
    prk: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Vec<u8>, TlsError> {
    let hash_len = hash.output_len();
    let n = length.div_ceil(hash_len);
    if n > 255 {
        return Err(TlsError::Internal("HKDF-Expand output too large".into()));
    }

    let mut okm = Vec::with_capacity(n * hash_len);
    let mut block: Vec<u8> = Vec::new();
    for i in 1..=n {
        let mut input = Vec::with_capacity(block.len() + info.len() + 1);
        input.extend_from_slice(&block);
        input.extend_from_slice(info);
        input.push(i as u8);
        let next = hash.hmac(prk, &input)?;
        input.zeroize();
        block.zeroize();
        block = next;
        okm.extend_from_slice(&block);
    }
    block.zeroize();
    okm.truncate(length);
    Ok(okm)
}

/// Encode the HkdfLabel structure (RFC 8446 §7.1): the label carries the
/// `"tls13 "` prefix and the context is length-prefixed.
fn encode_hkdf_label(length: u16, label: &[u8], context: &[u8]) -> Vec<u8> {
    let full_label_len = 6 + label.len();
    let mut buf = Vec::with_capacity(4 + full_label_len + context.len());
    buf.extend_from_slice(&length.to_be_bytes());
    buf.push(full_label_len as u8);
    buf.extend_from_slice(b"tls13 ");
    buf.extend_from_slice(label);
    buf.push(context.len() as u8);
    buf.extend_from_slice(context);
    buf
}

/// HKDF-Expand-Label(Secret, Label, Context, Length).
pub fn hkdf_expand_label(
    hash: HashAlg,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    length: usize,
) -> Result<Vec<u8>, TlsError> {
    let info = encode_hkdf_label(length as u16, label, context);
    hkdf_expand(hash, secret, &info, length)
}

/// Derive-Secret(Secret, Label, TranscriptHash).
pub fn derive_secret(
    hash: HashAlg,
    secret: &[u8],
    label: &[u8],
    transcript_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    hkdf_expand_label(hash, secret, label, transcript_hash, hash.output_len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    // RFC 5869 Test Case 1 (SHA-256)
    #[test]
    fn test_hkdf_extract_sha256() {
        let ikm = hex("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b");
        let salt = hex("000102030405060708090a0b0c");
        let prk = hkdf_extract(HashAlg::Sha256, &salt, &ikm).unwrap();
        assert_eq!(
            to_hex(&prk),
            "077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5"
        );
    }

    #[test]
    fn test_hkdf_expand_sha256() {
        let prk = hex("077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5");
        let info = hex("f0f1f2f3f4f5f6f7f8f9");
        let okm = hkdf_expand(HashAlg::Sha256, &prk, &info, 42).unwrap();
        assert_eq!(
            to_hex(&okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    // RFC 5869 Test Case 3 (zero-length salt)
    #[test]
    fn test_hkdf_extract_empty_salt() {
        let ikm = hex("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b");
        let prk = hkdf_extract(HashAlg::Sha256, &[], &ikm).unwrap();
        assert_eq!(
            to_hex(&prk),
            "19ef24a32c717b167f33a91d6f648bdf96596776afdb6377ac434c1c293ccb04"
        );
    }

    #[test]
    fn test_hkdf_sha384_lengths() {
        let prk = hkdf_extract(HashAlg::Sha384, b"salt", b"ikm").unwrap();
        assert_eq!(prk.len(), 48);
        let okm = hkdf_expand(HashAlg::Sha384, &prk, b"info", 100).unwrap();
        assert_eq!(okm.len(), 100);
    }

    #[test]
    fn test_encode_hkdf_label() {
        let label = encode_hkdf_label(16, b"key", b"");
        assert_eq!(label[0..2], [0x00, 0x10]);
        assert_eq!(label[2], 9); // "tls13 " + "key"
        assert_eq!(&label[3..12], b"tls13 key");
        assert_eq!(label[12], 0);
        assert_eq!(label.len(), 13);
    }

    #[test]
    fn test_expand_label_context_sensitivity() {
        let secret = [0xAA; 32];
        let a = hkdf_expand_label(HashAlg::Sha256, &secret, b"key", b"ctx-a", 16).unwrap();
        let b = hkdf_expand_label(HashAlg::Sha256, &secret, b"key", b"ctx-b", 16).unwrap();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_expand_prefix_consistency() {
        let prk = [0x42; 32];
        let short = hkdf_expand(HashAlg::Sha256, &prk, b"info", 32).unwrap();
        let long = hkdf_expand(HashAlg::Sha256, &prk, b"info", 64).unwrap();
        assert_eq!(&long[..32], short.as_slice());
    }

    #[test]
    fn test_expand_too_large() {
        let prk = [0x42; 32];
        assert!(hkdf_expand(HashAlg::Sha256, &prk, b"", 255 * 32 + 1).is_err());
    }

    #[test]
    fn test_derive_secret_length() {
        let secret = [0xBB; 48];
        let transcript = [0xCC; 48];
        let out = derive_secret(HashAlg::Sha384, &secret, b"c hs traffic", &transcript).unwrap();
        assert_eq!(out.len(), 48);
    }
}
