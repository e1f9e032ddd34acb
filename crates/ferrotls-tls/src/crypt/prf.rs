//! TLS pseudo-random functions.
//!
//! TLS 1.2 (RFC 5246 §5): `PRF(secret, label, seed) = P_<hash>(secret,
//! label || seed)` with the suite's PRF hash.
//!
//! TLS 1.0/1.1 (RFC 2246 §5): the secret is split into halves and
//! `PRF = P_MD5(S1, label || seed) XOR P_SHA1(S2, label || seed)`.

use super::hash::HashAlg;
use ferrotls_types::TlsError;

/// P_hash expansion: `HMAC(secret, A(1) || seed) || HMAC(secret, A(2) || seed) ...`
/// with `A(0) = seed`, `A(i) = HMAC(secret, A(i-1))`.
fn p_hash(
    hash: HashAlg,
    secret: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, TlsError> {
    let mut result = Vec::with_capacity(output_len);
    let mut a = seed.to_vec();

    while result.len() < output_len {
        a = hash.hmac(secret, &a)?;
        let mut a_seed = Vec::with_capacity(a.len() + seed.len());
        a_seed.extend_from_slice(&a);
        a_seed.extend_from_slice(seed);
        result.extend_from_slice(&hash.hmac(secret, &a_seed)?);
    }

    result.truncate(output_len);
    Ok(result)
}

/// TLS PRF for the given version's hash discipline.
///
/// `hash` must be the suite PRF hash for TLS 1.2, or [`HashAlg::Md5Sha1`]
/// to select the legacy split-secret construction.
pub fn prf(
    hash: HashAlg,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, TlsError> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label.as_bytes());
    label_seed.extend_from_slice(seed);

    match hash {
        HashAlg::Md5Sha1 => {
            // S1 is the first half of the secret, S2 the second; both take
            // the middle byte when the length is odd.
            let half = secret.len().div_ceil(2);
            let s1 = &secret[..half];
            let s2 = &secret[secret.len() - half..];
            let md5_part = p_hash(HashAlg::Md5, s1, &label_seed, output_len)?;
            let sha1_part = p_hash(HashAlg::Sha1, s2, &label_seed, output_len)?;
            Ok(md5_part
                .iter()
                .zip(sha1_part.iter())
                .map(|(a, b)| a ^ b)
                .collect())
        }
        _ => p_hash(hash, secret, &label_seed, output_len),
    }
}
