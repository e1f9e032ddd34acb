//! Handshake signatures: TLS 1.3 CertificateVerify and TLS 1.2
//! ServerKeyExchange, over ECDSA P-256.

use crate::crypt::SignatureScheme;
use ferrotls_types::TlsError;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{DerSignature, SigningKey, VerifyingKey};

/// The secp256r1 OID (1.2.840.10045.3.1.7) in DER.
const SECP256R1_OID: &[u8] = &[0x06, 0x08, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07];

/// Pick a signature scheme both sides support; our key dictates the
/// candidates and the peer's list filters them.
pub fn select_signature_scheme(
    peer_schemes: &[SignatureScheme],
) -> Result<SignatureScheme, TlsError> {
    let candidates = [SignatureScheme::ECDSA_SECP256R1_SHA256];
    for candidate in candidates {
        if peer_schemes.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(TlsError::HandshakeFailed("no common signature scheme".into()))
}

/// TLS 1.3 CertificateVerify signed content (RFC 8446 §4.4.3):
/// 64 spaces, the context string, a zero separator, the transcript hash.
pub fn build_verify_content(transcript_hash: &[u8], from_server: bool) -> Vec<u8> {
    let context: &[u8] = if from_server {
        b"TLS 1.3, server CertificateVerify"
    } else {
        b"TLS 1.3, client CertificateVerify"
    };
    let mut content = Vec::with_capacity(64 + context.len() + 1 + transcript_hash.len());
    content.extend_from_slice(&[0x20u8; 64]);
    content.extend_from_slice(context);
    content.push(0);
    content.extend_from_slice(transcript_hash);
    content
}

/// Sign TLS 1.3 CertificateVerify content. Returns a DER-encoded ECDSA
/// signature.
pub fn sign_certificate_verify(
    private_key: &[u8],
    transcript_hash: &[u8],
    from_server: bool,
) -> Result<Vec<u8>, TlsError> {
    let content = build_verify_content(transcript_hash, from_server);
    sign_content(private_key, &content)
}

/// Verify a TLS 1.3 CertificateVerify signature against the peer's
/// certificate public key.
pub fn verify_certificate_verify(
    peer_public_key: &[u8],
    signature: &[u8],
    transcript_hash: &[u8],
    from_server: bool,
) -> Result<(), TlsError> {
    let content = build_verify_content(transcript_hash, from_server);
    verify_content(peer_public_key, signature, &content)
}

/// TLS 1.2 ServerKeyExchange signed content (RFC 4492 §5.4):
/// `client_random || server_random || params`.
pub fn build_ske_content(
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    params: &[u8],
) -> Vec<u8> {
    let mut content = Vec::with_capacity(64 + params.len());
    content.extend_from_slice(client_random);
    content.extend_from_slice(server_random);
    content.extend_from_slice(params);
    content
}

/// Sign arbitrary handshake content with our ECDSA-P256 key (the signer
/// hashes with SHA-256 internally, matching ecdsa_secp256r1_sha256).
pub fn sign_content(private_key: &[u8], content: &[u8]) -> Result<Vec<u8>, TlsError> {
    let key_bytes: [u8; 32] = private_key
        .try_into()
        .map_err(|_| TlsError::DecodePrivateKey)?;
    let signing_key =
        SigningKey::from_bytes(&key_bytes.into()).map_err(|_| TlsError::DecodePrivateKey)?;
    let signature: DerSignature = signing_key.sign(content);
    Ok(signature.as_bytes().to_vec())
}

/// Verify a DER-encoded ECDSA-P256 signature over `content`.
pub fn verify_content(
    peer_public_key: &[u8],
    signature: &[u8],
    content: &[u8],
) -> Result<(), TlsError> {
    let verifying_key = VerifyingKey::from_sec1_bytes(peer_public_key)
        .map_err(|_| TlsError::DecodeCertificate)?;
    let signature =
        DerSignature::try_from(signature).map_err(|_| TlsError::VerifySignature)?;
    verifying_key
        .verify(content, &signature)
        .map_err(|_| TlsError::VerifySignature)
}

/// Derive the uncompressed SEC1 public point from a 32-byte private scalar.
pub fn public_key_from_private(private_key: &[u8]) -> Result<Vec<u8>, TlsError> {
    let key_bytes: [u8; 32] = private_key
        .try_into()
        .map_err(|_| TlsError::DecodePrivateKey)?;
    let signing_key =
        SigningKey::from_bytes(&key_bytes.into()).map_err(|_| TlsError::DecodePrivateKey)?;
    Ok(signing_key
        .verifying_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec())
}

/// Pull the P-256 public key out of a DER certificate's
/// SubjectPublicKeyInfo: locate the secp256r1 OID, then the following
/// BIT STRING holding the uncompressed point. Leaf selection and full path
/// validation are the caller's concern.
pub fn extract_p256_public_key(cert_der: &[u8]) -> Result<Vec<u8>, TlsError> {
    let oid_pos = cert_der
        .windows(SECP256R1_OID.len())
        .position(|w| w == SECP256R1_OID)
        .ok_or(TlsError::DecodeCertificate)?;

    let tail = &cert_der[oid_pos + SECP256R1_OID.len()..];
    for (i, &b) in tail.iter().enumerate() {
        // BIT STRING, short length 0x42: unused-bits byte + 65-byte point
        if b == 0x03 && tail.len() - i >= 2 + 1 + 65 && tail[i + 1] == 0x42 && tail[i + 2] == 0x00
        {
            return Ok(tail[i + 3..i + 3 + 65].to_vec());
        }
    }
    Err(TlsError::DecodeCertificate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_private_key() -> [u8; 32] {
        // Any scalar below the P-256 order works as a fixture
        let mut key = [0x5Au8; 32];
        key[0] = 0x01;
        key
    }

    #[test]
    fn test_select_scheme() {
        let peer = [
            SignatureScheme::RSA_PSS_RSAE_SHA256,
            SignatureScheme::ECDSA_SECP256R1_SHA256,
        ];
        assert_eq!(
            select_signature_scheme(&peer).unwrap(),
            SignatureScheme::ECDSA_SECP256R1_SHA256
        );
        assert!(select_signature_scheme(&[SignatureScheme::RSA_PKCS1_SHA256]).is_err());
    }

    #[test]
    fn test_verify_content_layout() {
        let hash = [0xAB; 32];
        let content = build_verify_content(&hash, true);
        assert_eq!(&content[..64], &[0x20u8; 64]);
        assert_eq!(
            &content[64..64 + 33],
            b"TLS 1.3, server CertificateVerify"
        );
        assert_eq!(content[64 + 33], 0);
        assert_eq!(&content[64 + 34..], &hash);

        let client = build_verify_content(&hash, false);
        assert_ne!(content, client);
    }

    #[test]
    fn test_certificate_verify_roundtrip() {
        let key = test_private_key();
        let public = public_key_from_private(&key).unwrap();
        let hash = [0x42; 32];

        let sig = sign_certificate_verify(&key, &hash, true).unwrap();
        verify_certificate_verify(&public, &sig, &hash, true).unwrap();

        // Wrong side, wrong hash, wrong key all fail
        assert!(verify_certificate_verify(&public, &sig, &hash, false).is_err());
        assert!(verify_certificate_verify(&public, &sig, &[0x43; 32], true).is_err());
        let other = public_key_from_private(&[0x77; 32]).unwrap();
        assert!(verify_certificate_verify(&other, &sig, &hash, true).is_err());
    }

    #[test]
    fn test_ske_signature_roundtrip() {
        let key = test_private_key();
        let public = public_key_from_private(&key).unwrap();
        let content = build_ske_content(&[1; 32], &[2; 32], &[3, 4, 5]);

        let sig = sign_content(&key, &content).unwrap();
        verify_content(&public, &sig, &content).unwrap();

        // Any mutation of the signed randoms invalidates the signature
        let tampered = build_ske_content(&[9; 32], &[2; 32], &[3, 4, 5]);
        assert!(verify_content(&public, &sig, &tampered).is_err());
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let public = public_key_from_private(&test_private_key()).unwrap();
        assert!(verify_content(&public, &[0u8; 70], b"content").is_err());
        assert!(verify_content(&public, &[], b"content").is_err());
    }

    #[test]
    fn test_extract_public_key_from_spki_fragment() {
        // Minimal SPKI-shaped fragment: algorithm OIDs then the point
        let key = test_private_key();
        let public = public_key_from_private(&key).unwrap();
        let mut fake_cert = vec![0x30, 0x10]; // leading structure noise
        fake_cert.extend_from_slice(SECP256R1_OID);
        fake_cert.extend_from_slice(&[0x03, 0x42, 0x00]);
        fake_cert.extend_from_slice(&public);

        let extracted = extract_p256_public_key(&fake_cert).unwrap();
        assert_eq!(extracted, public);
    }

    #[test]
    fn test_extract_public_key_missing_oid() {
        assert!(extract_p256_public_key(&[0x30, 0x82, 0x01, 0x00]).is_err());
    }
}
