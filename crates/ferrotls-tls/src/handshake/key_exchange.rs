//! Ephemeral ECDHE key exchange over X25519 and P-256.

use crate::crypt::NamedGroup;
use ferrotls_types::TlsError;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use zeroize::Zeroize;

fn random_bytes<const N: usize>() -> Result<[u8; N], TlsError> {
    let mut out = [0u8; N];
    getrandom::getrandom(&mut out).map_err(|_| TlsError::Entropy)?;
    Ok(out)
}

enum KeyPair {
    X25519(x25519_dalek::StaticSecret),
    P256(p256::SecretKey),
}

/// Ephemeral key-exchange state for one handshake.
pub struct KeyExchange {
    group: NamedGroup,
    keypair: KeyPair,
    public_key: Vec<u8>,
}

impl KeyExchange {
    /// Generate a fresh ephemeral keypair for the given group.
    pub fn generate(group: NamedGroup) -> Result<Self, TlsError> {
        match group {
            NamedGroup::X25519 => {
                let secret = x25519_dalek::StaticSecret::from(random_bytes::<32>()?);
                let public = x25519_dalek::PublicKey::from(&secret);
                Ok(Self {
                    group,
                    public_key: public.as_bytes().to_vec(),
                    keypair: KeyPair::X25519(secret),
                })
            }
            NamedGroup::SECP256R1 => {
                // Rejection-sample until the scalar lands in the group order
                let secret = loop {
                    let mut candidate = random_bytes::<32>()?;
                    if let Ok(key) = p256::SecretKey::from_slice(&candidate) {
                        candidate.zeroize();
                        break key;
                    }
                    candidate.zeroize();
                };
                let public = secret
                    .public_key()
                    .to_encoded_point(false)
                    .as_bytes()
                    .to_vec();
                Ok(Self {
                    group,
                    public_key: public,
                    keypair: KeyPair::P256(secret),
                })
            }
            _ => Err(TlsError::HandshakeFailed(format!(
                "unsupported named group {:#06x}",
                group.0
            ))),
        }
    }

    pub fn group(&self) -> NamedGroup {
        self.group
    }

    /// The public key in its wire encoding: 32 raw bytes for X25519, the
    /// 65-byte uncompressed SEC1 point for P-256.
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key
    }

    /// Compute the shared secret against the peer's public key.
    pub fn shared_secret(&self, peer_public: &[u8]) -> Result<Vec<u8>, TlsError> {
        match &self.keypair {
            KeyPair::X25519(secret) => {
                let peer: [u8; 32] = peer_public
                    .try_into()
                    .map_err(|_| TlsError::BadMessage("X25519 key must be 32 bytes".into()))?;
                let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(peer));
                Ok(shared.as_bytes().to_vec())
            }
            KeyPair::P256(secret) => {
                let peer = p256::PublicKey::from_sec1_bytes(peer_public)
                    .map_err(|_| TlsError::BadMessage("invalid P-256 point".into()))?;
                let shared = p256::ecdh::diffie_hellman(
                    secret.to_nonzero_scalar(),
                    peer.as_affine(),
                );
                Ok(shared.raw_secret_bytes().to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x25519_agreement() {
        let a = KeyExchange::generate(NamedGroup::X25519).unwrap();
        let b = KeyExchange::generate(NamedGroup::X25519).unwrap();
        assert_eq!(a.public_key_bytes().len(), 32);

        let s1 = a.shared_secret(b.public_key_bytes()).unwrap();
        let s2 = b.shared_secret(a.public_key_bytes()).unwrap();
        assert_eq!(s1, s2);
        assert_eq!(s1.len(), 32);
    }

    #[test]
    fn test_p256_agreement() {
        let a = KeyExchange::generate(NamedGroup::SECP256R1).unwrap();
        let b = KeyExchange::generate(NamedGroup::SECP256R1).unwrap();
        assert_eq!(a.public_key_bytes().len(), 65);
        assert_eq!(a.public_key_bytes()[0], 0x04);

        let s1 = a.shared_secret(b.public_key_bytes()).unwrap();
        let s2 = b.shared_secret(a.public_key_bytes()).unwrap();
        assert_eq!(s1, s2);
        assert_eq!(s1.len(), 32);
    }

    #[test]
    fn test_fresh_keys_differ() {
        let a = KeyExchange::generate(NamedGroup::X25519).unwrap();
        let b = KeyExchange::generate(NamedGroup::X25519).unwrap();
        assert_ne!(a.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn test_bad_peer_key_rejected() {
        let a = KeyExchange::generate(NamedGroup::X25519).unwrap();
        assert!(a.shared_secret(&[0u8; 16]).is_err());

        let p = KeyExchange::generate(NamedGroup::SECP256R1).unwrap();
        assert!(p.shared_secret(&[0x04; 65]).is_err());
        assert!(p.shared_secret(&[]).is_err());
    }

    #[test]
    fn test_unsupported_group() {
        assert!(KeyExchange::generate(NamedGroup::SECP384R1).is_err());
    }
}
