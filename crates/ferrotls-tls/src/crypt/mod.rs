//! Cryptographic parameters and derivations for the TLS engine.
//!
//! Bridges the protocol layers to the RustCrypto primitive crates.

pub mod aead;
pub mod hash;
pub mod hkdf;
pub mod key_schedule;
pub mod key_schedule12;
pub mod prf;
pub mod traffic_keys;
pub mod transcript;

use crate::{CipherSuite, TlsVersion};
use ferrotls_types::TlsError;
pub use hash::HashAlg;

/// Parameters associated with a TLS 1.3 cipher suite.
#[derive(Debug, Clone)]
pub struct CipherSuiteParams {
    pub suite: CipherSuite,
    /// Transcript/HKDF hash.
    pub hash: HashAlg,
    /// AEAD key length in bytes.
    pub key_len: usize,
    /// AEAD IV length in bytes (always 12 for TLS 1.3).
    pub iv_len: usize,
    /// AEAD tag length in bytes (always 16).
    pub tag_len: usize,
}

impl CipherSuiteParams {
    /// Look up parameters for a TLS 1.3 cipher suite.
    pub fn from_suite(suite: CipherSuite) -> Result<Self, TlsError> {
        match suite {
            CipherSuite::TLS_AES_128_GCM_SHA256 => Ok(Self {
                suite,
                hash: HashAlg::Sha256,
                key_len: 16,
                iv_len: 12,
                tag_len: 16,
            }),
            CipherSuite::TLS_AES_256_GCM_SHA384 => Ok(Self {
                suite,
                hash: HashAlg::Sha384,
                key_len: 32,
                iv_len: 12,
                tag_len: 16,
            }),
            CipherSuite::TLS_CHACHA20_POLY1305_SHA256 => Ok(Self {
                suite,
                hash: HashAlg::Sha256,
                key_len: 32,
                iv_len: 12,
                tag_len: 16,
            }),
            _ => Err(TlsError::NoSharedCipherSuite),
        }
    }

    pub fn hash_len(&self) -> usize {
        self.hash.output_len()
    }
}

/// Key exchange algorithm for pre-1.3 suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlg {
    /// Ephemeral ECDH, parameters signed in ServerKeyExchange.
    Ecdhe,
    /// Static RSA key exchange (client encrypts the premaster secret).
    Rsa,
}

impl KeyExchangeAlg {
    /// Whether the server must send a ServerKeyExchange message.
    pub fn sends_server_key_exchange(&self) -> bool {
        matches!(self, Self::Ecdhe)
    }
}

/// Peer authentication algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAlg {
    Rsa,
    Ecdsa,
}

/// Parameters associated with a TLS 1.0-1.2 cipher suite.
///
/// One static descriptor per suite: wire code, key exchange, authentication,
/// record cipher geometry, MAC, and the minimum protocol version the suite
/// may be negotiated under.
#[derive(Debug, Clone)]
pub struct Tls12CipherSuiteParams {
    pub suite: CipherSuite,
    pub kx_alg: KeyExchangeAlg,
    pub auth_alg: AuthAlg,
    /// PRF hash (TLS 1.2; earlier versions use the MD5/SHA1 PRF regardless).
    pub prf_hash: HashAlg,
    /// Record-protection key length in bytes.
    pub key_len: usize,
    /// IV taken from the key block: 4 for GCM salt, 12 for ChaCha20, 16 for
    /// CBC under TLS 1.0 (later CBC versions use a random explicit IV).
    pub fixed_iv_len: usize,
    /// Explicit per-record nonce on the wire (8 for GCM, else 0).
    pub record_iv_len: usize,
    /// AEAD tag length (0 for CBC).
    pub tag_len: usize,
    /// HMAC key and output lengths (0 for AEAD suites).
    pub mac_key_len: usize,
    pub mac_len: usize,
    /// MAC hash for CBC suites.
    pub mac_hash: HashAlg,
    pub is_cbc: bool,
    /// Earliest protocol version this suite is valid under.
    pub min_version: TlsVersion,
}

impl Tls12CipherSuiteParams {
    /// Look up parameters for a pre-1.3 cipher suite.
    pub fn from_suite(suite: CipherSuite) -> Result<Self, TlsError> {
        let cbc = |suite, auth_alg, key_len, mac_hash: HashAlg, prf_hash, min_version| Self {
            suite,
            kx_alg: KeyExchangeAlg::Ecdhe,
            auth_alg,
            prf_hash,
            key_len,
            fixed_iv_len: 16,
            record_iv_len: 0,
            tag_len: 0,
            mac_key_len: mac_hash.output_len(),
            mac_len: mac_hash.output_len(),
            mac_hash,
            is_cbc: true,
            min_version,
        };
        let aead = |suite, auth_alg, key_len, fixed_iv_len, record_iv_len, prf_hash| Self {
            suite,
            kx_alg: KeyExchangeAlg::Ecdhe,
            auth_alg,
            prf_hash,
            key_len,
            fixed_iv_len,
            record_iv_len,
            tag_len: 16,
            mac_key_len: 0,
            mac_len: 0,
            mac_hash: prf_hash,
            is_cbc: false,
            min_version: TlsVersion::Tls12,
        };

        match suite {
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA => Ok(cbc(
                suite,
                AuthAlg::Ecdsa,
                16,
                HashAlg::Sha1,
                HashAlg::Sha256,
                TlsVersion::Tls10,
            )),
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA => Ok(cbc(
                suite,
                AuthAlg::Ecdsa,
                32,
                HashAlg::Sha1,
                HashAlg::Sha256,
                TlsVersion::Tls10,
            )),
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA => Ok(cbc(
                suite,
                AuthAlg::Rsa,
                16,
                HashAlg::Sha1,
                HashAlg::Sha256,
                TlsVersion::Tls10,
            )),
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA => Ok(cbc(
                suite,
                AuthAlg::Rsa,
                32,
                HashAlg::Sha1,
                HashAlg::Sha256,
                TlsVersion::Tls10,
            )),
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256 => Ok(cbc(
                suite,
                AuthAlg::Ecdsa,
                16,
                HashAlg::Sha256,
                HashAlg::Sha256,
                TlsVersion::Tls12,
            )),
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384 => Ok(cbc(
                suite,
                AuthAlg::Ecdsa,
                32,
                HashAlg::Sha384,
                HashAlg::Sha384,
                TlsVersion::Tls12,
            )),
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 => {
                Ok(aead(suite, AuthAlg::Ecdsa, 16, 4, 8, HashAlg::Sha256))
            }
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => {
                Ok(aead(suite, AuthAlg::Ecdsa, 32, 4, 8, HashAlg::Sha384))
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 => {
                Ok(aead(suite, AuthAlg::Rsa, 16, 4, 8, HashAlg::Sha256))
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => {
                Ok(aead(suite, AuthAlg::Rsa, 32, 4, 8, HashAlg::Sha384))
            }
            CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256 => {
                Ok(aead(suite, AuthAlg::Ecdsa, 32, 12, 0, HashAlg::Sha256))
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256 => {
                Ok(aead(suite, AuthAlg::Rsa, 32, 12, 0, HashAlg::Sha256))
            }
            _ => Err(TlsError::NoSharedCipherSuite),
        }
    }

    /// The PRF hash actually in effect for `version`.
    pub fn prf_hash_for(&self, version: TlsVersion) -> HashAlg {
        if version >= TlsVersion::Tls12 {
            self.prf_hash
        } else {
            HashAlg::Md5Sha1
        }
    }

    /// IV bytes drawn from the key block under `version`.
    ///
    /// CBC suites take their chaining IV from the key block only under
    /// TLS 1.0; later versions send a random explicit IV per record.
    pub fn iv_material_len(&self, version: TlsVersion) -> usize {
        if self.is_cbc && version > TlsVersion::Tls10 {
            0
        } else {
            self.fixed_iv_len
        }
    }

    /// Total key material drawn from the key block under `version`:
    /// 2*mac_key + 2*key + 2*iv_material.
    pub fn key_block_len(&self, version: TlsVersion) -> usize {
        2 * self.mac_key_len + 2 * self.key_len + 2 * self.iv_material_len(version)
    }
}

/// Returns true if the cipher suite is negotiable under the given version.
pub fn suite_valid_for_version(suite: CipherSuite, version: TlsVersion) -> bool {
    if version == TlsVersion::Tls13 {
        CipherSuiteParams::from_suite(suite).is_ok()
    } else {
        Tls12CipherSuiteParams::from_suite(suite)
            .map(|p| p.min_version <= version)
            .unwrap_or(false)
    }
}

/// TLS named group identifiers for key exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedGroup(pub u16);

impl NamedGroup {
    pub const SECP256R1: Self = Self(0x0017);
    pub const SECP384R1: Self = Self(0x0018);
    pub const X25519: Self = Self(0x001D);
}

/// TLS signature scheme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureScheme(pub u16);

impl SignatureScheme {
    pub const RSA_PKCS1_SHA256: Self = Self(0x0401);
    pub const ECDSA_SECP256R1_SHA256: Self = Self(0x0403);
    pub const ECDSA_SECP384R1_SHA384: Self = Self(0x0503);
    pub const RSA_PSS_RSAE_SHA256: Self = Self(0x0804);
}
