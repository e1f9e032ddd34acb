//! Connection configuration: certificates, key material, and negotiation
//! preferences. A config is built once, then shared immutably across any
//! number of connections.

use crate::crypt::{NamedGroup, SignatureScheme};
use crate::handshake::kem::{Kem, PQ_KEMS_R1, PQ_KEMS_R1R2};
use crate::{CipherSuite, TlsVersion};
use ferrotls_types::TlsError;
use ferrotls_utils::pem;
use p256::pkcs8::DecodePrivateKey;
use zeroize::Zeroize;

/// The certificate chain, leaf first, as an index-keyed vector: entry `i`
/// is followed by entry `i + 1`, so issuer traversal is a bounds-checked
/// index walk instead of pointer chasing.
#[derive(Debug, Clone, Default)]
pub struct CertChain {
    certs: Vec<Vec<u8>>,
}

impl CertChain {
    pub fn from_der_list(certs: Vec<Vec<u8>>) -> Self {
        Self { certs }
    }

    /// Parse every CERTIFICATE block of a concatenated PEM file, in order.
    pub fn from_pem(pem_text: &str) -> Result<Self, TlsError> {
        let certs = pem::parse_labeled(pem_text, "CERTIFICATE")?;
        if certs.is_empty() {
            return Err(TlsError::NoCertificateInPem);
        }
        Ok(Self { certs })
    }

    /// The end-entity certificate.
    pub fn leaf(&self) -> Option<&[u8]> {
        self.certs.first().map(|c| c.as_slice())
    }

    /// The index of the certificate following `i`, if any.
    pub fn next_of(&self, i: usize) -> Option<usize> {
        if i + 1 < self.certs.len() {
            Some(i + 1)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn as_der_list(&self) -> &[Vec<u8>] {
        &self.certs
    }
}

/// An ECDSA-P256 private key (32-byte scalar), zeroized on drop.
#[derive(Clone)]
pub struct PrivateKey {
    scalar: Vec<u8>,
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.scalar.zeroize();
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([redacted])")
    }
}

impl PrivateKey {
    pub fn from_scalar(scalar: &[u8]) -> Result<Self, TlsError> {
        if scalar.len() != 32 {
            return Err(TlsError::DecodePrivateKey);
        }
        Ok(Self {
            scalar: scalar.to_vec(),
        })
    }

    /// Accepts a PKCS#8 `PRIVATE KEY` or RFC 5915 `EC PRIVATE KEY` block.
    pub fn from_pem(pem_text: &str) -> Result<Self, TlsError> {
        for block in pem::parse(pem_text)? {
            match block.label.as_str() {
                "PRIVATE KEY" => {
                    let key = p256::ecdsa::SigningKey::from_pkcs8_der(&block.data)
                        .map_err(|_| TlsError::DecodePrivateKey)?;
                    return Self::from_scalar(&key.to_bytes());
                }
                "EC PRIVATE KEY" => return Self::from_sec1_der(&block.data),
                _ => continue,
            }
        }
        Err(TlsError::DecodePrivateKey)
    }

    /// RFC 5915: `SEQUENCE { version INTEGER(1), privateKey OCTET STRING, ... }`.
    fn from_sec1_der(der: &[u8]) -> Result<Self, TlsError> {
        // Fixed prefix for a 32-byte key: SEQUENCE, version 1, OCTET STRING(32)
        if der.len() < 39 || der[0] != 0x30 {
            return Err(TlsError::DecodePrivateKey);
        }
        let body = if der[1] & 0x80 == 0 {
            &der[2..]
        } else {
            let len_octets = (der[1] & 0x7F) as usize;
            if der.len() < 2 + len_octets {
                return Err(TlsError::DecodePrivateKey);
            }
            &der[2 + len_octets..]
        };
        if body.len() < 37 || body[..3] != [0x02, 0x01, 0x01] || body[3..5] != [0x04, 0x20] {
            return Err(TlsError::DecodePrivateKey);
        }
        Self::from_scalar(&body[5..37])
    }

    pub fn scalar(&self) -> &[u8] {
        &self.scalar
    }
}

/// A named cipher-suite preference table. New tables get a date tag; the
/// tag in use is part of the caller's configuration surface, so existing
/// tags never change meaning.
pub fn cipher_preferences(version_tag: &str) -> Result<&'static [CipherSuite], TlsError> {
    static DEFAULT: &[CipherSuite] = &[
        CipherSuite::TLS_AES_128_GCM_SHA256,
        CipherSuite::TLS_AES_256_GCM_SHA384,
        CipherSuite::TLS_CHACHA20_POLY1305_SHA256,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
    ];
    // Pre-1.3 table kept for callers pinned to older stacks
    static V20160411: &[CipherSuite] = &[
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
    ];
    match version_tag {
        "default" => Ok(DEFAULT),
        "20160411" => Ok(V20160411),
        _ => Err(TlsError::InvalidCipherPreferences),
    }
}

/// Immutable connection configuration.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: TlsVersion,
    pub max_version: TlsVersion,
    /// Cipher suites in preference order.
    pub cipher_suites: Vec<CipherSuite>,
    /// ALPN protocols in preference order; empty disables ALPN.
    pub alpn_protocols: Vec<Vec<u8>>,
    /// Name sent in (client) or expected from (server) the SNI extension.
    pub server_name: Option<String>,
    pub certificate_chain: CertChain,
    pub private_key: Option<PrivateKey>,
    /// Offer/request OCSP stapling via status_request.
    pub ocsp_status_request: bool,
    /// Key exchange groups in preference order.
    pub supported_groups: Vec<NamedGroup>,
    pub signature_algorithms: Vec<SignatureScheme>,
    /// KEM preference table for hybrid suites.
    pub kem_preferences: &'static [&'static Kem],
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: TlsVersion::Tls10,
            max_version: TlsVersion::Tls13,
            cipher_suites: cipher_preferences("default")
                .map(|s| s.to_vec())
                .unwrap_or_default(),
            alpn_protocols: Vec::new(),
            server_name: None,
            certificate_chain: CertChain::default(),
            private_key: None,
            ocsp_status_request: false,
            supported_groups: vec![NamedGroup::X25519, NamedGroup::SECP256R1],
            signature_algorithms: vec![SignatureScheme::ECDSA_SECP256R1_SHA256],
            kem_preferences: PQ_KEMS_R1,
        }
    }
}

impl TlsConfig {
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder {
            config: TlsConfig::default(),
        }
    }
}

/// Builder for [`TlsConfig`].
pub struct TlsConfigBuilder {
    config: TlsConfig,
}

impl TlsConfigBuilder {
    pub fn version_range(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.config.min_version = min;
        self.config.max_version = max;
        self
    }

    /// Select a cipher preference table by its version tag.
    pub fn cipher_preferences(mut self, version_tag: &str) -> Result<Self, TlsError> {
        self.config.cipher_suites = cipher_preferences(version_tag)?.to_vec();
        Ok(self)
    }

    pub fn cipher_suites(mut self, suites: Vec<CipherSuite>) -> Self {
        self.config.cipher_suites = suites;
        self
    }

    pub fn alpn_protocols(mut self, protocols: Vec<Vec<u8>>) -> Self {
        self.config.alpn_protocols = protocols;
        self
    }

    pub fn server_name(mut self, name: &str) -> Result<Self, TlsError> {
        if name.len() > crate::handshake::extensions_codec::MAX_SERVER_NAME_LEN {
            return Err(TlsError::ServerNameTooLong);
        }
        self.config.server_name = Some(name.to_string());
        Ok(self)
    }

    /// Load the certificate chain and private key from PEM text.
    pub fn certificate_and_key(
        mut self,
        cert_chain_pem: &str,
        private_key_pem: &str,
    ) -> Result<Self, TlsError> {
        self.config.certificate_chain = CertChain::from_pem(cert_chain_pem)?;
        self.config.private_key = Some(PrivateKey::from_pem(private_key_pem)?);
        Ok(self)
    }

    /// Install a raw DER chain and scalar key (test and embedded use).
    pub fn certificate_and_key_der(
        mut self,
        chain: Vec<Vec<u8>>,
        scalar: &[u8],
    ) -> Result<Self, TlsError> {
        self.config.certificate_chain = CertChain::from_der_list(chain);
        self.config.private_key = Some(PrivateKey::from_scalar(scalar)?);
        Ok(self)
    }

    pub fn ocsp_status_request(mut self, enabled: bool) -> Self {
        self.config.ocsp_status_request = enabled;
        self
    }

    pub fn kem_preferences_round2(mut self) -> Self {
        self.config.kem_preferences = PQ_KEMS_R1R2;
        self
    }

    pub fn build(self) -> TlsConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A valid P-256 scalar fixture.
    fn test_scalar() -> [u8; 32] {
        let mut s = [0x5Au8; 32];
        s[0] = 0x01;
        s
    }

    #[test]
    fn test_default_config() {
        let cfg = TlsConfig::default();
        assert_eq!(cfg.min_version, TlsVersion::Tls10);
        assert_eq!(cfg.max_version, TlsVersion::Tls13);
        assert!(cfg.cipher_suites.contains(&CipherSuite::TLS_AES_128_GCM_SHA256));
        assert!(cfg.certificate_chain.is_empty());
        assert!(cfg.private_key.is_none());
    }

    #[test]
    fn test_cipher_preference_tags() {
        let default = cipher_preferences("default").unwrap();
        assert_eq!(default[0], CipherSuite::TLS_AES_128_GCM_SHA256);

        let legacy = cipher_preferences("20160411").unwrap();
        assert!(!legacy.contains(&CipherSuite::TLS_AES_128_GCM_SHA256));
        assert!(legacy.contains(&CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA));

        assert!(matches!(
            cipher_preferences("19990101"),
            Err(TlsError::InvalidCipherPreferences)
        ));
    }

    #[test]
    fn test_cert_chain_from_pem() {
        let pem_text = format!(
            "{}{}",
            pem::encode("CERTIFICATE", &[0x30, 0x01]),
            pem::encode("CERTIFICATE", &[0x30, 0x02])
        );
        let chain = CertChain::from_pem(&pem_text).unwrap();
        assert_eq!(chain.leaf().unwrap(), &[0x30, 0x01]);
        assert_eq!(chain.next_of(0), Some(1));
        assert_eq!(chain.next_of(1), None);
    }

    #[test]
    fn test_cert_chain_requires_certificates() {
        assert!(matches!(
            CertChain::from_pem("no blocks here"),
            Err(TlsError::NoCertificateInPem)
        ));
        let key_only = pem::encode("EC PRIVATE KEY", &[1, 2, 3]);
        assert!(CertChain::from_pem(&key_only).is_err());
    }

    #[test]
    fn test_private_key_from_sec1_pem() {
        // Minimal RFC 5915 body: version 1, 32-byte key, nothing optional
        let scalar = test_scalar();
        let mut der = vec![0x30, 0x25, 0x02, 0x01, 0x01, 0x04, 0x20];
        der.extend_from_slice(&scalar);
        let pem_text = pem::encode("EC PRIVATE KEY", &der);
        let key = PrivateKey::from_pem(&pem_text).unwrap();
        assert_eq!(key.scalar(), scalar);
    }

    #[test]
    fn test_private_key_rejects_garbage() {
        assert!(PrivateKey::from_scalar(&[0u8; 16]).is_err());
        assert!(PrivateKey::from_pem("not pem").is_err());
        let bogus = pem::encode("EC PRIVATE KEY", &[0x30, 0x03, 0x02, 0x01, 0x01]);
        assert!(PrivateKey::from_pem(&bogus).is_err());
    }

    #[test]
    fn test_private_key_debug_redacts() {
        let key = PrivateKey::from_scalar(&test_scalar()).unwrap();
        let debug = format!("{key:?}");
        assert!(!debug.contains("5a"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_builder() {
        let cfg = TlsConfig::builder()
            .version_range(TlsVersion::Tls12, TlsVersion::Tls13)
            .alpn_protocols(vec![b"h2".to_vec()])
            .server_name("example.com")
            .unwrap()
            .certificate_and_key_der(vec![vec![0x30]], &test_scalar())
            .unwrap()
            .ocsp_status_request(true)
            .build();
        assert_eq!(cfg.min_version, TlsVersion::Tls12);
        assert_eq!(cfg.alpn_protocols, vec![b"h2".to_vec()]);
        assert_eq!(cfg.server_name.as_deref(), Some("example.com"));
        assert!(cfg.ocsp_status_request);
        assert!(!cfg.certificate_chain.is_empty());
    }

    #[test]
    fn test_builder_rejects_long_server_name() {
        let long = "a".repeat(300);
        assert!(TlsConfig::builder().server_name(&long).is_err());
    }
}
