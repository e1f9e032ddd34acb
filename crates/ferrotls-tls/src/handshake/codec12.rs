//! TLS 1.0-1.2 handshake message coders: the certificate chain form,
//! ServerKeyExchange, CertificateRequest, ServerHelloDone, and
//! ClientKeyExchange (RFC 5246 §7.4, RFC 4492 §5.4).

use super::codec::Reader;
use super::{wrap_handshake, HandshakeType};
use crate::crypt::{NamedGroup, SignatureScheme};
use ferrotls_types::TlsError;

/// ECDHE curve_type for named curves.
const CURVE_TYPE_NAMED: u8 = 3;

// ---------------------------------------------------------------------------
// Certificate (pre-1.3 shape: bare chain of u24-prefixed certs)
// ---------------------------------------------------------------------------

pub fn encode_certificate12(chain: &[Vec<u8>]) -> Vec<u8> {
    let mut list = Vec::new();
    for cert in chain {
        let len = cert.len();
        list.push((len >> 16) as u8);
        list.push((len >> 8) as u8);
        list.push(len as u8);
        list.extend_from_slice(cert);
    }
    let mut body = Vec::with_capacity(3 + list.len());
    body.push((list.len() >> 16) as u8);
    body.push((list.len() >> 8) as u8);
    body.push(list.len() as u8);
    body.extend_from_slice(&list);
    wrap_handshake(HandshakeType::Certificate, &body)
}

pub fn decode_certificate12(body: &[u8]) -> Result<Vec<Vec<u8>>, TlsError> {
    let mut r = Reader::new(body, "Certificate");
    let list_len = r.u24()?;
    let list = r.take(list_len)?;
    r.expect_done()?;

    let mut chain = Vec::new();
    let mut lr = Reader::new(list, "Certificate.chain");
    while lr.remaining() > 0 {
        let cert_len = lr.u24()?;
        chain.push(lr.take(cert_len)?.to_vec());
    }
    Ok(chain)
}

// ---------------------------------------------------------------------------
// ServerKeyExchange (ECDHE with named curve)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ServerKeyExchange {
    pub group: NamedGroup,
    pub public_key: Vec<u8>,
    /// Present from TLS 1.2 on; earlier versions imply the hash.
    pub algorithm: Option<SignatureScheme>,
    pub signature: Vec<u8>,
}

/// The `params` portion that the signature covers:
/// `curve_type(1) || named_curve(2) || point_len(1) || point`.
pub fn encode_ske_params(group: NamedGroup, public_key: &[u8]) -> Vec<u8> {
    let mut params = Vec::with_capacity(4 + public_key.len());
    params.push(CURVE_TYPE_NAMED);
    params.extend_from_slice(&group.0.to_be_bytes());
    params.push(public_key.len() as u8);
    params.extend_from_slice(public_key);
    params
}

pub fn encode_server_key_exchange(ske: &ServerKeyExchange) -> Vec<u8> {
    let mut body = encode_ske_params(ske.group, &ske.public_key);
    if let Some(alg) = ske.algorithm {
        body.extend_from_slice(&alg.0.to_be_bytes());
    }
    body.extend_from_slice(&(ske.signature.len() as u16).to_be_bytes());
    body.extend_from_slice(&ske.signature);
    wrap_handshake(HandshakeType::ServerKeyExchange, &body)
}

/// `with_algorithm` selects the TLS 1.2 form carrying a signature scheme.
pub fn decode_server_key_exchange(
    body: &[u8],
    with_algorithm: bool,
) -> Result<ServerKeyExchange, TlsError> {
    let mut r = Reader::new(body, "ServerKeyExchange");
    if r.u8()? != CURVE_TYPE_NAMED {
        return Err(TlsError::BadMessage(
            "ServerKeyExchange: not a named curve".into(),
        ));
    }
    let group = NamedGroup(r.u16()?);
    let public_key = r.vec8()?;
    if public_key.is_empty() {
        return Err(TlsError::BadMessage(
            "ServerKeyExchange: empty public key".into(),
        ));
    }
    let algorithm = if with_algorithm {
        Some(SignatureScheme(r.u16()?))
    } else {
        None
    };
    let signature = r.vec16()?;
    r.expect_done()?;
    Ok(ServerKeyExchange {
        group,
        public_key,
        algorithm,
        signature,
    })
}

// ---------------------------------------------------------------------------
// CertificateRequest
// ---------------------------------------------------------------------------

/// ClientCertificateType codes we advertise.
pub const CERT_TYPE_ECDSA_SIGN: u8 = 64;

#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub certificate_types: Vec<u8>,
    /// Present from TLS 1.2 on.
    pub signature_algorithms: Vec<SignatureScheme>,
}

pub fn encode_certificate_request(cr: &CertificateRequest, with_sig_algs: bool) -> Vec<u8> {
    let mut body = Vec::new();
    body.push(cr.certificate_types.len() as u8);
    body.extend_from_slice(&cr.certificate_types);
    if with_sig_algs {
        body.extend_from_slice(&((cr.signature_algorithms.len() * 2) as u16).to_be_bytes());
        for s in &cr.signature_algorithms {
            body.extend_from_slice(&s.0.to_be_bytes());
        }
    }
    // certificate_authorities: empty
    body.extend_from_slice(&0u16.to_be_bytes());
    wrap_handshake(HandshakeType::CertificateRequest, &body)
}

pub fn decode_certificate_request(
    body: &[u8],
    with_sig_algs: bool,
) -> Result<CertificateRequest, TlsError> {
    let mut r = Reader::new(body, "CertificateRequest");
    let certificate_types = r.vec8()?;
    let signature_algorithms = if with_sig_algs {
        let raw = r.vec16()?;
        if raw.len() % 2 != 0 {
            return Err(TlsError::BadMessage(
                "CertificateRequest: odd signature list".into(),
            ));
        }
        raw.chunks_exact(2)
            .map(|c| SignatureScheme(u16::from_be_bytes([c[0], c[1]])))
            .collect()
    } else {
        Vec::new()
    };
    let _authorities = r.vec16()?;
    r.expect_done()?;
    Ok(CertificateRequest {
        certificate_types,
        signature_algorithms,
    })
}

// ---------------------------------------------------------------------------
// ServerHelloDone / ClientKeyExchange
// ---------------------------------------------------------------------------

pub fn encode_server_hello_done() -> Vec<u8> {
    wrap_handshake(HandshakeType::ServerHelloDone, &[])
}

pub fn decode_server_hello_done(body: &[u8]) -> Result<(), TlsError> {
    if !body.is_empty() {
        return Err(TlsError::BadMessage("ServerHelloDone: nonempty body".into()));
    }
    Ok(())
}

/// ECDHE ClientKeyExchange: the client's ephemeral point, u8-prefixed.
pub fn encode_client_key_exchange(public_key: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(1 + public_key.len());
    body.push(public_key.len() as u8);
    body.extend_from_slice(public_key);
    wrap_handshake(HandshakeType::ClientKeyExchange, &body)
}

pub fn decode_client_key_exchange(body: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut r = Reader::new(body, "ClientKeyExchange");
    let public_key = r.vec8()?;
    r.expect_done()?;
    if public_key.is_empty() {
        return Err(TlsError::BadMessage(
            "ClientKeyExchange: empty public key".into(),
        ));
    }
    Ok(public_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_chain_roundtrip() {
        let chain = vec![vec![0x30, 0x01, 0x02], vec![0x30, 0x03]];
        let encoded = encode_certificate12(&chain);
        let decoded = decode_certificate12(&encoded[4..]).unwrap();
        assert_eq!(decoded, chain);
    }

    #[test]
    fn test_certificate_chain_truncated() {
        let chain = vec![vec![0xAB; 20]];
        let encoded = encode_certificate12(&chain);
        assert!(decode_certificate12(&encoded[4..encoded.len() - 2]).is_err());
    }

    #[test]
    fn test_ske_roundtrip_tls12_form() {
        let ske = ServerKeyExchange {
            group: NamedGroup::X25519,
            public_key: vec![0xAA; 32],
            algorithm: Some(SignatureScheme::ECDSA_SECP256R1_SHA256),
            signature: vec![0xBB; 71],
        };
        let encoded = encode_server_key_exchange(&ske);
        let decoded = decode_server_key_exchange(&encoded[4..], true).unwrap();
        assert_eq!(decoded.group, NamedGroup::X25519);
        assert_eq!(decoded.public_key, ske.public_key);
        assert_eq!(decoded.algorithm, ske.algorithm);
        assert_eq!(decoded.signature, ske.signature);
    }

    #[test]
    fn test_ske_roundtrip_legacy_form() {
        let ske = ServerKeyExchange {
            group: NamedGroup::SECP256R1,
            public_key: vec![0x04; 65],
            algorithm: None,
            signature: vec![0xCC; 70],
        };
        let encoded = encode_server_key_exchange(&ske);
        let decoded = decode_server_key_exchange(&encoded[4..], false).unwrap();
        assert_eq!(decoded.algorithm, None);
        assert_eq!(decoded.signature, ske.signature);
    }

    #[test]
    fn test_ske_params_are_signature_input() {
        let params = encode_ske_params(NamedGroup::X25519, &[0xAA; 32]);
        assert_eq!(params[0], CURVE_TYPE_NAMED);
        assert_eq!(&params[1..3], &NamedGroup::X25519.0.to_be_bytes());
        assert_eq!(params[3], 32);
        assert_eq!(params.len(), 4 + 32);
    }

    #[test]
    fn test_ske_rejects_unnamed_curve() {
        let mut encoded = encode_server_key_exchange(&ServerKeyExchange {
            group: NamedGroup::X25519,
            public_key: vec![0xAA; 32],
            algorithm: None,
            signature: vec![1],
        });
        encoded[4] = 1; // explicit_prime curve_type
        assert!(decode_server_key_exchange(&encoded[4..], false).is_err());
    }

    #[test]
    fn test_certificate_request_roundtrip() {
        let cr = CertificateRequest {
            certificate_types: vec![CERT_TYPE_ECDSA_SIGN],
            signature_algorithms: vec![SignatureScheme::ECDSA_SECP256R1_SHA256],
        };
        let encoded = encode_certificate_request(&cr, true);
        let decoded = decode_certificate_request(&encoded[4..], true).unwrap();
        assert_eq!(decoded.certificate_types, cr.certificate_types);
        assert_eq!(decoded.signature_algorithms, cr.signature_algorithms);

        let encoded = encode_certificate_request(&cr, false);
        let decoded = decode_certificate_request(&encoded[4..], false).unwrap();
        assert!(decoded.signature_algorithms.is_empty());
    }

    #[test]
    fn test_server_hello_done() {
        let encoded = encode_server_hello_done();
        assert_eq!(encoded, vec![14, 0, 0, 0]);
        decode_server_hello_done(&encoded[4..]).unwrap();
        assert!(decode_server_hello_done(&[0]).is_err());
    }

    #[test]
    fn test_client_key_exchange_roundtrip() {
        let encoded = encode_client_key_exchange(&[0xEE; 32]);
        assert_eq!(decode_client_key_exchange(&encoded[4..]).unwrap(), vec![0xEE; 32]);
        assert!(decode_client_key_exchange(&[0]).is_err());
        assert!(decode_client_key_exchange(&[5, 1, 2]).is_err());
    }
}
