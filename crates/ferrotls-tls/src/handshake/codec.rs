//! Hello, certificate, and finished message coders shared by all protocol
//! versions; TLS 1.3-only bodies live here too (RFC 8446 §4).
//!
//! Decoders bounds-check every length prefix before consuming; any overrun
//! of the enclosing body is a bad-message error.

use super::extensions_codec::{encode_extensions, parse_extensions};
use super::{wrap_handshake, HandshakeType};
use crate::crypt::SignatureScheme;
use crate::extensions::Extension;
use crate::CipherSuite;
use ferrotls_types::TlsError;

/// Bounds-checked cursor over a message body.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, pos: 0, what }
    }

    fn err(&self, detail: &str) -> TlsError {
        TlsError::BadMessage(format!("{}: {detail}", self.what))
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], TlsError> {
        if self.data.len() - self.pos < n {
            return Err(self.err("truncated"));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, TlsError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, TlsError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u24(&mut self) -> Result<usize, TlsError> {
        let b = self.take(3)?;
        Ok(((b[0] as usize) << 16) | ((b[1] as usize) << 8) | b[2] as usize)
    }

    pub fn vec8(&mut self) -> Result<Vec<u8>, TlsError> {
        let len = self.u8()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn vec16(&mut self) -> Result<Vec<u8>, TlsError> {
        let len = self.u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    pub fn expect_done(&self) -> Result<(), TlsError> {
        if self.remaining() != 0 {
            return Err(self.err("trailing bytes"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ClientHello
// ---------------------------------------------------------------------------

/// ClientHello; the wire form is shared by every protocol version.
#[derive(Debug, Clone)]
pub struct ClientHello {
    /// legacy_version field; the real ceiling travels in supported_versions.
    pub legacy_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub extensions: Vec<Extension>,
}

pub fn encode_client_hello(ch: &ClientHello) -> Vec<u8> {
    let mut body = Vec::with_capacity(256);
    body.extend_from_slice(&ch.legacy_version.to_be_bytes());
    body.extend_from_slice(&ch.random);
    body.push(ch.session_id.len() as u8);
    body.extend_from_slice(&ch.session_id);
    body.extend_from_slice(&((ch.cipher_suites.len() * 2) as u16).to_be_bytes());
    for s in &ch.cipher_suites {
        body.extend_from_slice(&s.0.to_be_bytes());
    }
    // legacy_compression_methods: null only
    body.push(1);
    body.push(0);
    body.extend_from_slice(&encode_extensions(&ch.extensions));
    wrap_handshake(HandshakeType::ClientHello, &body)
}

pub fn decode_client_hello(body: &[u8]) -> Result<ClientHello, TlsError> {
    let mut r = Reader::new(body, "ClientHello");
    let legacy_version = r.u16()?;
    let mut random = [0u8; 32];
    random.copy_from_slice(r.take(32)?);
    let session_id = r.vec8()?;
    if session_id.len() > 32 {
        return Err(TlsError::BadMessage("ClientHello: session id too long".into()));
    }

    let suites_raw = r.vec16()?;
    if suites_raw.is_empty() || suites_raw.len() % 2 != 0 {
        return Err(TlsError::BadMessage(
            "ClientHello: malformed cipher suite list".into(),
        ));
    }
    let cipher_suites = suites_raw
        .chunks_exact(2)
        .map(|c| CipherSuite(u16::from_be_bytes([c[0], c[1]])))
        .collect();

    let compression = r.vec8()?;
    if !compression.contains(&0) {
        return Err(TlsError::BadMessage(
            "ClientHello: null compression missing".into(),
        ));
    }

    let extensions = if r.remaining() > 0 {
        parse_extensions(r.rest())?
    } else {
        Vec::new()
    };

    Ok(ClientHello {
        legacy_version,
        random,
        session_id,
        cipher_suites,
        extensions,
    })
}

// ---------------------------------------------------------------------------
// ServerHello
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ServerHello {
    pub legacy_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub extensions: Vec<Extension>,
}

pub fn encode_server_hello(sh: &ServerHello) -> Vec<u8> {
    let mut body = Vec::with_capacity(128);
    body.extend_from_slice(&sh.legacy_version.to_be_bytes());
    body.extend_from_slice(&sh.random);
    body.push(sh.session_id.len() as u8);
    body.extend_from_slice(&sh.session_id);
    body.extend_from_slice(&sh.cipher_suite.0.to_be_bytes());
    body.push(0); // null compression
    if !sh.extensions.is_empty() {
        body.extend_from_slice(&encode_extensions(&sh.extensions));
    }
    wrap_handshake(HandshakeType::ServerHello, &body)
}

pub fn decode_server_hello(body: &[u8]) -> Result<ServerHello, TlsError> {
    let mut r = Reader::new(body, "ServerHello");
    let legacy_version = r.u16()?;
    let mut random = [0u8; 32];
    random.copy_from_slice(r.take(32)?);
    let session_id = r.vec8()?;
    let cipher_suite = CipherSuite(r.u16()?);
    if r.u8()? != 0 {
        return Err(TlsError::BadMessage(
            "ServerHello: nonzero compression".into(),
        ));
    }
    let extensions = if r.remaining() > 0 {
        parse_extensions(r.rest())?
    } else {
        Vec::new()
    };
    Ok(ServerHello {
        legacy_version,
        random,
        session_id,
        cipher_suite,
        extensions,
    })
}

// ---------------------------------------------------------------------------
// EncryptedExtensions (TLS 1.3)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EncryptedExtensions {
    pub extensions: Vec<Extension>,
}

pub fn encode_encrypted_extensions(ee: &EncryptedExtensions) -> Vec<u8> {
    wrap_handshake(
        HandshakeType::EncryptedExtensions,
        &encode_extensions(&ee.extensions),
    )
}

pub fn decode_encrypted_extensions(body: &[u8]) -> Result<EncryptedExtensions, TlsError> {
    Ok(EncryptedExtensions {
        extensions: parse_extensions(body)?,
    })
}

// ---------------------------------------------------------------------------
// Certificate (TLS 1.3 shape: request context + per-entry extensions)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CertificateEntry {
    pub cert_data: Vec<u8>,
    pub extensions: Vec<Extension>,
}

#[derive(Debug, Clone)]
pub struct CertificateMsg {
    pub request_context: Vec<u8>,
    pub certificate_list: Vec<CertificateEntry>,
}

pub fn encode_certificate13(msg: &CertificateMsg) -> Vec<u8> {
    let mut list = Vec::new();
    for entry in &msg.certificate_list {
        let len = entry.cert_data.len();
        list.push((len >> 16) as u8);
        list.push((len >> 8) as u8);
        list.push(len as u8);
        list.extend_from_slice(&entry.cert_data);
        list.extend_from_slice(&encode_extensions(&entry.extensions));
    }

    let mut body = Vec::with_capacity(4 + msg.request_context.len() + list.len());
    body.push(msg.request_context.len() as u8);
    body.extend_from_slice(&msg.request_context);
    body.push((list.len() >> 16) as u8);
    body.push((list.len() >> 8) as u8);
    body.push(list.len() as u8);
    body.extend_from_slice(&list);
    wrap_handshake(HandshakeType::Certificate, &body)
}

pub fn decode_certificate13(body: &[u8]) -> Result<CertificateMsg, TlsError> {
    let mut r = Reader::new(body, "Certificate");
    let request_context = r.vec8()?;
    let list_len = r.u24()?;
    let list = r.take(list_len)?;
    r.expect_done()?;

    let mut certificate_list = Vec::new();
    let mut lr = Reader::new(list, "Certificate.list");
    while lr.remaining() > 0 {
        let cert_len = lr.u24()?;
        let cert_data = lr.take(cert_len)?.to_vec();
        let ext_len = lr.u16()? as usize;
        let ext_body = lr.take(ext_len)?;
        let extensions = if ext_len > 0 {
            // Per-entry extensions reuse the list wire form
            let mut framed = Vec::with_capacity(2 + ext_len);
            framed.extend_from_slice(&(ext_len as u16).to_be_bytes());
            framed.extend_from_slice(ext_body);
            parse_extensions(&framed)?
        } else {
            Vec::new()
        };
        certificate_list.push(CertificateEntry {
            cert_data,
            extensions,
        });
    }

    Ok(CertificateMsg {
        request_context,
        certificate_list,
    })
}

// ---------------------------------------------------------------------------
// CertificateVerify (TLS 1.3)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CertificateVerifyMsg {
    pub algorithm: SignatureScheme,
    pub signature: Vec<u8>,
}

pub fn encode_certificate_verify(msg: &CertificateVerifyMsg) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + msg.signature.len());
    body.extend_from_slice(&msg.algorithm.0.to_be_bytes());
    body.extend_from_slice(&(msg.signature.len() as u16).to_be_bytes());
    body.extend_from_slice(&msg.signature);
    wrap_handshake(HandshakeType::CertificateVerify, &body)
}

pub fn decode_certificate_verify(body: &[u8]) -> Result<CertificateVerifyMsg, TlsError> {
    let mut r = Reader::new(body, "CertificateVerify");
    let algorithm = SignatureScheme(r.u16()?);
    let signature = r.vec16()?;
    r.expect_done()?;
    Ok(CertificateVerifyMsg {
        algorithm,
        signature,
    })
}

// ---------------------------------------------------------------------------
// Finished
// ---------------------------------------------------------------------------

pub fn encode_finished(verify_data: &[u8]) -> Vec<u8> {
    wrap_handshake(HandshakeType::Finished, verify_data)
}

pub fn decode_finished(body: &[u8], expected_len: usize) -> Result<Vec<u8>, TlsError> {
    if body.len() != expected_len {
        return Err(TlsError::BadMessage(format!(
            "Finished: verify_data length {} (want {expected_len})",
            body.len()
        )));
    }
    Ok(body.to_vec())
}
