//! Extension encoding, parsing, and negotiation helpers.
//!
//! Extensions travel as `(type:u16, len:u16, body[len])` tuples inside a
//! length-prefixed list. Unknown types are skipped on receive; a repeated
//! type is a protocol violation.

use super::kem::KemId;
use crate::crypt::{NamedGroup, SignatureScheme};
use crate::extensions::{Extension, ExtensionType};
use ferrotls_types::TlsError;

/// Longest server name we will encode or accept.
pub const MAX_SERVER_NAME_LEN: usize = 255;

/// Longest single ALPN protocol name.
pub const MAX_PROTOCOL_NAME_LEN: usize = 255;

/// Encode a list of extensions with its 2-byte total length prefix.
pub fn encode_extensions(exts: &[Extension]) -> Vec<u8> {
    let mut body = Vec::new();
    for ext in exts {
        body.extend_from_slice(&ext.extension_type.0.to_be_bytes());
        body.extend_from_slice(&(ext.data.len() as u16).to_be_bytes());
        body.extend_from_slice(&ext.data);
    }
    let mut out = Vec::with_capacity(2 + body.len());
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

/// Parse a length-prefixed extension list; rejects duplicates and any
/// length that overflows the enclosing data.
pub fn parse_extensions(data: &[u8]) -> Result<Vec<Extension>, TlsError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < 2 {
        return Err(TlsError::BadMessage("extension list truncated".into()));
    }
    let total = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() != 2 + total {
        return Err(TlsError::BadMessage("extension list length mismatch".into()));
    }

    let mut exts = Vec::new();
    let mut pos = 2;
    while pos < data.len() {
        if data.len() - pos < 4 {
            return Err(TlsError::BadMessage("extension header truncated".into()));
        }
        let ext_type = ExtensionType(u16::from_be_bytes([data[pos], data[pos + 1]]));
        let ext_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;
        if data.len() - pos < ext_len {
            return Err(TlsError::BadMessage("extension body truncated".into()));
        }
        if exts.iter().any(|e: &Extension| e.extension_type == ext_type) {
            return Err(TlsError::BadMessage(format!(
                "duplicate extension {}",
                ext_type.0
            )));
        }
        exts.push(Extension::new(ext_type, data[pos..pos + ext_len].to_vec()));
        pos += ext_len;
    }
    Ok(exts)
}

/// Find one extension by type.
pub fn find_extension(exts: &[Extension], ty: ExtensionType) -> Option<&Extension> {
    exts.iter().find(|e| e.extension_type == ty)
}

// ---------------------------------------------------------------------------
// server_name (RFC 6066 §3)
// ---------------------------------------------------------------------------

/// `list_len:u16 || name_type:u8(0) || name_len:u16 || name`.
pub fn build_server_name(name: &str) -> Result<Extension, TlsError> {
    if name.is_empty() || name.len() > MAX_SERVER_NAME_LEN {
        return Err(TlsError::ServerNameTooLong);
    }
    let mut data = Vec::with_capacity(5 + name.len());
    data.extend_from_slice(&((name.len() + 3) as u16).to_be_bytes());
    data.push(0); // host_name
    data.extend_from_slice(&(name.len() as u16).to_be_bytes());
    data.extend_from_slice(name.as_bytes());
    Ok(Extension::new(ExtensionType::SERVER_NAME, data))
}

/// Extract the first host_name entry.
pub fn parse_server_name(data: &[u8]) -> Result<String, TlsError> {
    if data.len() < 5 {
        return Err(TlsError::BadMessage("server_name truncated".into()));
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if list_len + 2 != data.len() || data[2] != 0 {
        return Err(TlsError::BadMessage("malformed server_name".into()));
    }
    let name_len = u16::from_be_bytes([data[3], data[4]]) as usize;
    if name_len > MAX_SERVER_NAME_LEN || data.len() < 5 + name_len {
        return Err(TlsError::BadMessage("server_name length invalid".into()));
    }
    String::from_utf8(data[5..5 + name_len].to_vec())
        .map_err(|_| TlsError::BadMessage("server_name is not UTF-8".into()))
}

// ---------------------------------------------------------------------------
// application_layer_protocol_negotiation (RFC 7301)
// ---------------------------------------------------------------------------

/// `list_len:u16 || (name_len:u8 || name)*`.
pub fn build_alpn(protocols: &[Vec<u8>]) -> Result<Extension, TlsError> {
    let mut list = Vec::new();
    for p in protocols {
        if p.is_empty() || p.len() > MAX_PROTOCOL_NAME_LEN {
            return Err(TlsError::ApplicationProtocolTooLong);
        }
        list.push(p.len() as u8);
        list.extend_from_slice(p);
    }
    let mut data = Vec::with_capacity(2 + list.len());
    data.extend_from_slice(&(list.len() as u16).to_be_bytes());
    data.extend_from_slice(&list);
    Ok(Extension::new(
        ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION,
        data,
    ))
}

pub fn parse_alpn(data: &[u8]) -> Result<Vec<Vec<u8>>, TlsError> {
    if data.len() < 2 {
        return Err(TlsError::BadMessage("ALPN list truncated".into()));
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if list_len + 2 != data.len() {
        return Err(TlsError::BadMessage("ALPN list length mismatch".into()));
    }
    let mut names = Vec::new();
    let mut pos = 2;
    while pos < data.len() {
        let name_len = data[pos] as usize;
        pos += 1;
        if name_len == 0 || data.len() - pos < name_len {
            return Err(TlsError::BadMessage("ALPN name length invalid".into()));
        }
        names.push(data[pos..pos + name_len].to_vec());
        pos += name_len;
    }
    Ok(names)
}

/// Server-side ALPN selection: walk the server's preference list and pick
/// the first entry the client offered. The server's order wins.
pub fn select_alpn<'a>(
    server_preferences: &'a [Vec<u8>],
    client_offers: &[Vec<u8>],
) -> Result<&'a [u8], TlsError> {
    for preferred in server_preferences {
        if client_offers.iter().any(|o| o == preferred) {
            return Ok(preferred);
        }
    }
    Err(TlsError::NoApplicationProtocol)
}

// ---------------------------------------------------------------------------
// supported_versions (RFC 8446 §4.2.1)
// ---------------------------------------------------------------------------

/// ClientHello form: `len:u8 || version:u16*`.
pub fn build_supported_versions_client(versions: &[u16]) -> Extension {
    let mut data = Vec::with_capacity(1 + versions.len() * 2);
    data.push((versions.len() * 2) as u8);
    for v in versions {
        data.extend_from_slice(&v.to_be_bytes());
    }
    Extension::new(ExtensionType::SUPPORTED_VERSIONS, data)
}

/// ServerHello form: the single selected version.
pub fn build_supported_versions_server(version: u16) -> Extension {
    Extension::new(ExtensionType::SUPPORTED_VERSIONS, version.to_be_bytes().to_vec())
}

pub fn parse_supported_versions_client(data: &[u8]) -> Result<Vec<u16>, TlsError> {
    if data.is_empty() || data[0] as usize != data.len() - 1 || data[0] % 2 != 0 {
        return Err(TlsError::BadMessage("supported_versions malformed".into()));
    }
    Ok(data[1..]
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect())
}

pub fn parse_supported_versions_server(data: &[u8]) -> Result<u16, TlsError> {
    if data.len() != 2 {
        return Err(TlsError::BadMessage("supported_versions malformed".into()));
    }
    Ok(u16::from_be_bytes([data[0], data[1]]))
}

// ---------------------------------------------------------------------------
// supported_groups (RFC 8422 / RFC 8446 §4.2.7)
// ---------------------------------------------------------------------------

pub fn build_supported_groups(groups: &[NamedGroup]) -> Extension {
    let mut data = Vec::with_capacity(2 + groups.len() * 2);
    data.extend_from_slice(&((groups.len() * 2) as u16).to_be_bytes());
    for g in groups {
        data.extend_from_slice(&g.0.to_be_bytes());
    }
    Extension::new(ExtensionType::SUPPORTED_GROUPS, data)
}

pub fn parse_supported_groups(data: &[u8]) -> Result<Vec<NamedGroup>, TlsError> {
    if data.len() < 2 {
        return Err(TlsError::BadMessage("supported_groups truncated".into()));
    }
    let len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if len + 2 != data.len() || len % 2 != 0 {
        return Err(TlsError::BadMessage("supported_groups malformed".into()));
    }
    Ok(data[2..]
        .chunks_exact(2)
        .map(|c| NamedGroup(u16::from_be_bytes([c[0], c[1]])))
        .collect())
}

// ---------------------------------------------------------------------------
// signature_algorithms (RFC 8446 §4.2.3)
// ---------------------------------------------------------------------------

pub fn build_signature_algorithms(schemes: &[SignatureScheme]) -> Extension {
    let mut data = Vec::with_capacity(2 + schemes.len() * 2);
    data.extend_from_slice(&((schemes.len() * 2) as u16).to_be_bytes());
    for s in schemes {
        data.extend_from_slice(&s.0.to_be_bytes());
    }
    Extension::new(ExtensionType::SIGNATURE_ALGORITHMS, data)
}

pub fn parse_signature_algorithms(data: &[u8]) -> Result<Vec<SignatureScheme>, TlsError> {
    if data.len() < 2 {
        return Err(TlsError::BadMessage("signature_algorithms truncated".into()));
    }
    let len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if len + 2 != data.len() || len % 2 != 0 {
        return Err(TlsError::BadMessage("signature_algorithms malformed".into()));
    }
    Ok(data[2..]
        .chunks_exact(2)
        .map(|c| SignatureScheme(u16::from_be_bytes([c[0], c[1]])))
        .collect())
}

// ---------------------------------------------------------------------------
// key_share (RFC 8446 §4.2.8)
// ---------------------------------------------------------------------------

/// One key-share entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    pub group: NamedGroup,
    pub key_exchange: Vec<u8>,
}

/// ClientHello form: `list_len:u16 || (group:u16 || len:u16 || key)*`.
pub fn build_key_share_client(entries: &[KeyShareEntry]) -> Extension {
    let mut list = Vec::new();
    for e in entries {
        list.extend_from_slice(&e.group.0.to_be_bytes());
        list.extend_from_slice(&(e.key_exchange.len() as u16).to_be_bytes());
        list.extend_from_slice(&e.key_exchange);
    }
    let mut data = Vec::with_capacity(2 + list.len());
    data.extend_from_slice(&(list.len() as u16).to_be_bytes());
    data.extend_from_slice(&list);
    Extension::new(ExtensionType::KEY_SHARE, data)
}

/// ServerHello form: a single entry, no list prefix.
pub fn build_key_share_server(entry: &KeyShareEntry) -> Extension {
    let mut data = Vec::with_capacity(4 + entry.key_exchange.len());
    data.extend_from_slice(&entry.group.0.to_be_bytes());
    data.extend_from_slice(&(entry.key_exchange.len() as u16).to_be_bytes());
    data.extend_from_slice(&entry.key_exchange);
    Extension::new(ExtensionType::KEY_SHARE, data)
}

pub fn parse_key_share_client(data: &[u8]) -> Result<Vec<KeyShareEntry>, TlsError> {
    if data.len() < 2 {
        return Err(TlsError::BadMessage("key_share truncated".into()));
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if list_len + 2 != data.len() {
        return Err(TlsError::BadMessage("key_share length mismatch".into()));
    }
    let mut entries = Vec::new();
    let mut pos = 2;
    while pos < data.len() {
        if data.len() - pos < 4 {
            return Err(TlsError::BadMessage("key_share entry truncated".into()));
        }
        let group = NamedGroup(u16::from_be_bytes([data[pos], data[pos + 1]]));
        let key_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;
        if data.len() - pos < key_len {
            return Err(TlsError::BadMessage("key_share key truncated".into()));
        }
        entries.push(KeyShareEntry {
            group,
            key_exchange: data[pos..pos + key_len].to_vec(),
        });
        pos += key_len;
    }
    Ok(entries)
}

pub fn parse_key_share_server(data: &[u8]) -> Result<KeyShareEntry, TlsError> {
    if data.len() < 4 {
        return Err(TlsError::BadMessage("key_share truncated".into()));
    }
    let group = NamedGroup(u16::from_be_bytes([data[0], data[1]]));
    let key_len = u16::from_be_bytes([data[2], data[3]]) as usize;
    if data.len() != 4 + key_len {
        return Err(TlsError::BadMessage("key_share length mismatch".into()));
    }
    Ok(KeyShareEntry {
        group,
        key_exchange: data[4..].to_vec(),
    })
}

// ---------------------------------------------------------------------------
// status_request (RFC 6066 §8)
// ---------------------------------------------------------------------------

/// OCSP status request: `status_type:u8(1) || responder_ids:u16(0) || exts:u16(0)`.
pub fn build_status_request() -> Extension {
    Extension::new(ExtensionType::STATUS_REQUEST, vec![1, 0, 0, 0, 0])
}

/// Returns true if the extension asks for OCSP stapling.
pub fn parse_status_request(data: &[u8]) -> bool {
    data.first() == Some(&1)
}

// ---------------------------------------------------------------------------
// KEM parameter negotiation (draft PQ extension)
// ---------------------------------------------------------------------------

/// `list_len:u16 || kem_id:u16*`.
pub fn build_kem_parameters(kems: &[KemId]) -> Extension {
    let mut data = Vec::with_capacity(2 + kems.len() * 2);
    data.extend_from_slice(&((kems.len() * 2) as u16).to_be_bytes());
    for k in kems {
        data.extend_from_slice(&k.0.to_be_bytes());
    }
    Extension::new(ExtensionType::KEM_PARAMETERS, data)
}

pub fn parse_kem_parameters(data: &[u8]) -> Result<Vec<KemId>, TlsError> {
    if data.len() < 2 {
        return Err(TlsError::BadMessage("kem_parameters truncated".into()));
    }
    let len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if len + 2 != data.len() || len % 2 != 0 {
        return Err(TlsError::BadMessage("kem_parameters malformed".into()));
    }
    Ok(data[2..]
        .chunks_exact(2)
        .map(|c| KemId(u16::from_be_bytes([c[0], c[1]])))
        .collect())
}
