//! Post-quantum KEM parameter sets and server-side negotiation.
//!
//! A KEM is `(keypair, encapsulate, decapsulate)` over fixed-size keys and
//! ciphertexts. Parameter sets are static descriptors; the arithmetic
//! backend is pluggable and may be absent, in which case the set still
//! participates in negotiation tables but reports unavailable. The server
//! walks its own preference list and takes the first set the client claims
//! to support; the client's ordering never matters.

use crate::CipherSuite;
use ferrotls_types::TlsError;

/// KEM parameter-set identifier carried in the KEM extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KemId(pub u16);

impl KemId {
    pub const BIKE1_L1_R1: Self = Self(0x0001);
    pub const SIKE_P503_R1: Self = Self(0x000A);
    pub const BIKE1_L1_R2: Self = Self(0x000D);
    pub const SIKE_P434_R2: Self = Self(0x0010);
}

/// Arithmetic backend for one KEM parameter set.
pub trait KemBackend: Send + Sync {
    /// Returns `(public_key, secret_key)`.
    fn keypair(&self) -> Result<(Vec<u8>, Vec<u8>), TlsError>;
    /// Returns `(ciphertext, shared_secret)`.
    fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, Vec<u8>), TlsError>;
    /// Returns the shared secret.
    fn decapsulate(&self, secret_key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, TlsError>;
}

/// Static descriptor of one KEM parameter set.
pub struct Kem {
    pub id: KemId,
    pub name: &'static str,
    pub public_key_len: usize,
    pub secret_key_len: usize,
    pub ciphertext_len: usize,
    pub shared_secret_len: usize,
    /// Arithmetic implementation; `None` when not compiled in.
    pub backend: Option<&'static dyn KemBackend>,
}

impl std::fmt::Debug for Kem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("public_key_len", &self.public_key_len)
            .field("secret_key_len", &self.secret_key_len)
            .field("ciphertext_len", &self.ciphertext_len)
            .field("shared_secret_len", &self.shared_secret_len)
            .field("backend", &self.backend.map(|_| "<backend>"))
            .finish()
    }
}

impl Kem {
    /// Whether this parameter set can actually run key operations.
    pub fn available(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> Result<&'static dyn KemBackend, TlsError> {
        self.backend.ok_or(TlsError::KemUnsupportedParams)
    }

    pub fn generate_keypair(&self) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        let (public_key, secret_key) = self.backend()?.keypair()?;
        if public_key.len() != self.public_key_len || secret_key.len() != self.secret_key_len {
            return Err(TlsError::Internal("KEM backend size mismatch".into()));
        }
        Ok((public_key, secret_key))
    }

    pub fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        let (ciphertext, shared) = self.backend()?.encapsulate(public_key)?;
        if ciphertext.len() != self.ciphertext_len || shared.len() != self.shared_secret_len {
            return Err(TlsError::Internal("KEM backend size mismatch".into()));
        }
        Ok((ciphertext, shared))
    }

    pub fn decapsulate(&self, secret_key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, TlsError> {
        if ciphertext.len() != self.ciphertext_len {
            return Err(TlsError::BadMessage("KEM ciphertext length".into()));
        }
        let shared = self.backend()?.decapsulate(secret_key, ciphertext)?;
        if shared.len() != self.shared_secret_len {
            return Err(TlsError::Internal("KEM backend size mismatch".into()));
        }
        Ok(shared)
    }
}

pub static BIKE1_L1_R1: Kem = Kem {
    id: KemId::BIKE1_L1_R1,
    name: "BIKE1r1-Level1",
    public_key_len: 2542,
    secret_key_len: 3110,
    ciphertext_len: 2542,
    shared_secret_len: 32,
    backend: None,
};

pub static BIKE1_L1_R2: Kem = Kem {
    id: KemId::BIKE1_L1_R2,
    name: "BIKE1r2-Level1",
    public_key_len: 2946,
    secret_key_len: 6460,
    ciphertext_len: 2946,
    shared_secret_len: 32,
    backend: None,
};

pub static SIKE_P503_R1: Kem = Kem {
    id: KemId::SIKE_P503_R1,
    name: "SIKEp503r1",
    public_key_len: 378,
    secret_key_len: 434,
    ciphertext_len: 402,
    shared_secret_len: 16,
    backend: None,
};

pub static SIKE_P434_R2: Kem = Kem {
    id: KemId::SIKE_P434_R2,
    name: "SIKEp434r2",
    public_key_len: 330,
    secret_key_len: 374,
    ciphertext_len: 346,
    shared_secret_len: 16,
    backend: None,
};

/// Round-1-only server preference list.
pub static PQ_KEMS_R1: &[&Kem] = &[&BIKE1_L1_R1, &SIKE_P503_R1];

/// Round-2-preferred server preference list.
pub static PQ_KEMS_R1R2: &[&Kem] = &[
    &BIKE1_L1_R2,
    &BIKE1_L1_R1,
    &SIKE_P434_R2,
    &SIKE_P503_R1,
];

static BIKE_KEMS: &[&Kem] = &[&BIKE1_L1_R1, &BIKE1_L1_R2];
static SIKE_KEMS: &[&Kem] = &[&SIKE_P503_R1, &SIKE_P434_R2];

/// The parameter sets compatible with a hybrid cipher suite's KEM family.
pub fn suite_to_kems(suite: CipherSuite) -> Result<&'static [&'static Kem], TlsError> {
    match suite {
        CipherSuite::TLS_ECDHE_BIKE_RSA_WITH_AES_256_GCM_SHA384 => Ok(BIKE_KEMS),
        CipherSuite::TLS_ECDHE_SIKE_RSA_WITH_AES_256_GCM_SHA384 => Ok(SIKE_KEMS),
        _ => Err(TlsError::KemUnsupportedParams),
    }
}

fn compatible(suite: CipherSuite, kem: &Kem) -> bool {
    suite_to_kems(suite)
        .map(|family| family.iter().any(|k| k.id == kem.id))
        .unwrap_or(false)
}

/// Server-side selection against the client's offered list: the first entry
/// of `server_preferences` that the client offered and the suite permits.
pub fn find_supported_kem(
    suite: CipherSuite,
    client_kems: &[KemId],
    server_preferences: &[&'static Kem],
) -> Result<&'static Kem, TlsError> {
    for kem in server_preferences {
        if compatible(suite, kem) && client_kems.contains(&kem.id) {
            return Ok(kem);
        }
    }
    Err(TlsError::KemUnsupportedParams)
}

/// Selection when the client sent no KEM list: the server's most-preferred
/// set compatible with the suite.
pub fn choose_server_preferred_kem(
    suite: CipherSuite,
    server_preferences: &[&'static Kem],
) -> Result<&'static Kem, TlsError> {
    for kem in server_preferences {
        if compatible(suite, kem) {
            return Ok(kem);
        }
    }
    Err(TlsError::KemUnsupportedParams)
}
