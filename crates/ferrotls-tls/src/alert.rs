//! TLS alert protocol: the two-byte (level, description) records.

use ferrotls_types::TlsError;

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

/// Alert description codes (RFC 5246 §7.2, RFC 8446 §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    RecordOverflow = 22,
    DecompressionFailure = 30,
    HandshakeFailure = 40,
    BadCertificate = 42,
    UnsupportedCertificate = 43,
    CertificateRevoked = 44,
    CertificateExpired = 45,
    CertificateUnknown = 46,
    IllegalParameter = 47,
    UnknownCa = 48,
    AccessDenied = 49,
    DecodeError = 50,
    DecryptError = 51,
    ProtocolVersion = 70,
    InsufficientSecurity = 71,
    InternalError = 80,
    UserCanceled = 90,
    NoRenegotiation = 100,
    MissingExtension = 109,
    UnsupportedExtension = 110,
    UnrecognizedName = 112,
    UnknownPskIdentity = 115,
    CertificateRequired = 116,
    NoApplicationProtocol = 120,
}

impl AlertDescription {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        use AlertDescription::*;
        match v {
            0 => Ok(CloseNotify),
            10 => Ok(UnexpectedMessage),
            20 => Ok(BadRecordMac),
            22 => Ok(RecordOverflow),
            30 => Ok(DecompressionFailure),
            40 => Ok(HandshakeFailure),
            42 => Ok(BadCertificate),
            43 => Ok(UnsupportedCertificate),
            44 => Ok(CertificateRevoked),
            45 => Ok(CertificateExpired),
            46 => Ok(CertificateUnknown),
            47 => Ok(IllegalParameter),
            48 => Ok(UnknownCa),
            49 => Ok(AccessDenied),
            50 => Ok(DecodeError),
            51 => Ok(DecryptError),
            70 => Ok(ProtocolVersion),
            71 => Ok(InsufficientSecurity),
            80 => Ok(InternalError),
            90 => Ok(UserCanceled),
            100 => Ok(NoRenegotiation),
            109 => Ok(MissingExtension),
            110 => Ok(UnsupportedExtension),
            112 => Ok(UnrecognizedName),
            115 => Ok(UnknownPskIdentity),
            116 => Ok(CertificateRequired),
            120 => Ok(NoApplicationProtocol),
            _ => Err(v),
        }
    }
}

impl AlertLevel {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            1 => Ok(AlertLevel::Warning),
            2 => Ok(AlertLevel::Fatal),
            _ => Err(v),
        }
    }
}

/// A TLS alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub fn fatal(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub fn warning(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Warning,
            description,
        }
    }

    pub fn close_notify() -> Self {
        Self::warning(AlertDescription::CloseNotify)
    }

    pub fn encode(&self) -> [u8; 2] {
        [self.level as u8, self.description as u8]
    }

    /// Decode a two-byte alert body. Unknown descriptions are a decode
    /// failure; records shorter than two bytes were already rejected by the
    /// record layer reassembly.
    pub fn decode(body: &[u8]) -> Result<Self, TlsError> {
        if body.len() != 2 {
            return Err(TlsError::BadMessage("alert must be two bytes".into()));
        }
        let level = AlertLevel::from_u8(body[0])
            .map_err(|v| TlsError::BadMessage(format!("unknown alert level {v}")))?;
        let description = AlertDescription::from_u8(body[1])
            .map_err(|v| TlsError::BadMessage(format!("unknown alert description {v}")))?;
        Ok(Self { level, description })
    }

    pub fn is_fatal(&self) -> bool {
        self.level == AlertLevel::Fatal
    }
}
