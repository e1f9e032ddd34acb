//! Error taxonomy for the TLS engine.
//!
//! Every error carries a numeric code whose top bits encode its category,
//! so callers can classify an error (retryable, fatal protocol violation,
//! caller bug, ...) without matching on individual variants. A translation
//! table maps codes to human-readable strings per language tag.

/// Sentinel returned by [`strerror`] for an unknown language tag.
pub const UNKNOWN_LANGUAGE: &str = "language unsupported";

/// Coarse classification of an error, encoded in the top bits of its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    Ok = 0,
    Io = 1,
    /// Transient: retry the call after the transport becomes ready.
    Blocked = 2,
    Closed = 3,
    /// Peer violated the protocol; an alert is emitted best-effort.
    Protocol = 4,
    /// The caller misused the API; no alert is sent.
    Usage = 5,
    AlertSent = 6,
    AlertReceived = 7,
    Internal = 8,
}

/// Number of bits reserved for the per-category error index.
const CATEGORY_SHIFT: u32 = 26;

const fn code(category: ErrorCategory, index: u32) -> u32 {
    ((category as u32) << CATEGORY_SHIFT) | index
}

macro_rules! error_table {
    ($(($variant:ident, $category:ident, $index:expr, $en:expr);)*) => {
        impl TlsError {
            /// The category this error belongs to.
            pub fn category(&self) -> ErrorCategory {
                match self {
                    $(Self::$variant { .. } => ErrorCategory::$category,)*
                }
            }

            /// The numeric code: category in the top bits, index below.
            pub fn code(&self) -> u32 {
                match self {
                    $(Self::$variant { .. } => code(ErrorCategory::$category, $index),)*
                }
            }
        }

        /// English translation table, indexed by error code.
        static EN: &[(u32, &str)] = &[
            $((code(ErrorCategory::$category, $index), $en),)*
        ];
    };
}

/// TLS engine errors.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    // --- I/O ---
    #[error("underlying I/O operation failed: {0}")]
    Io(#[from] std::io::Error),

    // --- blocked (transient) ---
    #[error("underlying I/O operation would block on read")]
    WantRead,
    #[error("underlying I/O operation would block on write")]
    WantWrite,

    // --- closed ---
    #[error("connection is closed")]
    Closed,
    #[error("peer closed the transport before the handshake completed")]
    ClosedEarly,
    #[error("peer closed the transport without sending close_notify")]
    ClosedWithoutNotify,

    // --- protocol ---
    #[error("bad message encountered: {0}")]
    BadMessage(String),
    #[error("bad TLS record: {0}")]
    BadRecord(String),
    #[error("record MAC verification failed")]
    BadRecordMac,
    #[error("decrypt error")]
    DecryptError,
    #[error("unsupported protocol version")]
    ProtocolVersion,
    #[error("no shared cipher suite")]
    NoSharedCipherSuite,
    #[error("no supported application protocol to negotiate")]
    NoApplicationProtocol,
    #[error("no mutually supported KEM parameters")]
    KemUnsupportedParams,
    #[error("TLS record limit reached")]
    RecordLimit,
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("error verifying signature")]
    VerifySignature,

    // --- alerts ---
    #[error("fatal TLS alert sent: {0}")]
    AlertSent(u8),
    #[error("fatal TLS alert received: {0}")]
    AlertReceived(u8),

    // --- usage ---
    #[error("operation invalid in the current connection state")]
    InvalidState,
    #[error("server name is too long")]
    ServerNameTooLong,
    #[error("application protocol name is too long")]
    ApplicationProtocolTooLong,
    #[error("invalid cipher preference version")]
    InvalidCipherPreferences,
    #[error("null or empty input")]
    NullInput,
    #[error("buffer is out of data")]
    BufferOutOfData,
    #[error("buffer is full")]
    BufferFull,
    #[error("cannot resize a fixed buffer")]
    ResizeFixed,
    #[error("cannot resize a tainted buffer")]
    ResizeTainted,
    #[error("invalid PEM encountered")]
    InvalidPem,
    #[error("invalid base64 encountered")]
    InvalidBase64,
    #[error("no certificate found in PEM")]
    NoCertificateInPem,
    #[error("error decoding certificate")]
    DecodeCertificate,
    #[error("error decoding private key")]
    DecodePrivateKey,
    #[error("error parsing ASN.1 time")]
    InvalidAsn1Time,

    // --- internal ---
    #[error("error initializing encryption key")]
    KeyInit,
    #[error("error encrypting data")]
    Encrypt,
    #[error("error decrypting data")]
    Decrypt,
    #[error("error signing data")]
    Sign,
    #[error("entropy source failed")]
    Entropy,
    #[error("internal error: {0}")]
    Internal(String),
}

error_table! {
    (Io, Io, 1, "underlying I/O operation failed, check system errno");
    (WantRead, Blocked, 1, "underlying I/O operation would block on read");
    (WantWrite, Blocked, 2, "underlying I/O operation would block on write");
    (Closed, Closed, 1, "connection is closed");
    (ClosedEarly, Closed, 2, "peer closed before the handshake completed");
    (ClosedWithoutNotify, Closed, 3, "peer closed without sending close_notify");
    (BadMessage, Protocol, 1, "bad message encountered");
    (BadRecord, Protocol, 2, "bad TLS record");
    (BadRecordMac, Protocol, 3, "record MAC verification failed");
    (DecryptError, Protocol, 4, "decrypt error");
    (ProtocolVersion, Protocol, 5, "unsupported protocol version");
    (NoSharedCipherSuite, Protocol, 6, "no shared cipher suite");
    (NoApplicationProtocol, Protocol, 7, "no supported application protocol to negotiate");
    (KemUnsupportedParams, Protocol, 8, "no mutually supported KEM parameters");
    (RecordLimit, Protocol, 9, "TLS record limit reached");
    (HandshakeFailed, Protocol, 10, "handshake failed");
    (VerifySignature, Protocol, 11, "error verifying signature");
    (AlertSent, AlertSent, 1, "fatal TLS alert sent");
    (AlertReceived, AlertReceived, 1, "fatal TLS alert received");
    (InvalidState, Usage, 1, "operation invalid in the current connection state");
    (ServerNameTooLong, Usage, 2, "server name is too long");
    (ApplicationProtocolTooLong, Usage, 3, "application protocol name is too long");
    (InvalidCipherPreferences, Usage, 4, "invalid cipher preference version");
    (NullInput, Usage, 5, "null or empty input");
    (BufferOutOfData, Usage, 6, "buffer is out of data");
    (BufferFull, Usage, 7, "buffer is full");
    (ResizeFixed, Usage, 8, "cannot resize a fixed buffer");
    (ResizeTainted, Usage, 9, "cannot resize a tainted buffer");
    (InvalidPem, Usage, 10, "invalid PEM encountered");
    (InvalidBase64, Usage, 11, "invalid base64 encountered");
    (NoCertificateInPem, Usage, 12, "no certificate found in PEM");
    (DecodeCertificate, Usage, 13, "error decoding certificate");
    (DecodePrivateKey, Usage, 14, "error decoding private key");
    (InvalidAsn1Time, Usage, 15, "error parsing ASN.1 time");
    (KeyInit, Internal, 1, "error initializing encryption key");
    (Encrypt, Internal, 2, "error encrypting data");
    (Decrypt, Internal, 3, "error decrypting data");
    (Sign, Internal, 4, "error signing data");
    (Entropy, Internal, 5, "entropy source failed");
    (Internal, Internal, 6, "internal error");
}

impl TlsError {
    /// Returns true for transient errors the caller should retry after
    /// polling the transport in the indicated direction.
    pub fn is_blocked(&self) -> bool {
        self.category() == ErrorCategory::Blocked
    }
}

/// Translate an error code into a human-readable string.
///
/// Only the `"EN"` language tag is supported; any other tag yields
/// [`UNKNOWN_LANGUAGE`]. Unknown codes under a supported tag yield a fixed
/// fallback string.
pub fn strerror(code: u32, lang: &str) -> &'static str {
    if lang != "EN" {
        return UNKNOWN_LANGUAGE;
    }
    EN.iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| *s)
        .unwrap_or("unknown error code")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_simple_variants() {
        assert_eq!(TlsError::Closed.to_string(), "connection is closed");
        assert_eq!(
            TlsError::BadRecordMac.to_string(),
            "record MAC verification failed"
        );
        assert_eq!(
            TlsError::NoApplicationProtocol.to_string(),
            "no supported application protocol to negotiate"
        );
        assert_eq!(
            TlsError::KemUnsupportedParams.to_string(),
            "no mutually supported KEM parameters"
        );
    }

    #[test]
    fn test_display_structured_variants() {
        let e = TlsError::BadRecord("record too large".into());
        assert_eq!(e.to_string(), "bad TLS record: record too large");

        let e = TlsError::HandshakeFailed("no common group".into());
        assert_eq!(e.to_string(), "handshake failed: no common group");
    }

    #[test]
    fn test_category_partition() {
        assert_eq!(TlsError::WantRead.category(), ErrorCategory::Blocked);
        assert_eq!(TlsError::WantWrite.category(), ErrorCategory::Blocked);
        assert_eq!(TlsError::Closed.category(), ErrorCategory::Closed);
        assert_eq!(TlsError::BadRecordMac.category(), ErrorCategory::Protocol);
        assert_eq!(TlsError::InvalidState.category(), ErrorCategory::Usage);
        assert_eq!(TlsError::AlertSent(40).category(), ErrorCategory::AlertSent);
        assert_eq!(
            TlsError::AlertReceived(0).category(),
            ErrorCategory::AlertReceived
        );
        assert_eq!(
            TlsError::Internal("x".into()).category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_code_top_bits_encode_category() {
        let blocked = TlsError::WantRead.code();
        let protocol = TlsError::BadRecordMac.code();
        let usage = TlsError::BufferFull.code();
        assert_eq!(blocked >> 26, ErrorCategory::Blocked as u32);
        assert_eq!(protocol >> 26, ErrorCategory::Protocol as u32);
        assert_eq!(usage >> 26, ErrorCategory::Usage as u32);
        // Codes are unique across variants sharing nothing
        assert_ne!(blocked, protocol);
        assert_ne!(protocol, usage);
    }

    #[test]
    fn test_codes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for (code, _) in EN {
            assert!(seen.insert(*code), "duplicate error code {code:#x}");
        }
    }

    #[test]
    fn test_strerror_en() {
        assert_eq!(
            strerror(TlsError::Closed.code(), "EN"),
            "connection is closed"
        );
        assert_eq!(
            strerror(TlsError::WantWrite.code(), "EN"),
            "underlying I/O operation would block on write"
        );
        assert_eq!(
            strerror(TlsError::BufferOutOfData.code(), "EN"),
            "buffer is out of data"
        );
    }

    #[test]
    fn test_strerror_unknown_language() {
        assert_eq!(strerror(TlsError::Closed.code(), "FR"), UNKNOWN_LANGUAGE);
        assert_eq!(strerror(TlsError::Closed.code(), ""), UNKNOWN_LANGUAGE);
    }

    #[test]
    fn test_strerror_unknown_code() {
        assert_eq!(strerror(0xFFFF_FFFF, "EN"), "unknown error code");
    }

    #[test]
    fn test_is_blocked() {
        assert!(TlsError::WantRead.is_blocked());
        assert!(TlsError::WantWrite.is_blocked());
        assert!(!TlsError::Closed.is_blocked());
        assert!(!TlsError::BadRecordMac.is_blocked());
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let e: TlsError = io.into();
        assert_eq!(e.category(), ErrorCategory::Io);
        assert!(e.to_string().contains("pipe"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TlsError>();
    }
}
