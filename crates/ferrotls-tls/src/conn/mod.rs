//! The connection object: configuration, crypto banks, the handshake state
//! machine position, and the outer read/write API.
//!
//! A connection drives nonblocking transport halves supplied by the caller.
//! Every public operation is re-entrant on `WantRead`/`WantWrite`: all
//! record and message cursors live in the connection, so a call that
//! suspends on the transport resumes exactly where it left off, whether
//! that was mid-record-header, mid-body, or mid-flush of a half-written
//! flight.

mod client;
mod server;

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::alert::{Alert, AlertDescription};
use crate::buffer::ByteBuffer;
use crate::config::TlsConfig;
use crate::crypt::key_schedule::KeySchedule;
use crate::crypt::transcript::TranscriptHash;
use crate::crypt::{CipherSuiteParams, HashAlg, NamedGroup, Tls12CipherSuiteParams};
use crate::handshake::key_exchange::KeyExchange;
use crate::handshake::{HandshakeMessage, MessageReassembler};
use crate::record::{
    encode_record_header, parse_record_header, wire_version, ContentType, RecordCipher,
    RecordHeader, RECORD_HEADER_LEN,
};
use crate::{CipherSuite, TlsRole, TlsVersion};
use ferrotls_types::TlsError;
use zeroize::Zeroize;

/// Handshake state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsState {
    // Client
    SendClientHello,
    RecvServerHello,
    // Client, TLS 1.3
    RecvEncryptedExtensions,
    RecvServerCertificate13,
    RecvServerCertificateVerify,
    RecvServerFinished13,
    // Client, TLS 1.2 and earlier
    RecvServerCertificate,
    RecvServerKeyExchange,
    RecvServerHelloDone,
    RecvServerChangeCipherSpec,
    RecvServerFinished12,
    // Server
    RecvClientHello,
    // Server, TLS 1.3
    RecvClientFinished13,
    // Server, TLS 1.2 and earlier
    RecvClientKeyExchange,
    RecvClientChangeCipherSpec,
    RecvClientFinished12,
    // Terminal
    Connected,
}

/// An event surfaced to the handshake state machine.
pub(crate) enum HsEvent {
    Message(HandshakeMessage),
    ChangeCipherSpec,
}

/// Handshake-lifetime scratch state. Secret material is wiped on drop and
/// again when the handshake completes.
pub(crate) struct HandshakeData {
    pub transcript: TranscriptHash,
    pub reassembler: MessageReassembler,
    pub client_random: [u8; 32],
    pub server_random: [u8; 32],
    pub key_exchange: Option<KeyExchange>,
    pub params12: Option<Tls12CipherSuiteParams>,
    pub params13: Option<CipherSuiteParams>,
    pub key_schedule: Option<KeySchedule>,
    pub client_hs_secret: Vec<u8>,
    pub server_hs_secret: Vec<u8>,
    pub master_secret: Vec<u8>,
    /// Transcript hash snapshot the peer's Finished must authenticate.
    pub peer_finished_transcript: Vec<u8>,
    /// The peer certificate's P-256 public key.
    pub peer_public_key: Vec<u8>,
    /// Ephemeral key received from the peer (SKE or ClientKeyExchange).
    pub peer_kx_public: Vec<u8>,
    pub peer_kx_group: Option<NamedGroup>,
    pub client_cert_requested: bool,
}

impl Drop for HandshakeData {
    fn drop(&mut self) {
        self.client_hs_secret.zeroize();
        self.server_hs_secret.zeroize();
        self.master_secret.zeroize();
    }
}

impl HandshakeData {
    fn new() -> Self {
        Self {
            transcript: TranscriptHash::new(HashAlg::Sha256),
            reassembler: MessageReassembler::new(),
            client_random: [0u8; 32],
            server_random: [0u8; 32],
            key_exchange: None,
            params12: None,
            params13: None,
            key_schedule: None,
            client_hs_secret: Vec::new(),
            server_hs_secret: Vec::new(),
            master_secret: Vec::new(),
            peer_finished_transcript: Vec::new(),
            peer_public_key: Vec::new(),
            peer_kx_public: Vec::new(),
            peer_kx_group: None,
            client_cert_requested: false,
        }
    }

    /// Wipe secrets that are no longer needed once both banks are active.
    fn discard_secrets(&mut self) {
        self.client_hs_secret.zeroize();
        self.server_hs_secret.zeroize();
        self.master_secret.zeroize();
        self.client_hs_secret = Vec::new();
        self.server_hs_secret = Vec::new();
        self.master_secret = Vec::new();
        self.key_schedule = None;
        self.key_exchange = None;
    }
}

/// A TLS connection over caller-supplied nonblocking transport halves.
pub struct Connection<R: Read, W: Write> {
    reader: R,
    writer: W,
    role: TlsRole,
    config: Arc<TlsConfig>,

    // Version triplet: what the client advertised, what the server chose,
    // and what is in effect for the record layer.
    pub(crate) client_hello_version: Option<TlsVersion>,
    pub(crate) server_version: Option<TlsVersion>,
    pub(crate) active_version: Option<TlsVersion>,

    // Inbound record reassembly.
    header_in: ByteBuffer,
    body_in: ByteBuffer,
    current_header: Option<RecordHeader>,

    // Outbound wire staging with a flush cursor.
    out: ByteBuffer,

    // Active crypto banks, one per direction; pending banks await their
    // installation boundary.
    pub(crate) read_cipher: RecordCipher,
    pub(crate) write_cipher: RecordCipher,
    pub(crate) pending_read: Option<RecordCipher>,
    pub(crate) pending_write: Option<RecordCipher>,

    // Plaintext inbound queue and the two single-slot alert queues.
    plain_in: VecDeque<u8>,
    reader_alert: Option<Alert>,
    writer_alert: Option<Alert>,

    pub(crate) state: HsState,
    pub(crate) hs: HandshakeData,

    pub(crate) negotiated_suite: Option<CipherSuite>,
    pub(crate) app_protocol: Option<Vec<u8>>,
    pub(crate) peer_server_name: Option<String>,
    pub(crate) peer_certificates: Vec<Vec<u8>>,

    wire_bytes_in: u64,
    wire_bytes_out: u64,
    closing: AtomicBool,
    closed: AtomicBool,
    received_close_notify: bool,
}

impl<R: Read, W: Write> Connection<R, W> {
    /// Create a connection for the given role over distinct reader/writer
    /// transport halves (which may be two views of one socket).
    pub fn new(role: TlsRole, config: Arc<TlsConfig>, reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            role,
            config,
            client_hello_version: None,
            server_version: None,
            active_version: None,
            header_in: ByteBuffer::fixed(RECORD_HEADER_LEN),
            body_in: ByteBuffer::with_capacity(4096),
            current_header: None,
            out: ByteBuffer::with_capacity(4096),
            read_cipher: RecordCipher::Plaintext,
            write_cipher: RecordCipher::Plaintext,
            pending_read: None,
            pending_write: None,
            plain_in: VecDeque::new(),
            reader_alert: None,
            writer_alert: None,
            state: match role {
                TlsRole::Client => HsState::SendClientHello,
                TlsRole::Server => HsState::RecvClientHello,
            },
            hs: HandshakeData::new(),
            negotiated_suite: None,
            app_protocol: None,
            peer_server_name: None,
            peer_certificates: Vec::new(),
            wire_bytes_in: 0,
            wire_bytes_out: 0,
            closing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            received_close_notify: false,
        }
    }

    pub fn role(&self) -> TlsRole {
        self.role
    }

    pub fn config(&self) -> &TlsConfig {
        &self.config
    }

    /// The protocol version in effect, once negotiated.
    pub fn version(&self) -> Option<TlsVersion> {
        self.active_version
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.negotiated_suite
    }

    /// The ALPN protocol both sides agreed on, if any.
    pub fn application_protocol(&self) -> Option<&[u8]> {
        self.app_protocol.as_deref()
    }

    /// The SNI name received from the client (server side).
    pub fn server_name(&self) -> Option<&str> {
        self.peer_server_name.as_deref()
    }

    /// Peer certificate chain, DER, leaf first.
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.peer_certificates
    }

    pub fn wire_bytes_in(&self) -> u64 {
        self.wire_bytes_in
    }

    pub fn wire_bytes_out(&self) -> u64 {
        self.wire_bytes_out
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.state == HsState::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn set_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    // -----------------------------------------------------------------------
    // Transport plumbing
    // -----------------------------------------------------------------------

    fn read_transport(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        loop {
            match self.reader.read(buf) {
                Ok(n) => {
                    self.wire_bytes_in += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    return Err(TlsError::WantRead)
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.set_closed();
                    return Err(e.into());
                }
            }
        }
    }

    fn transport_eof(&mut self) -> TlsError {
        self.set_closed();
        if self.state == HsState::Connected {
            TlsError::ClosedWithoutNotify
        } else {
            TlsError::ClosedEarly
        }
    }

    /// Flush staged wire bytes. On would-block the cursor stays put and the
    /// call reports `WantWrite`.
    fn flush_out(&mut self) -> Result<(), TlsError> {
        while self.out.data_available() > 0 {
            match self.writer.write(self.out.peek()) {
                Ok(0) => {
                    self.set_closed();
                    return Err(TlsError::Io(std::io::ErrorKind::WriteZero.into()));
                }
                Ok(n) => {
                    self.wire_bytes_out += n as u64;
                    self.out.skip_read(n)?;
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    self.out.compact();
                    return Err(TlsError::WantWrite);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.set_closed();
                    return Err(e.into());
                }
            }
        }
        self.out.wipe();
        match self.writer.flush() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(TlsError::WantWrite),
            Err(e) => Err(e.into()),
        }
    }

    /// The record-header version for outbound records: {3,1} until a
    /// version is negotiated, then the in-effect version ({3,3} for 1.3).
    fn record_version(&self) -> u16 {
        wire_version(self.active_version)
    }

    /// Protect a fragment and stage it behind the flush cursor.
    pub(crate) fn queue_record(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<(), TlsError> {
        let version = self.record_version();
        let (outer_type, payload) = self.write_cipher.seal(content_type, version, plaintext)?;
        self.out
            .write_bytes(&encode_record_header(outer_type, version, payload.len()))?;
        self.out.write_bytes(&payload)?;
        Ok(())
    }

    /// Stage a handshake message and fold it into the transcript.
    pub(crate) fn queue_handshake(&mut self, msg: &[u8]) -> Result<(), TlsError> {
        self.hs.transcript.update(msg);
        self.queue_record(ContentType::Handshake, msg)
    }

    /// Read one record, decrypting under the active read bank. Suspends
    /// with `WantRead` when the transport runs dry mid-record.
    fn read_record(&mut self) -> Result<(ContentType, Vec<u8>), TlsError> {
        if self.current_header.is_none() {
            while self.header_in.data_available() < RECORD_HEADER_LEN {
                let mut tmp = [0u8; RECORD_HEADER_LEN];
                let want = RECORD_HEADER_LEN - self.header_in.data_available();
                let n = self.read_transport(&mut tmp[..want])?;
                if n == 0 {
                    return Err(self.transport_eof());
                }
                self.header_in.write_bytes(&tmp[..n])?;
            }
            let mut raw = [0u8; RECORD_HEADER_LEN];
            self.header_in.read_exact_into(&mut raw)?;
            self.header_in.wipe();
            self.current_header = Some(parse_record_header(&raw)?);
        }

        let header = match self.current_header {
            Some(h) => h,
            None => return Err(TlsError::Internal("record header state".into())),
        };

        while self.body_in.data_available() < header.length {
            let mut tmp = [0u8; 4096];
            let want = (header.length - self.body_in.data_available()).min(tmp.len());
            let n = self.read_transport(&mut tmp[..want])?;
            if n == 0 {
                return Err(self.transport_eof());
            }
            self.body_in.write_bytes(&tmp[..n])?;
        }

        let payload = self.body_in.read_bytes(header.length)?;
        self.body_in.wipe();
        self.current_header = None;

        let version = self.record_version();
        self.read_cipher.open(header.content_type, version, &payload)
    }

    /// Process an alert record. Warnings are absorbed; `close_notify` and
    /// fatal alerts close the connection.
    fn process_alert(&mut self, payload: &[u8]) -> Result<(), TlsError> {
        let alert = Alert::decode(payload)?;
        if alert.description == AlertDescription::CloseNotify {
            self.received_close_notify = true;
            self.set_closed();
            return Err(if self.state == HsState::Connected {
                TlsError::Closed
            } else {
                TlsError::ClosedEarly
            });
        }
        if alert.is_fatal() {
            self.set_closed();
            return Err(TlsError::AlertReceived(alert.description as u8));
        }
        Ok(())
    }

    /// Produce the next handshake event: a complete message, or a
    /// ChangeCipherSpec boundary (pre-1.3; the 1.3 compatibility dummy is
    /// swallowed here).
    pub(crate) fn next_handshake_event(&mut self) -> Result<HsEvent, TlsError> {
        loop {
            if let Some(msg) = self.hs.reassembler.next_message()? {
                return Ok(HsEvent::Message(msg));
            }
            let (content_type, payload) = self.read_record()?;
            match content_type {
                ContentType::Handshake => {
                    if payload.is_empty() {
                        return Err(TlsError::BadRecord("empty handshake record".into()));
                    }
                    self.hs.reassembler.push(&payload);
                }
                ContentType::ChangeCipherSpec => {
                    if payload.as_slice() != [1] {
                        return Err(TlsError::BadRecord("malformed ChangeCipherSpec".into()));
                    }
                    if self.active_version == Some(TlsVersion::Tls13) {
                        continue;
                    }
                    return Ok(HsEvent::ChangeCipherSpec);
                }
                ContentType::Alert => self.process_alert(&payload)?,
                ContentType::ApplicationData => {
                    return Err(TlsError::BadMessage(
                        "application data during handshake".into(),
                    ));
                }
            }
        }
    }

    /// Expect a handshake message, rejecting a stray ChangeCipherSpec.
    pub(crate) fn expect_handshake_message(&mut self) -> Result<HandshakeMessage, TlsError> {
        match self.next_handshake_event()? {
            HsEvent::Message(msg) => Ok(msg),
            HsEvent::ChangeCipherSpec => Err(TlsError::BadMessage(
                "unexpected ChangeCipherSpec".into(),
            )),
        }
    }

    /// Install the pending read bank (ChangeCipherSpec received, or the
    /// TLS 1.3 per-direction boundary).
    pub(crate) fn install_pending_read(&mut self) -> Result<(), TlsError> {
        match self.pending_read.take() {
            Some(cipher) => {
                self.read_cipher = cipher;
                Ok(())
            }
            None => Err(TlsError::BadMessage(
                "no pending read keys to install".into(),
            )),
        }
    }

    /// Install the pending write bank.
    pub(crate) fn install_pending_write(&mut self) -> Result<(), TlsError> {
        match self.pending_write.take() {
            Some(cipher) => {
                self.write_cipher = cipher;
                Ok(())
            }
            None => Err(TlsError::BadMessage(
                "no pending write keys to install".into(),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Failure paths
    // -----------------------------------------------------------------------

    /// The alert a fatal error translates to, if one should be sent at all.
    fn alert_for(err: &TlsError) -> Option<AlertDescription> {
        match err {
            TlsError::BadRecordMac => Some(AlertDescription::BadRecordMac),
            TlsError::DecryptError | TlsError::VerifySignature => {
                Some(AlertDescription::DecryptError)
            }
            TlsError::ProtocolVersion => Some(AlertDescription::ProtocolVersion),
            TlsError::NoSharedCipherSuite | TlsError::HandshakeFailed(_) => {
                Some(AlertDescription::HandshakeFailure)
            }
            TlsError::NoApplicationProtocol => Some(AlertDescription::NoApplicationProtocol),
            TlsError::KemUnsupportedParams => Some(AlertDescription::HandshakeFailure),
            TlsError::BadMessage(_) => Some(AlertDescription::DecodeError),
            TlsError::BadRecord(_) => Some(AlertDescription::DecodeError),
            TlsError::RecordLimit => Some(AlertDescription::InternalError),
            TlsError::Internal(_) | TlsError::KeyInit | TlsError::Encrypt | TlsError::Decrypt => {
                Some(AlertDescription::InternalError)
            }
            // Blocked, closed, alert, usage, and I/O errors never alert
            _ => None,
        }
    }

    /// Queue a fatal alert through the reader-side slot and push it out
    /// with a single best-effort flush; a blocked transport never stalls
    /// the failure path.
    fn send_alert_best_effort(&mut self, alert: Alert) {
        if self.reader_alert.is_none() {
            self.reader_alert = Some(alert);
        }
        let Some(alert) = self.reader_alert.take() else {
            return;
        };
        if self.queue_record(ContentType::Alert, &alert.encode()).is_ok() {
            let _ = self.flush_out();
        }
    }

    fn fatal(&mut self, err: TlsError) -> TlsError {
        if let Some(desc) = Self::alert_for(&err) {
            self.send_alert_best_effort(Alert::fatal(desc));
        }
        self.set_closed();
        err
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// Drive the handshake. Returns `Ok(())` once the connection is ready
    /// for application data; `WantRead`/`WantWrite` ask the caller to poll
    /// the transport and call again.
    pub fn negotiate(&mut self) -> Result<(), TlsError> {
        if self.is_closed() {
            return Err(TlsError::Closed);
        }
        loop {
            self.flush_out()?;
            if self.state == HsState::Connected {
                return Ok(());
            }
            let step = match self.role {
                TlsRole::Client => self.client_step(),
                TlsRole::Server => self.server_step(),
            };
            match step {
                Ok(()) => continue,
                Err(e) if e.is_blocked() => return Err(e),
                Err(e) => return Err(self.fatal(e)),
            }
        }
    }

    /// Encrypt and send application data. Returns the number of plaintext
    /// bytes accepted; `WantWrite` only when nothing could be accepted.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize, TlsError> {
        if self.state != HsState::Connected {
            return Err(TlsError::InvalidState);
        }
        if self.is_closed() || self.closing.load(Ordering::Acquire) {
            return Err(TlsError::Closed);
        }

        // Finish any partially flushed record before accepting new bytes
        match self.flush_out() {
            Ok(()) => {}
            Err(TlsError::WantWrite) if !payload.is_empty() => return Err(TlsError::WantWrite),
            Err(e) => return Err(e),
        }

        let mut accepted = 0;
        while accepted < payload.len() {
            let fragment_len = self
                .write_cipher
                .max_plaintext()
                .min(payload.len() - accepted);
            self.queue_record(
                ContentType::ApplicationData,
                &payload[accepted..accepted + fragment_len],
            )?;
            accepted += fragment_len;
            match self.flush_out() {
                Ok(()) => {}
                // The fragment is committed and will drain on a later call
                Err(TlsError::WantWrite) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(accepted)
    }

    /// Receive decrypted application data. `Ok(0)` means the peer closed
    /// the stream cleanly.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        if self.state != HsState::Connected {
            return Err(TlsError::InvalidState);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if !self.plain_in.is_empty() {
                let n = buf.len().min(self.plain_in.len());
                for slot in buf.iter_mut().take(n) {
                    if let Some(b) = self.plain_in.pop_front() {
                        *slot = b;
                    }
                }
                return Ok(n);
            }
            if self.received_close_notify || self.is_closed() {
                return Ok(0);
            }

            let (content_type, payload) = match self.read_record() {
                Ok(record) => record,
                Err(e) if e.is_blocked() => return Err(e),
                Err(
                    e @ (TlsError::Closed
                    | TlsError::ClosedEarly
                    | TlsError::ClosedWithoutNotify
                    | TlsError::Io(_)),
                ) => return Err(e),
                // Record-layer violations alert before closing
                Err(e) => return Err(self.fatal(e)),
            };
            match content_type {
                ContentType::ApplicationData => {
                    self.plain_in.extend(payload.iter());
                }
                ContentType::Alert => match self.process_alert(&payload) {
                    Ok(()) => continue,
                    Err(TlsError::Closed) => return Ok(0),
                    Err(e) => return Err(e),
                },
                ContentType::Handshake => {
                    // Post-handshake traffic: session tickets are absorbed
                    // (resumption is not offered), anything else is fatal.
                    self.hs.reassembler.push(&payload);
                    while let Some(msg) = self.hs.reassembler.next_message()? {
                        if msg.msg_type != crate::handshake::HandshakeType::NewSessionTicket {
                            return Err(self.fatal(TlsError::BadMessage(format!(
                                "unexpected post-handshake message {:?}",
                                msg.msg_type
                            ))));
                        }
                    }
                }
                ContentType::ChangeCipherSpec => {
                    return Err(self
                        .fatal(TlsError::BadMessage("ChangeCipherSpec after handshake".into())));
                }
            }
        }
    }

    /// Graceful shutdown: queue `close_notify` once, then flush. The
    /// connection is marked closing immediately and closed once the alert
    /// has left the staging buffer; the peer's response is not awaited.
    pub fn shutdown(&mut self) -> Result<(), TlsError> {
        if self.is_closed() {
            return Ok(());
        }
        if !self.closing.swap(true, Ordering::AcqRel) {
            self.writer_alert = Some(Alert::close_notify());
        }
        if let Some(alert) = self.writer_alert.take() {
            if let Err(e) = self.queue_record(ContentType::Alert, &alert.encode()) {
                self.set_closed();
                return Err(e);
            }
        }
        match self.flush_out() {
            Ok(()) => {
                self.set_closed();
                Ok(())
            }
            Err(TlsError::WantWrite) => Err(TlsError::WantWrite),
            Err(e) => {
                self.set_closed();
                Err(e)
            }
        }
    }

    /// Finish the handshake bookkeeping once both banks are installed.
    pub(crate) fn handshake_complete(&mut self) {
        self.state = HsState::Connected;
        self.hs.discard_secrets();
    }

    // -----------------------------------------------------------------------
    // Crypto bank construction
    // -----------------------------------------------------------------------

    /// Build a TLS 1.3 record protection from a traffic secret.
    pub(crate) fn make_cipher13(
        &self,
        params: &CipherSuiteParams,
        traffic_secret: &[u8],
    ) -> Result<RecordCipher, TlsError> {
        let keys = crate::crypt::traffic_keys::TrafficKeys::derive(params, traffic_secret)?;
        Ok(RecordCipher::Aead13(crate::record::aead13::Aead13::new(
            params.suite,
            &keys,
        )?))
    }

    /// Build one direction's pre-1.3 record protection from its key-block
    /// slice.
    fn make_cipher12(
        params: &Tls12CipherSuiteParams,
        version: TlsVersion,
        keys: &crate::crypt::key_schedule12::DirectionKeys,
    ) -> Result<RecordCipher, TlsError> {
        if params.is_cbc {
            let chain_iv = if version == TlsVersion::Tls10 {
                Some(keys.iv.clone())
            } else {
                None
            };
            Ok(RecordCipher::Cbc(crate::record::cbc::CbcCipher::new(
                &keys.key,
                keys.mac_key.clone(),
                params.mac_hash,
                chain_iv,
            )?))
        } else {
            // An empty explicit-nonce length distinguishes the XOR form
            let (form, chacha) = if params.record_iv_len == 0 {
                (crate::record::aead12::NonceForm::Xor, true)
            } else {
                (crate::record::aead12::NonceForm::Explicit, false)
            };
            Ok(RecordCipher::Aead12(crate::record::aead12::Aead12::new(
                &keys.key,
                keys.iv.clone(),
                form,
                chacha,
            )?))
        }
    }

    /// Run the pre-1.3 key schedule and park both directions' ciphers in
    /// the pending banks, awaiting their ChangeCipherSpec boundaries.
    pub(crate) fn derive_banks12(&mut self, pre_master: &[u8]) -> Result<(), TlsError> {
        let params = self
            .hs
            .params12
            .clone()
            .ok_or_else(|| TlsError::Internal("missing suite params".into()))?;
        let version = self.active_version.ok_or(TlsError::ProtocolVersion)?;
        let prf_hash = params.prf_hash_for(version);

        let master = crate::crypt::key_schedule12::derive_master_secret(
            prf_hash,
            pre_master,
            &self.hs.client_random,
            &self.hs.server_random,
        )?;
        let key_block = crate::crypt::key_schedule12::derive_key_block(
            &params,
            version,
            &master,
            &self.hs.client_random,
            &self.hs.server_random,
        )?;
        self.hs.master_secret = master;

        // client-write keys protect client-to-server records
        let (read_keys, write_keys) = match self.role {
            TlsRole::Client => (&key_block.server, &key_block.client),
            TlsRole::Server => (&key_block.client, &key_block.server),
        };
        self.pending_read = Some(Self::make_cipher12(&params, version, read_keys)?);
        self.pending_write = Some(Self::make_cipher12(&params, version, write_keys)?);
        Ok(())
    }

    /// Pre-1.3 Finished verify_data over a transcript hash snapshot.
    pub(crate) fn verify_data12(
        &self,
        from_server: bool,
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        let params = self
            .hs
            .params12
            .as_ref()
            .ok_or_else(|| TlsError::Internal("missing suite params".into()))?;
        let version = self.active_version.ok_or(TlsError::ProtocolVersion)?;
        crate::crypt::key_schedule12::finished_verify_data(
            params.prf_hash_for(version),
            &self.hs.master_secret,
            transcript_hash,
            from_server,
        )
    }
}
