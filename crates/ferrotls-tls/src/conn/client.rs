//! Client-side handshake state machine.

use std::io::{Read, Write};

use subtle::ConstantTimeEq;

use super::{Connection, HsEvent, HsState};
use crate::crypt::key_schedule::KeySchedule;
use crate::crypt::{CipherSuiteParams, HashAlg, Tls12CipherSuiteParams};
use crate::extensions::ExtensionType;
use crate::handshake::codec::{
    decode_certificate13, decode_certificate_verify, decode_finished, decode_server_hello,
    encode_client_hello, encode_finished, ClientHello,
};
use crate::handshake::codec12::{
    decode_certificate12, decode_certificate_request, decode_server_hello_done,
    decode_server_key_exchange, encode_certificate12, encode_client_key_exchange,
    encode_ske_params,
};
use crate::handshake::extensions_codec::{
    build_alpn, build_key_share_client, build_server_name, build_signature_algorithms,
    build_status_request, build_supported_groups, build_supported_versions_client,
    find_extension, parse_alpn, parse_key_share_server, parse_supported_versions_server,
    KeyShareEntry,
};
use crate::handshake::key_exchange::KeyExchange;
use crate::handshake::signing::{
    build_ske_content, extract_p256_public_key, verify_certificate_verify, verify_content,
};
use crate::handshake::HandshakeType;
use crate::crypt::{NamedGroup, SignatureScheme};
use crate::record::ContentType;
use crate::{TlsError, TlsVersion};

impl<R: Read, W: Write> Connection<R, W> {
    /// Advance the client state machine by one step.
    pub(crate) fn client_step(&mut self) -> Result<(), TlsError> {
        match self.state {
            HsState::SendClientHello => self.client_send_hello(),
            HsState::RecvServerHello => self.client_recv_server_hello(),
            HsState::RecvEncryptedExtensions => self.client_recv_encrypted_extensions(),
            HsState::RecvServerCertificate13 => self.client_recv_certificate13(),
            HsState::RecvServerCertificateVerify => self.client_recv_certificate_verify(),
            HsState::RecvServerFinished13 => self.client_recv_server_finished13(),
            HsState::RecvServerCertificate => self.client_recv_certificate12(),
            HsState::RecvServerKeyExchange => self.client_recv_server_key_exchange(),
            HsState::RecvServerHelloDone => self.client_recv_server_hello_done(),
            HsState::RecvServerChangeCipherSpec => self.client_recv_ccs(),
            HsState::RecvServerFinished12 => self.client_recv_server_finished12(),
            _ => Err(TlsError::InvalidState),
        }
    }

    fn client_send_hello(&mut self) -> Result<(), TlsError> {
        let config = self.config.clone();
        getrandom::getrandom(&mut self.hs.client_random).map_err(|_| TlsError::Entropy)?;

        let offer_tls13 = config.max_version == TlsVersion::Tls13;
        let offer_legacy = config.min_version < TlsVersion::Tls13;

        // Middlebox-tolerant legacy session id when offering 1.3
        let session_id = if offer_tls13 {
            let mut sid = vec![0u8; 32];
            getrandom::getrandom(&mut sid).map_err(|_| TlsError::Entropy)?;
            sid
        } else {
            Vec::new()
        };

        let cipher_suites: Vec<_> = config
            .cipher_suites
            .iter()
            .copied()
            .filter(|s| {
                (offer_tls13 && CipherSuiteParams::from_suite(*s).is_ok())
                    || (offer_legacy
                        && Tls12CipherSuiteParams::from_suite(*s)
                            .map(|p| p.min_version <= config.max_version)
                            .unwrap_or(false))
            })
            .collect();
        if cipher_suites.is_empty() {
            return Err(TlsError::NoSharedCipherSuite);
        }

        let mut extensions = Vec::new();
        if let Some(name) = &config.server_name {
            extensions.push(build_server_name(name)?);
        }
        extensions.push(build_supported_groups(&config.supported_groups));
        extensions.push(build_signature_algorithms(&config.signature_algorithms));
        if !config.alpn_protocols.is_empty() {
            extensions.push(build_alpn(&config.alpn_protocols)?);
        }
        if config.ocsp_status_request {
            extensions.push(build_status_request());
        }
        if offer_tls13 {
            let mut versions = vec![TlsVersion::Tls13.wire()];
            let mut v = TlsVersion::Tls12;
            loop {
                if v < config.min_version {
                    break;
                }
                versions.push(v.wire());
                v = match v {
                    TlsVersion::Tls12 => TlsVersion::Tls11,
                    TlsVersion::Tls11 => TlsVersion::Tls10,
                    _ => break,
                };
            }
            extensions.push(build_supported_versions_client(&versions));

            let kx = KeyExchange::generate(NamedGroup::X25519)?;
            extensions.push(build_key_share_client(&[KeyShareEntry {
                group: NamedGroup::X25519,
                key_exchange: kx.public_key_bytes().to_vec(),
            }]));
            self.hs.key_exchange = Some(kx);
        }

        let legacy_version = config.max_version.min(TlsVersion::Tls12);
        self.client_hello_version = Some(config.max_version);

        let hello = encode_client_hello(&ClientHello {
            legacy_version: legacy_version.wire(),
            random: self.hs.client_random,
            session_id,
            cipher_suites,
            extensions,
        });
        self.queue_handshake(&hello)?;
        self.state = HsState::RecvServerHello;
        Ok(())
    }

    fn client_recv_server_hello(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        if msg.msg_type != HandshakeType::ServerHello {
            return Err(TlsError::BadMessage(format!(
                "expected ServerHello, got {:?}",
                msg.msg_type
            )));
        }
        let sh = decode_server_hello(msg.body())?;
        self.hs.server_random = sh.random;

        // The selected version travels in supported_versions for 1.3 and in
        // the legacy field otherwise
        let version = match find_extension(&sh.extensions, ExtensionType::SUPPORTED_VERSIONS) {
            Some(ext) => {
                let wire = parse_supported_versions_server(&ext.data)?;
                TlsVersion::from_wire(wire).ok_or(TlsError::ProtocolVersion)?
            }
            None => TlsVersion::from_wire(sh.legacy_version).ok_or(TlsError::ProtocolVersion)?,
        };
        if version < self.config.min_version || version > self.config.max_version {
            return Err(TlsError::ProtocolVersion);
        }
        self.server_version = Some(version);
        self.active_version = Some(version);
        self.negotiated_suite = Some(sh.cipher_suite);

        if version == TlsVersion::Tls13 {
            let params = CipherSuiteParams::from_suite(sh.cipher_suite)?;
            self.hs.transcript.set_hash(params.hash);
            self.hs.transcript.update(&msg.raw);

            let ks_ext = find_extension(&sh.extensions, ExtensionType::KEY_SHARE)
                .ok_or_else(|| TlsError::BadMessage("ServerHello missing key_share".into()))?;
            let entry = parse_key_share_server(&ks_ext.data)?;
            if entry.group != NamedGroup::X25519 {
                return Err(TlsError::HandshakeFailed(
                    "server chose a group we did not share".into(),
                ));
            }
            let kx = self
                .hs
                .key_exchange
                .as_ref()
                .ok_or_else(|| TlsError::Internal("missing key exchange state".into()))?;
            let shared = kx.shared_secret(&entry.key_exchange)?;

            let mut ks = KeySchedule::new(params.hash);
            ks.derive_early_secret(None)?;
            ks.derive_handshake_secret(&shared)?;
            let transcript_hash = self.hs.transcript.current_hash();
            let (client_hs, server_hs) = ks.derive_handshake_traffic_secrets(&transcript_hash)?;

            // Both directions flip to handshake keys at this boundary
            self.read_cipher = self.make_cipher13(&params, &server_hs)?;
            self.write_cipher = self.make_cipher13(&params, &client_hs)?;

            self.hs.client_hs_secret = client_hs;
            self.hs.server_hs_secret = server_hs;
            self.hs.key_schedule = Some(ks);
            self.hs.params13 = Some(params);
            self.state = HsState::RecvEncryptedExtensions;
        } else {
            let params = Tls12CipherSuiteParams::from_suite(sh.cipher_suite)?;
            if params.min_version > version {
                return Err(TlsError::NoSharedCipherSuite);
            }
            let transcript_hash = if version >= TlsVersion::Tls12 {
                params.prf_hash
            } else {
                HashAlg::Md5Sha1
            };
            self.hs.transcript.set_hash(transcript_hash);
            self.hs.transcript.update(&msg.raw);

            // Pre-1.3 carries the ALPN result in the ServerHello itself
            if let Some(ext) = find_extension(
                &sh.extensions,
                ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION,
            ) {
                let mut names = parse_alpn(&ext.data)?;
                if names.len() != 1 {
                    return Err(TlsError::BadMessage(
                        "server must select exactly one protocol".into(),
                    ));
                }
                self.app_protocol = names.pop();
            }

            self.hs.params12 = Some(params);
            self.state = HsState::RecvServerCertificate;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // TLS 1.3 flow
    // -----------------------------------------------------------------------

    fn client_recv_encrypted_extensions(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        if msg.msg_type != HandshakeType::EncryptedExtensions {
            return Err(TlsError::BadMessage(format!(
                "expected EncryptedExtensions, got {:?}",
                msg.msg_type
            )));
        }
        let ee = crate::handshake::codec::decode_encrypted_extensions(msg.body())?;
        if let Some(ext) = find_extension(
            &ee.extensions,
            ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION,
        ) {
            let mut names = parse_alpn(&ext.data)?;
            if names.len() != 1 {
                return Err(TlsError::BadMessage(
                    "server must select exactly one protocol".into(),
                ));
            }
            self.app_protocol = names.pop();
        }
        self.hs.transcript.update(&msg.raw);
        self.state = HsState::RecvServerCertificate13;
        Ok(())
    }

    fn client_recv_certificate13(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        if msg.msg_type != HandshakeType::Certificate {
            return Err(TlsError::BadMessage(format!(
                "expected Certificate, got {:?}",
                msg.msg_type
            )));
        }
        let cert = decode_certificate13(msg.body())?;
        if cert.certificate_list.is_empty() {
            return Err(TlsError::HandshakeFailed("server sent no certificate".into()));
        }
        self.peer_certificates = cert
            .certificate_list
            .iter()
            .map(|e| e.cert_data.clone())
            .collect();
        self.hs.peer_public_key = extract_p256_public_key(&self.peer_certificates[0])?;
        self.hs.transcript.update(&msg.raw);
        self.state = HsState::RecvServerCertificateVerify;
        Ok(())
    }

    fn client_recv_certificate_verify(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        if msg.msg_type != HandshakeType::CertificateVerify {
            return Err(TlsError::BadMessage(format!(
                "expected CertificateVerify, got {:?}",
                msg.msg_type
            )));
        }
        let cv = decode_certificate_verify(msg.body())?;
        if cv.algorithm != SignatureScheme::ECDSA_SECP256R1_SHA256 {
            return Err(TlsError::HandshakeFailed(format!(
                "unsupported signature scheme {:#06x}",
                cv.algorithm.0
            )));
        }
        let transcript_hash = self.hs.transcript.current_hash();
        verify_certificate_verify(&self.hs.peer_public_key, &cv.signature, &transcript_hash, true)?;
        self.hs.transcript.update(&msg.raw);
        self.state = HsState::RecvServerFinished13;
        Ok(())
    }

    fn client_recv_server_finished13(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        if msg.msg_type != HandshakeType::Finished {
            return Err(TlsError::BadMessage(format!(
                "expected Finished, got {:?}",
                msg.msg_type
            )));
        }
        let params = self
            .hs
            .params13
            .clone()
            .ok_or_else(|| TlsError::Internal("missing suite params".into()))?;
        let ks = self
            .hs
            .key_schedule
            .as_ref()
            .ok_or_else(|| TlsError::Internal("missing key schedule".into()))?;

        let transcript_hash = self.hs.transcript.current_hash();
        let finished_key = ks.derive_finished_key(&self.hs.server_hs_secret)?;
        let expected = ks.compute_finished_verify_data(&finished_key, &transcript_hash)?;
        let verify_data = decode_finished(msg.body(), params.hash_len())?;
        if expected.ct_eq(&verify_data).unwrap_u8() != 1 {
            return Err(TlsError::DecryptError);
        }
        self.hs.transcript.update(&msg.raw);

        // Application secrets bind the transcript through the server's
        // Finished; the read direction flips immediately, the write
        // direction after our own Finished goes out
        let ch_to_sf_hash = self.hs.transcript.current_hash();
        let ks = self
            .hs
            .key_schedule
            .as_mut()
            .ok_or_else(|| TlsError::Internal("missing key schedule".into()))?;
        ks.derive_master_secret()?;
        let (client_app, server_app) = ks.derive_app_traffic_secrets(&ch_to_sf_hash)?;
        self.read_cipher = self.make_cipher13(&params, &server_app)?;

        let ks = self
            .hs
            .key_schedule
            .as_ref()
            .ok_or_else(|| TlsError::Internal("missing key schedule".into()))?;
        let finished_key = ks.derive_finished_key(&self.hs.client_hs_secret)?;
        let verify_data = ks.compute_finished_verify_data(&finished_key, &ch_to_sf_hash)?;
        self.queue_handshake(&encode_finished(&verify_data))?;
        self.write_cipher = self.make_cipher13(&params, &client_app)?;

        self.handshake_complete();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // TLS 1.0-1.2 flow
    // -----------------------------------------------------------------------

    fn client_recv_certificate12(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        if msg.msg_type != HandshakeType::Certificate {
            return Err(TlsError::BadMessage(format!(
                "expected Certificate, got {:?}",
                msg.msg_type
            )));
        }
        let chain = decode_certificate12(msg.body())?;
        if chain.is_empty() {
            return Err(TlsError::HandshakeFailed("server sent no certificate".into()));
        }
        self.hs.peer_public_key = extract_p256_public_key(&chain[0])?;
        self.peer_certificates = chain;
        self.hs.transcript.update(&msg.raw);
        self.state = HsState::RecvServerKeyExchange;
        Ok(())
    }

    fn client_recv_server_key_exchange(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        if msg.msg_type != HandshakeType::ServerKeyExchange {
            return Err(TlsError::BadMessage(format!(
                "expected ServerKeyExchange, got {:?}",
                msg.msg_type
            )));
        }
        let version = self.active_version.ok_or(TlsError::ProtocolVersion)?;
        let with_algorithm = version >= TlsVersion::Tls12;
        let ske = decode_server_key_exchange(msg.body(), with_algorithm)?;
        if let Some(alg) = ske.algorithm {
            if alg != SignatureScheme::ECDSA_SECP256R1_SHA256 {
                return Err(TlsError::HandshakeFailed(format!(
                    "unsupported signature scheme {:#06x}",
                    alg.0
                )));
            }
        }

        let params = encode_ske_params(ske.group, &ske.public_key);
        let content =
            build_ske_content(&self.hs.client_random, &self.hs.server_random, &params);
        verify_content(&self.hs.peer_public_key, &ske.signature, &content)?;

        self.hs.peer_kx_group = Some(ske.group);
        self.hs.peer_kx_public = ske.public_key;
        self.hs.transcript.update(&msg.raw);
        self.state = HsState::RecvServerHelloDone;
        Ok(())
    }

    fn client_recv_server_hello_done(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        match msg.msg_type {
            HandshakeType::CertificateRequest => {
                let version = self.active_version.ok_or(TlsError::ProtocolVersion)?;
                decode_certificate_request(msg.body(), version >= TlsVersion::Tls12)?;
                self.hs.client_cert_requested = true;
                self.hs.transcript.update(&msg.raw);
                // Stay in this state until ServerHelloDone arrives
                Ok(())
            }
            HandshakeType::ServerHelloDone => {
                decode_server_hello_done(msg.body())?;
                self.hs.transcript.update(&msg.raw);
                self.client_send_second_flight()
            }
            other => Err(TlsError::BadMessage(format!(
                "expected CertificateRequest or ServerHelloDone, got {other:?}"
            ))),
        }
    }

    /// [Certificate,] ClientKeyExchange, ChangeCipherSpec, Finished.
    fn client_send_second_flight(&mut self) -> Result<(), TlsError> {
        // We hold no client certificate; answer a request with an empty chain
        if self.hs.client_cert_requested {
            let empty = encode_certificate12(&[]);
            self.queue_handshake(&empty)?;
        }

        let group = self
            .hs
            .peer_kx_group
            .ok_or_else(|| TlsError::Internal("missing server key exchange".into()))?;
        let kx = KeyExchange::generate(group)?;
        let cke = encode_client_key_exchange(kx.public_key_bytes());
        self.queue_handshake(&cke)?;

        let pre_master = kx.shared_secret(&self.hs.peer_kx_public)?;
        self.derive_banks12(&pre_master)?;

        let transcript_hash = self.hs.transcript.current_hash();
        let verify_data = self.verify_data12(false, &transcript_hash)?;

        self.queue_record(ContentType::ChangeCipherSpec, &[1])?;
        self.install_pending_write()?;
        self.queue_handshake(&encode_finished(&verify_data))?;

        // The server's Finished authenticates everything including ours
        self.hs.peer_finished_transcript = self.hs.transcript.current_hash();
        self.state = HsState::RecvServerChangeCipherSpec;
        Ok(())
    }

    fn client_recv_ccs(&mut self) -> Result<(), TlsError> {
        match self.next_handshake_event()? {
            HsEvent::ChangeCipherSpec => {
                if self.hs.reassembler.pending_len() != 0 {
                    return Err(TlsError::BadMessage(
                        "handshake data straddles ChangeCipherSpec".into(),
                    ));
                }
                self.install_pending_read()?;
                self.state = HsState::RecvServerFinished12;
                Ok(())
            }
            HsEvent::Message(msg) => Err(TlsError::BadMessage(format!(
                "expected ChangeCipherSpec, got {:?}",
                msg.msg_type
            ))),
        }
    }

    fn client_recv_server_finished12(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        if msg.msg_type != HandshakeType::Finished {
            return Err(TlsError::BadMessage(format!(
                "expected Finished, got {:?}",
                msg.msg_type
            )));
        }
        let expected = {
            let transcript_hash = self.hs.peer_finished_transcript.clone();
            self.verify_data12(true, &transcript_hash)?
        };
        let verify_data = decode_finished(msg.body(), expected.len())?;
        if expected.ct_eq(&verify_data).unwrap_u8() != 1 {
            return Err(TlsError::DecryptError);
        }
        self.hs.transcript.update(&msg.raw);
        self.handshake_complete();
        Ok(())
    }
}
