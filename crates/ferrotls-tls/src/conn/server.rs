//! Server-side handshake state machine.

use std::io::{Read, Write};

use subtle::ConstantTimeEq;

use super::{Connection, HsEvent, HsState};
use crate::crypt::key_schedule::KeySchedule;
use crate::crypt::{
    CipherSuiteParams, HashAlg, NamedGroup, SignatureScheme, Tls12CipherSuiteParams,
};
use crate::extensions::{Extension, ExtensionType};
use crate::handshake::codec::{
    decode_client_hello, decode_finished, encode_certificate13, encode_certificate_verify,
    encode_encrypted_extensions, encode_finished, encode_server_hello, CertificateEntry,
    CertificateMsg, CertificateVerifyMsg, ClientHello, EncryptedExtensions, ServerHello,
};
use crate::handshake::codec12::{
    decode_client_key_exchange, encode_certificate12, encode_server_hello_done,
    encode_server_key_exchange, encode_ske_params, ServerKeyExchange,
};
use crate::handshake::extensions_codec::{
    build_alpn, build_key_share_server, build_supported_versions_server, find_extension,
    parse_alpn, parse_key_share_client, parse_server_name, parse_supported_groups,
    parse_supported_versions_client, select_alpn, KeyShareEntry,
};
use crate::handshake::key_exchange::KeyExchange;
use crate::handshake::signing::{build_ske_content, sign_certificate_verify, sign_content};
use crate::handshake::HandshakeType;
use crate::record::ContentType;
use crate::{CipherSuite, TlsError, TlsVersion};

impl<R: Read, W: Write> Connection<R, W> {
    /// Advance the server state machine by one step.
    pub(crate) fn server_step(&mut self) -> Result<(), TlsError> {
        match self.state {
            HsState::RecvClientHello => self.server_recv_client_hello(),
            HsState::RecvClientFinished13 => self.server_recv_client_finished13(),
            HsState::RecvClientKeyExchange => self.server_recv_client_key_exchange(),
            HsState::RecvClientChangeCipherSpec => self.server_recv_ccs(),
            HsState::RecvClientFinished12 => self.server_recv_client_finished12(),
            _ => Err(TlsError::InvalidState),
        }
    }

    fn server_recv_client_hello(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        if msg.msg_type != HandshakeType::ClientHello {
            return Err(TlsError::BadMessage(format!(
                "expected ClientHello, got {:?}",
                msg.msg_type
            )));
        }
        let ch = decode_client_hello(msg.body())?;
        self.hs.client_random = ch.random;
        getrandom::getrandom(&mut self.hs.server_random).map_err(|_| TlsError::Entropy)?;

        // Version: supported_versions governs when present, the legacy
        // field otherwise; either way the result must land in our range
        let version = self.server_select_version(&ch)?;
        self.server_version = Some(version);
        self.active_version = Some(version);

        if let Some(ext) = find_extension(&ch.extensions, ExtensionType::SERVER_NAME) {
            self.peer_server_name = Some(parse_server_name(&ext.data)?);
        }

        let suite = self.server_select_suite(&ch, version)?;
        self.negotiated_suite = Some(suite);

        // ALPN: the server preference list picks among the client's offers.
        // No offer (or no server list) omits the extension entirely.
        let alpn_selected: Option<Vec<u8>> = match find_extension(
            &ch.extensions,
            ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION,
        ) {
            Some(ext) if !self.config.alpn_protocols.is_empty() => {
                let offers = parse_alpn(&ext.data)?;
                if offers.is_empty() {
                    None
                } else {
                    let prefs = self.config.alpn_protocols.clone();
                    Some(select_alpn(&prefs, &offers)?.to_vec())
                }
            }
            _ => None,
        };
        self.app_protocol = alpn_selected.clone();

        if version == TlsVersion::Tls13 {
            self.server_hello_flight13(&msg.raw, &ch, suite, alpn_selected)
        } else {
            self.server_hello_flight12(&msg.raw, &ch, suite, version, alpn_selected)
        }
    }

    fn server_select_version(&mut self, ch: &ClientHello) -> Result<TlsVersion, TlsError> {
        if let Some(ext) = find_extension(&ch.extensions, ExtensionType::SUPPORTED_VERSIONS) {
            let offered = parse_supported_versions_client(&ext.data)?;
            self.client_hello_version = offered
                .iter()
                .filter_map(|w| TlsVersion::from_wire(*w))
                .max();
            if offered.contains(&TlsVersion::Tls13.wire())
                && self.config.max_version == TlsVersion::Tls13
            {
                return Ok(TlsVersion::Tls13);
            }
            // Fall through to the highest mutually supported legacy version
            let mut best: Option<TlsVersion> = None;
            for wire in offered {
                if let Some(v) = TlsVersion::from_wire(wire) {
                    if v <= self.config.max_version && best.map(|b| v > b).unwrap_or(true) {
                        best = Some(v);
                    }
                }
            }
            let v = best.ok_or(TlsError::ProtocolVersion)?;
            if v < self.config.min_version {
                return Err(TlsError::ProtocolVersion);
            }
            return Ok(v);
        }

        let advertised =
            TlsVersion::from_wire(ch.legacy_version).unwrap_or(TlsVersion::Tls12);
        self.client_hello_version = Some(advertised);
        let v = advertised.min(self.config.max_version).min(TlsVersion::Tls12);
        if v < self.config.min_version {
            return Err(TlsError::ProtocolVersion);
        }
        Ok(v)
    }

    fn server_select_suite(
        &self,
        ch: &ClientHello,
        version: TlsVersion,
    ) -> Result<CipherSuite, TlsError> {
        for suite in &self.config.cipher_suites {
            if !ch.cipher_suites.contains(suite) {
                continue;
            }
            if version == TlsVersion::Tls13 {
                if CipherSuiteParams::from_suite(*suite).is_ok() {
                    return Ok(*suite);
                }
            } else if let Ok(params) = Tls12CipherSuiteParams::from_suite(*suite) {
                // Our certificate key is ECDSA; RSA-authenticated suites
                // cannot be honored
                if params.min_version <= version
                    && params.auth_alg == crate::crypt::AuthAlg::Ecdsa
                {
                    return Ok(*suite);
                }
            }
        }
        Err(TlsError::NoSharedCipherSuite)
    }

    // -----------------------------------------------------------------------
    // TLS 1.3 flight
    // -----------------------------------------------------------------------

    fn server_hello_flight13(
        &mut self,
        ch_raw: &[u8],
        ch: &ClientHello,
        suite: CipherSuite,
        alpn_selected: Option<Vec<u8>>,
    ) -> Result<(), TlsError> {
        let params = CipherSuiteParams::from_suite(suite)?;
        self.hs.transcript.set_hash(params.hash);
        self.hs.transcript.update(ch_raw);

        // Without HelloRetryRequest support, the client must have shared a
        // group we can serve
        let ks_ext = find_extension(&ch.extensions, ExtensionType::KEY_SHARE)
            .ok_or_else(|| TlsError::HandshakeFailed("client sent no key_share".into()))?;
        let shares = parse_key_share_client(&ks_ext.data)?;
        let client_share = shares
            .iter()
            .find(|e| e.group == NamedGroup::X25519)
            .ok_or_else(|| TlsError::HandshakeFailed("no usable key share".into()))?;

        let kx = KeyExchange::generate(NamedGroup::X25519)?;
        let shared = kx.shared_secret(&client_share.key_exchange)?;

        let server_hello = encode_server_hello(&ServerHello {
            legacy_version: TlsVersion::Tls12.wire(),
            random: self.hs.server_random,
            session_id: ch.session_id.clone(),
            cipher_suite: suite,
            extensions: vec![
                build_supported_versions_server(TlsVersion::Tls13.wire()),
                build_key_share_server(&KeyShareEntry {
                    group: NamedGroup::X25519,
                    key_exchange: kx.public_key_bytes().to_vec(),
                }),
            ],
        });
        self.queue_handshake(&server_hello)?;

        // Handshake keys switch in immediately after ServerHello, per
        // direction
        let mut ks = KeySchedule::new(params.hash);
        ks.derive_early_secret(None)?;
        ks.derive_handshake_secret(&shared)?;
        let ch_to_sh_hash = self.hs.transcript.current_hash();
        let (client_hs, server_hs) = ks.derive_handshake_traffic_secrets(&ch_to_sh_hash)?;
        self.write_cipher = self.make_cipher13(&params, &server_hs)?;
        self.read_cipher = self.make_cipher13(&params, &client_hs)?;

        let mut ee_exts: Vec<Extension> = Vec::new();
        if let Some(protocol) = alpn_selected {
            ee_exts.push(build_alpn(&[protocol])?);
        }
        let ee = encode_encrypted_extensions(&EncryptedExtensions {
            extensions: ee_exts,
        });
        self.queue_handshake(&ee)?;

        let chain = self.config.certificate_chain.as_der_list().to_vec();
        if chain.is_empty() {
            return Err(TlsError::HandshakeFailed("no server certificate".into()));
        }
        let certificate = encode_certificate13(&CertificateMsg {
            request_context: Vec::new(),
            certificate_list: chain
                .into_iter()
                .map(|cert_data| CertificateEntry {
                    cert_data,
                    extensions: Vec::new(),
                })
                .collect(),
        });
        self.queue_handshake(&certificate)?;

        let private_key = self
            .config
            .private_key
            .as_ref()
            .ok_or_else(|| TlsError::HandshakeFailed("no server private key".into()))?
            .scalar()
            .to_vec();
        let ch_to_cert_hash = self.hs.transcript.current_hash();
        let signature = sign_certificate_verify(&private_key, &ch_to_cert_hash, true)?;
        let certificate_verify = encode_certificate_verify(&CertificateVerifyMsg {
            algorithm: SignatureScheme::ECDSA_SECP256R1_SHA256,
            signature,
        });
        self.queue_handshake(&certificate_verify)?;

        let finished_key = ks.derive_finished_key(&server_hs)?;
        let ch_to_cv_hash = self.hs.transcript.current_hash();
        let verify_data = ks.compute_finished_verify_data(&finished_key, &ch_to_cv_hash)?;
        self.queue_handshake(&encode_finished(&verify_data))?;

        // Application secrets bind the transcript through our Finished; the
        // write direction flips now, the read direction once the client's
        // Finished verifies
        let ch_to_sf_hash = self.hs.transcript.current_hash();
        ks.derive_master_secret()?;
        let (client_app, server_app) = ks.derive_app_traffic_secrets(&ch_to_sf_hash)?;
        self.write_cipher = self.make_cipher13(&params, &server_app)?;
        self.pending_read = Some(self.make_cipher13(&params, &client_app)?);

        self.hs.peer_finished_transcript = ch_to_sf_hash;
        self.hs.client_hs_secret = client_hs;
        self.hs.key_schedule = Some(ks);
        self.hs.params13 = Some(params);
        self.state = HsState::RecvClientFinished13;
        Ok(())
    }

    fn server_recv_client_finished13(&mut self) -> Result<(), TlsError> {
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

        let finished_key = ks.derive_finished_key(&self.hs.client_hs_secret)?;
        let expected =
            ks.compute_finished_verify_data(&finished_key, &self.hs.peer_finished_transcript)?;
        let verify_data = decode_finished(msg.body(), params.hash_len())?;
        if expected.ct_eq(&verify_data).unwrap_u8() != 1 {
            return Err(TlsError::DecryptError);
        }

        self.install_pending_read()?;
        self.handshake_complete();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // TLS 1.0-1.2 flight
    // -----------------------------------------------------------------------

    fn server_hello_flight12(
        &mut self,
        ch_raw: &[u8],
        ch: &ClientHello,
        suite: CipherSuite,
        version: TlsVersion,
        alpn_selected: Option<Vec<u8>>,
    ) -> Result<(), TlsError> {
        let params = Tls12CipherSuiteParams::from_suite(suite)?;
        let transcript_hash = if version >= TlsVersion::Tls12 {
            params.prf_hash
        } else {
            HashAlg::Md5Sha1
        };
        self.hs.transcript.set_hash(transcript_hash);
        self.hs.transcript.update(ch_raw);

        let mut extensions = Vec::new();
        if let Some(protocol) = alpn_selected {
            extensions.push(build_alpn(&[protocol])?);
        }
        let server_hello = encode_server_hello(&ServerHello {
            legacy_version: version.wire(),
            random: self.hs.server_random,
            session_id: Vec::new(),
            cipher_suite: suite,
            extensions,
        });
        self.queue_handshake(&server_hello)?;

        let chain = self.config.certificate_chain.as_der_list().to_vec();
        if chain.is_empty() {
            return Err(TlsError::HandshakeFailed("no server certificate".into()));
        }
        self.queue_handshake(&encode_certificate12(&chain))?;

        // Ephemeral key on the best group the client shares with us
        let group = self.server_select_group(ch)?;
        let kx = KeyExchange::generate(group)?;
        let ske_params = encode_ske_params(group, kx.public_key_bytes());
        let content =
            build_ske_content(&self.hs.client_random, &self.hs.server_random, &ske_params);
        let private_key = self
            .config
            .private_key
            .as_ref()
            .ok_or_else(|| TlsError::HandshakeFailed("no server private key".into()))?
            .scalar()
            .to_vec();
        let signature = sign_content(&private_key, &content)?;
        let ske = encode_server_key_exchange(&ServerKeyExchange {
            group,
            public_key: kx.public_key_bytes().to_vec(),
            algorithm: (version >= TlsVersion::Tls12)
                .then_some(SignatureScheme::ECDSA_SECP256R1_SHA256),
            signature,
        });
        self.queue_handshake(&ske)?;
        self.queue_handshake(&encode_server_hello_done())?;

        self.hs.key_exchange = Some(kx);
        self.hs.params12 = Some(params);
        self.state = HsState::RecvClientKeyExchange;
        Ok(())
    }

    fn server_select_group(&self, ch: &ClientHello) -> Result<NamedGroup, TlsError> {
        let our_first = self
            .config
            .supported_groups
            .first()
            .copied()
            .ok_or_else(|| TlsError::HandshakeFailed("no key exchange groups configured".into()))?;
        let client_groups =
            match find_extension(&ch.extensions, ExtensionType::SUPPORTED_GROUPS) {
                Some(ext) => parse_supported_groups(&ext.data)?,
                // A client silent on groups historically implied the
                // common curves; serve our first preference
                None => return Ok(our_first),
            };
        for group in &self.config.supported_groups {
            if client_groups.contains(group) {
                return Ok(*group);
            }
        }
        Err(TlsError::HandshakeFailed("no common key exchange group".into()))
    }

    fn server_recv_client_key_exchange(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        if msg.msg_type != HandshakeType::ClientKeyExchange {
            return Err(TlsError::BadMessage(format!(
                "expected ClientKeyExchange, got {:?}",
                msg.msg_type
            )));
        }
        let client_public = decode_client_key_exchange(msg.body())?;
        self.hs.transcript.update(&msg.raw);

        let kx = self
            .hs
            .key_exchange
            .take()
            .ok_or_else(|| TlsError::Internal("missing key exchange state".into()))?;
        let pre_master = kx.shared_secret(&client_public)?;
        self.derive_banks12(&pre_master)?;

        self.state = HsState::RecvClientChangeCipherSpec;
        Ok(())
    }

    fn server_recv_ccs(&mut self) -> Result<(), TlsError> {
        match self.next_handshake_event()? {
            HsEvent::ChangeCipherSpec => {
                if self.hs.reassembler.pending_len() != 0 {
                    return Err(TlsError::BadMessage(
                        "handshake data straddles ChangeCipherSpec".into(),
                    ));
                }
                self.install_pending_read()?;
                self.state = HsState::RecvClientFinished12;
                Ok(())
            }
            HsEvent::Message(msg) => Err(TlsError::BadMessage(format!(
                "expected ChangeCipherSpec, got {:?}",
                msg.msg_type
            ))),
        }
    }

    fn server_recv_client_finished12(&mut self) -> Result<(), TlsError> {
        let msg = self.expect_handshake_message()?;
        if msg.msg_type != HandshakeType::Finished {
            return Err(TlsError::BadMessage(format!(
                "expected Finished, got {:?}",
                msg.msg_type
            )));
        }
        let transcript_hash = self.hs.transcript.current_hash();
        let expected = self.verify_data12(false, &transcript_hash)?;
        let verify_data = decode_finished(msg.body(), expected.len())?;
        if expected.ct_eq(&verify_data).unwrap_u8() != 1 {
            return Err(TlsError::DecryptError);
        }
        self.hs.transcript.update(&msg.raw);

        // Our Finished covers the client's as well
        self.queue_record(ContentType::ChangeCipherSpec, &[1])?;
        self.install_pending_write()?;
        let transcript_hash = self.hs.transcript.current_hash();
        let verify_data = self.verify_data12(true, &transcript_hash)?;
        self.queue_handshake(&encode_finished(&verify_data))?;

        self.handshake_complete();
        Ok(())
    }
}
