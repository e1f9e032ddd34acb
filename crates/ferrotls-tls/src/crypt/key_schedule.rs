//! TLS 1.3 key schedule (RFC 8446 §7.1).
//!
//! Early Secret → Handshake Secret → Master Secret, each phase extracting
//! over the previous phase's "derived" secret and expanding per-direction
//! traffic secrets at the stated transcript boundaries.

use super::hash::HashAlg;
use super::hkdf::{derive_secret, hkdf_expand_label, hkdf_extract};
use ferrotls_types::TlsError;
use zeroize::Zeroize;

/// Derivation phase the schedule is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheduleStage {
    Initial,
    EarlySecret,
    HandshakeSecret,
    MasterSecret,
}

/// Staged TLS 1.3 key schedule; the current phase secret is zeroized on
/// every transition and on drop.
pub struct KeySchedule {
    hash: HashAlg,
    stage: KeyScheduleStage,
    current_secret: Vec<u8>,
}

impl Drop for KeySchedule {
    fn drop(&mut self) {
        self.current_secret.zeroize();
    }
}

impl KeySchedule {
    pub fn new(hash: HashAlg) -> Self {
        Self {
            hash,
            stage: KeyScheduleStage::Initial,
            current_secret: Vec::new(),
        }
    }

    pub fn stage(&self) -> KeyScheduleStage {
        self.stage
    }

    pub fn hash_len(&self) -> usize {
        self.hash.output_len()
    }

    fn require_stage(&self, want: KeyScheduleStage, op: &str) -> Result<(), TlsError> {
        if self.stage != want {
            return Err(TlsError::HandshakeFailed(format!("{op}: wrong stage")));
        }
        Ok(())
    }

    /// Early Secret = HKDF-Extract(0, PSK or zeros). Initial → EarlySecret.
    pub fn derive_early_secret(&mut self, psk: Option<&[u8]>) -> Result<(), TlsError> {
        self.require_stage(KeyScheduleStage::Initial, "derive_early_secret")?;
        let zero_psk = vec![0u8; self.hash.output_len()];
        self.current_secret = hkdf_extract(self.hash, &[], psk.unwrap_or(&zero_psk))?;
        self.stage = KeyScheduleStage::EarlySecret;
        Ok(())
    }

    /// Binder key from the Early Secret: "ext binder" for external PSKs,
    /// "res binder" for resumption PSKs. Context is Hash("").
    pub fn derive_binder_key(&self, external: bool) -> Result<Vec<u8>, TlsError> {
        self.require_stage(KeyScheduleStage::EarlySecret, "derive_binder_key")?;
        let label: &[u8] = if external { b"ext binder" } else { b"res binder" };
        derive_secret(
            self.hash,
            &self.current_secret,
            label,
            &self.hash.hash(b""),
        )
    }

    /// Handshake Secret = HKDF-Extract(Derive-Secret(ES, "derived", ""), DHE).
    /// EarlySecret → HandshakeSecret.
    pub fn derive_handshake_secret(&mut self, dhe_shared: &[u8]) -> Result<(), TlsError> {
        self.require_stage(KeyScheduleStage::EarlySecret, "derive_handshake_secret")?;
        let empty_hash = self.hash.hash(b"");
        let mut salt = derive_secret(self.hash, &self.current_secret, b"derived", &empty_hash)?;
        self.current_secret.zeroize();
        self.current_secret = hkdf_extract(self.hash, &salt, dhe_shared)?;
        salt.zeroize();
        self.stage = KeyScheduleStage::HandshakeSecret;
        Ok(())
    }

    /// (client, server) handshake traffic secrets at the CH..SH boundary.
    pub fn derive_handshake_traffic_secrets(
        &self,
        transcript_hash: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        self.require_stage(
            KeyScheduleStage::HandshakeSecret,
            "derive_handshake_traffic_secrets",
        )?;
        let client = derive_secret(
            self.hash,
            &self.current_secret,
            b"c hs traffic",
            transcript_hash,
        )?;
        let server = derive_secret(
            self.hash,
            &self.current_secret,
            b"s hs traffic",
            transcript_hash,
        )?;
        Ok((client, server))
    }

    /// Master Secret = HKDF-Extract(Derive-Secret(HS, "derived", ""), 0).
    /// HandshakeSecret → MasterSecret.
    pub fn derive_master_secret(&mut self) -> Result<(), TlsError> {
        self.require_stage(KeyScheduleStage::HandshakeSecret, "derive_master_secret")?;
        let empty_hash = self.hash.hash(b"");
        let mut salt = derive_secret(self.hash, &self.current_secret, b"derived", &empty_hash)?;
        let zero_ikm = vec![0u8; self.hash.output_len()];
        self.current_secret.zeroize();
        self.current_secret = hkdf_extract(self.hash, &salt, &zero_ikm)?;
        salt.zeroize();
        self.stage = KeyScheduleStage::MasterSecret;
        Ok(())
    }

    /// (client, server) application traffic secrets at the CH..SF boundary.
    pub fn derive_app_traffic_secrets(
        &self,
        transcript_hash: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        self.require_stage(KeyScheduleStage::MasterSecret, "derive_app_traffic_secrets")?;
        let client = derive_secret(
            self.hash,
            &self.current_secret,
            b"c ap traffic",
            transcript_hash,
        )?;
        let server = derive_secret(
            self.hash,
            &self.current_secret,
            b"s ap traffic",
            transcript_hash,
        )?;
        Ok((client, server))
    }

    /// finished_key = HKDF-Expand-Label(traffic_secret, "finished", "", Hash.length).
    pub fn derive_finished_key(&self, base_secret: &[u8]) -> Result<Vec<u8>, TlsError> {
        hkdf_expand_label(
            self.hash,
            base_secret,
            b"finished",
            b"",
            self.hash.output_len(),
        )
    }

    /// verify_data = HMAC(finished_key, transcript_hash).
    pub fn compute_finished_verify_data(
        &self,
        finished_key: &[u8],
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        self.hash.hmac(finished_key, transcript_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    // RFC 8448 Section 3: simple 1-RTT handshake, TLS_AES_128_GCM_SHA256.

    #[test]
    fn test_full_schedule_rfc8448() {
        let mut ks = KeySchedule::new(HashAlg::Sha256);

        ks.derive_early_secret(None).unwrap();
        assert_eq!(ks.stage(), KeyScheduleStage::EarlySecret);
        assert_eq!(
            to_hex(&ks.current_secret),
            "33ad0a1c607ec03b09e6cd9893680ce210adf300aa1f2660e1b22e10f170f92a"
        );

        let dhe = hex("8bd4054fb55b9d63fdfbacf9f04b9f0d35e6d63f537563efd46272900f89492d");
        ks.derive_handshake_secret(&dhe).unwrap();
        assert_eq!(
            to_hex(&ks.current_secret),
            "1dc826e93606aa6fdc0aadc12f741b01046aa6b99f691ed221a9f0ca043fbeac"
        );

        let transcript_ch_sh =
            hex("860c06edc07858ee8e78f0e7428c58edd6b43f2ca3e6e95f02ed063cf0e1cad8");
        let (client_hs, server_hs) = ks
            .derive_handshake_traffic_secrets(&transcript_ch_sh)
            .unwrap();
        assert_eq!(
            to_hex(&client_hs),
            "b3eddb126e067f35a780b3abf45e2d8f3b1a950738f52e9600746a0e27a55a21"
        );
        assert_eq!(
            to_hex(&server_hs),
            "b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38"
        );

        ks.derive_master_secret().unwrap();
        assert_eq!(
            to_hex(&ks.current_secret),
            "18df06843d13a08bf2a449844c5f8a478001bc4d4c627984d5a41da8d0402919"
        );

        let transcript_ch_sf =
            hex("9608102a0f1ccc6db6250b7b7e417b1a000eaada3daae4777a7686c9ff83df13");
        let (client_app, server_app) = ks.derive_app_traffic_secrets(&transcript_ch_sf).unwrap();
        assert_eq!(
            to_hex(&client_app),
            "9e40646ce79a7f9dc05af8889bce6552875afa0b06df0087f792ebb7c17504a5"
        );
        assert_eq!(
            to_hex(&server_app),
            "a11af9f05531f856ad47116b45a950328204b4f44bfb6b3a4b4f1f3fcb631643"
        );
    }

    #[test]
    fn test_stage_enforcement() {
        let mut ks = KeySchedule::new(HashAlg::Sha256);
        assert!(ks.derive_handshake_secret(b"x").is_err());
        assert!(ks.derive_master_secret().is_err());
        assert!(ks.derive_handshake_traffic_secrets(&[0; 32]).is_err());
        assert!(ks.derive_app_traffic_secrets(&[0; 32]).is_err());

        ks.derive_early_secret(None).unwrap();
        assert!(ks.derive_early_secret(None).is_err());
        ks.derive_handshake_secret(b"shared").unwrap();
        ks.derive_master_secret().unwrap();
        assert_eq!(ks.stage(), KeyScheduleStage::MasterSecret);
    }

    #[test]
    fn test_finished_key_deterministic() {
        let ks = KeySchedule::new(HashAlg::Sha256);
        let secret = hex("b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38");
        let k1 = ks.derive_finished_key(&secret).unwrap();
        let k2 = ks.derive_finished_key(&secret).unwrap();
        assert_eq!(k1.len(), 32);
        assert_eq!(k1, k2);

        let vd = ks
            .compute_finished_verify_data(&k1, &[0xAB; 32])
            .unwrap();
        assert_eq!(vd.len(), 32);
    }

    #[test]
    fn test_binder_key_labels_differ() {
        let mut ks = KeySchedule::new(HashAlg::Sha256);
        ks.derive_early_secret(Some(&[0x5A; 32])).unwrap();
        let ext = ks.derive_binder_key(true).unwrap();
        let res = ks.derive_binder_key(false).unwrap();
        assert_eq!(ext.len(), 32);
        assert_ne!(ext, res);
    }

    #[test]
    fn test_schedule_sha384() {
        let mut ks = KeySchedule::new(HashAlg::Sha384);
        assert_eq!(ks.hash_len(), 48);
        ks.derive_early_secret(None).unwrap();
        assert_eq!(ks.current_secret.len(), 48);
        ks.derive_handshake_secret(&[0u8; 48]).unwrap();
        let (c, s) = ks.derive_handshake_traffic_secrets(&[0u8; 48]).unwrap();
        assert_eq!(c.len(), 48);
        assert_eq!(s.len(), 48);
        ks.derive_master_secret().unwrap();
        let (ca, sa) = ks.derive_app_traffic_secrets(&[0u8; 48]).unwrap();
        assert_eq!(ca.len(), 48);
        assert_ne!(ca, sa);
    }
}
