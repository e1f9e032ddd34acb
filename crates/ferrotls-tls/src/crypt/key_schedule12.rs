//! Master secret and key block derivation for TLS 1.0-1.2 (RFC 5246 §6.3,
//! RFC 2246 §6.3).

use super::hash::HashAlg;
use super::prf::prf;
use super::Tls12CipherSuiteParams;
use crate::TlsVersion;
use ferrotls_types::TlsError;
use zeroize::Zeroize;

/// Length of the master secret.
pub const MASTER_SECRET_LEN: usize = 48;

/// Length of pre-1.3 Finished verify_data.
pub const VERIFY_DATA_LEN: usize = 12;

/// master_secret = PRF(pre_master, "master secret",
///                     client_random || server_random, 48).
pub fn derive_master_secret(
    prf_hash: HashAlg,
    pre_master: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Vec<u8>, TlsError> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(prf_hash, pre_master, "master secret", &seed, MASTER_SECRET_LEN)
}

/// One side's expanded record-protection material.
pub struct DirectionKeys {
    pub mac_key: Vec<u8>,
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl Drop for DirectionKeys {
    fn drop(&mut self) {
        self.mac_key.zeroize();
        self.key.zeroize();
        self.iv.zeroize();
    }
}

/// The split key block: client and server halves.
pub struct KeyBlock {
    pub client: DirectionKeys,
    pub server: DirectionKeys,
}

/// key_block = PRF(master, "key expansion",
///                 server_random || client_random, total), split in the
/// mandated order: client_mac, server_mac, client_key, server_key,
/// client_iv, server_iv.
pub fn derive_key_block(
    params: &Tls12CipherSuiteParams,
    version: TlsVersion,
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<KeyBlock, TlsError> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let iv_len = params.iv_material_len(version);
    let total = params.key_block_len(version);
    let mut block = prf(
        params.prf_hash_for(version),
        master_secret,
        "key expansion",
        &seed,
        total,
    )?;

    let mut cursor = block.as_slice();
    let mut take = |n: usize| {
        let (head, rest) = cursor.split_at(n);
        cursor = rest;
        head.to_vec()
    };

    let client_mac = take(params.mac_key_len);
    let server_mac = take(params.mac_key_len);
    let client_key = take(params.key_len);
    let server_key = take(params.key_len);
    let client_iv = take(iv_len);
    let server_iv = take(iv_len);
    block.zeroize();

    Ok(KeyBlock {
        client: DirectionKeys {
            mac_key: client_mac,
            key: client_key,
            iv: client_iv,
        },
        server: DirectionKeys {
            mac_key: server_mac,
            key: server_key,
            iv: server_iv,
        },
    })
}

/// Finished verify_data (RFC 5246 §7.4.9):
/// PRF(master, "client finished"/"server finished", transcript_hash, 12).
///
/// Pre-1.2 the transcript hash is the concatenated MD5||SHA1 digest and the
/// PRF is the legacy split-secret construction; both are selected by the
/// transcript hash handed in.
pub fn finished_verify_data(
    prf_hash: HashAlg,
    master_secret: &[u8],
    transcript_hash: &[u8],
    from_server: bool,
) -> Result<Vec<u8>, TlsError> {
    let label = if from_server {
        "server finished"
    } else {
        "client finished"
    };
    prf(
        prf_hash,
        master_secret,
        label,
        transcript_hash,
        VERIFY_DATA_LEN,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CipherSuite;

    fn params(suite: CipherSuite) -> Tls12CipherSuiteParams {
        Tls12CipherSuiteParams::from_suite(suite).unwrap()
    }

    #[test]
    fn test_master_secret_is_48_bytes_and_deterministic() {
        let pre_master = [0x42u8; 32];
        let cr = [1u8; 32];
        let sr = [2u8; 32];
        let ms1 = derive_master_secret(HashAlg::Sha256, &pre_master, &cr, &sr).unwrap();
        let ms2 = derive_master_secret(HashAlg::Sha256, &pre_master, &cr, &sr).unwrap();
        assert_eq!(ms1.len(), MASTER_SECRET_LEN);
        assert_eq!(ms1, ms2);

        // Swapped randoms change the secret
        let ms3 = derive_master_secret(HashAlg::Sha256, &pre_master, &sr, &cr).unwrap();
        assert_ne!(ms1, ms3);
    }

    #[test]
    fn test_key_block_split_cbc_sha_tls12() {
        let p = params(CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA);
        let master = [0xABu8; 48];
        let kb =
            derive_key_block(&p, TlsVersion::Tls12, &master, &[1u8; 32], &[2u8; 32]).unwrap();
        assert_eq!(kb.client.mac_key.len(), 20);
        assert_eq!(kb.server.mac_key.len(), 20);
        assert_eq!(kb.client.key.len(), 16);
        assert_eq!(kb.server.key.len(), 16);
        // Explicit-IV versions draw no IV material
        assert!(kb.client.iv.is_empty());
        assert!(kb.server.iv.is_empty());
        assert_ne!(kb.client.key, kb.server.key);
    }

    #[test]
    fn test_key_block_split_cbc_sha_tls10() {
        let p = params(CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA);
        let master = [0xABu8; 48];
        let kb =
            derive_key_block(&p, TlsVersion::Tls10, &master, &[1u8; 32], &[2u8; 32]).unwrap();
        assert_eq!(kb.client.iv.len(), 16);
        assert_eq!(kb.server.iv.len(), 16);
        assert_ne!(kb.client.iv, kb.server.iv);
    }

    #[test]
    fn test_key_block_split_gcm() {
        let p = params(CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384);
        let master = [0xCDu8; 48];
        let kb =
            derive_key_block(&p, TlsVersion::Tls12, &master, &[3u8; 32], &[4u8; 32]).unwrap();
        assert!(kb.client.mac_key.is_empty());
        assert_eq!(kb.client.key.len(), 32);
        assert_eq!(kb.client.iv.len(), 4);
        assert_eq!(kb.server.iv.len(), 4);
    }

    #[test]
    fn test_key_block_split_chacha() {
        let p = params(CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256);
        let master = [0xEFu8; 48];
        let kb =
            derive_key_block(&p, TlsVersion::Tls12, &master, &[5u8; 32], &[6u8; 32]).unwrap();
        assert_eq!(kb.client.key.len(), 32);
        assert_eq!(kb.client.iv.len(), 12);
    }

    #[test]
    fn test_finished_verify_data_sides_differ() {
        let master = [0x11u8; 48];
        let transcript = HashAlg::Sha256.hash(b"all handshake messages");
        let client =
            finished_verify_data(HashAlg::Sha256, &master, &transcript, false).unwrap();
        let server = finished_verify_data(HashAlg::Sha256, &master, &transcript, true).unwrap();
        assert_eq!(client.len(), VERIFY_DATA_LEN);
        assert_eq!(server.len(), VERIFY_DATA_LEN);
        assert_ne!(client, server);
    }

    #[test]
    fn test_finished_verify_data_legacy_prf() {
        let master = [0x22u8; 48];
        let transcript = HashAlg::Md5Sha1.hash(b"all handshake messages");
        let vd = finished_verify_data(HashAlg::Md5Sha1, &master, &transcript, false).unwrap();
        assert_eq!(vd.len(), VERIFY_DATA_LEN);
    }

    #[test]
    fn test_transcript_mutation_invalidates_finished() {
        let master = [0x33u8; 48];
        let t1 = HashAlg::Sha256.hash(b"handshake bytes");
        let t2 = HashAlg::Sha256.hash(b"handshake bytez");
        let v1 = finished_verify_data(HashAlg::Sha256, &master, &t1, false).unwrap();
        let v2 = finished_verify_data(HashAlg::Sha256, &master, &t2, false).unwrap();
        assert_ne!(v1, v2);
    }
}
