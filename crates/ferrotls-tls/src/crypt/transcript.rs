//! Running transcript hash over handshake messages.
//!
//! Every handshake message, 4-byte header included, is folded in, in the
//! order sent or received. Before TLS 1.2 the transcript is the MD5 and
//! SHA-1 digests run concurrently; TLS 1.2 uses the suite PRF hash and
//! TLS 1.3 the suite hash.
//!
//! Buffer-and-replay: `current_hash()` hashes the accumulated bytes with a
//! fresh hasher, so intermediate hashes can be taken at every message
//! boundary without finalizing live state. The buffer also lets the hash
//! algorithm be re-selected when negotiation settles on a suite after the
//! first messages have already been recorded.

use super::hash::HashAlg;

/// Transcript accumulator.
pub struct TranscriptHash {
    hash: HashAlg,
    messages: Vec<u8>,
}

impl TranscriptHash {
    pub fn new(hash: HashAlg) -> Self {
        Self {
            hash,
            messages: Vec::new(),
        }
    }

    /// Re-select the hash algorithm; already-recorded messages are kept and
    /// will be replayed under the new algorithm.
    pub fn set_hash(&mut self, hash: HashAlg) {
        self.hash = hash;
    }

    pub fn hash_alg(&self) -> HashAlg {
        self.hash
    }

    pub fn hash_len(&self) -> usize {
        self.hash.output_len()
    }

    /// Fold handshake bytes into the transcript.
    pub fn update(&mut self, data: &[u8]) {
        self.messages.extend_from_slice(data);
    }

    /// The transcript hash over everything recorded so far.
    pub fn current_hash(&self) -> Vec<u8> {
        self.hash.hash(&self.messages)
    }

    /// Hash of the empty transcript, as needed by `Derive-Secret(_, "derived", "")`.
    pub fn empty_hash(&self) -> Vec<u8> {
        self.hash.hash(b"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_empty_hash_sha256() {
        let th = TranscriptHash::new(HashAlg::Sha256);
        assert_eq!(
            to_hex(&th.empty_hash()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_incremental_updates() {
        let mut th = TranscriptHash::new(HashAlg::Sha256);
        th.update(b"hello");
        let h1 = th.current_hash();
        // Non-destructive
        assert_eq!(h1, th.current_hash());

        th.update(b" world");
        let h2 = th.current_hash();
        assert_ne!(h1, h2);
        assert_eq!(h2, HashAlg::Sha256.hash(b"hello world"));
    }

    #[test]
    fn test_legacy_mode_is_md5_and_sha1() {
        let mut th = TranscriptHash::new(HashAlg::Md5Sha1);
        th.update(b"finished input");
        let h = th.current_hash();
        assert_eq!(h.len(), 36);
        assert_eq!(&h[..16], HashAlg::Md5.hash(b"finished input").as_slice());
        assert_eq!(&h[16..], HashAlg::Sha1.hash(b"finished input").as_slice());
    }

    #[test]
    fn test_rehash_after_suite_selection() {
        let mut th = TranscriptHash::new(HashAlg::Sha256);
        th.update(b"client hello bytes");
        let sha256 = th.current_hash();

        th.set_hash(HashAlg::Sha384);
        let sha384 = th.current_hash();
        assert_eq!(sha384.len(), 48);
        assert_eq!(sha384, HashAlg::Sha384.hash(b"client hello bytes"));
        assert_ne!(&sha384[..32], sha256.as_slice());
    }

    #[test]
    fn test_single_byte_sensitivity() {
        let mut a = TranscriptHash::new(HashAlg::Sha256);
        let mut b = TranscriptHash::new(HashAlg::Sha256);
        a.update(&[0x16, 0x00, 0x00, 0x01, 0xAA]);
        b.update(&[0x16, 0x00, 0x00, 0x01, 0xAB]);
        assert_ne!(a.current_hash(), b.current_hash());
    }
}
