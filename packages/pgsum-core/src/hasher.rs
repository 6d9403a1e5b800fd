//! Row hasher (C2): fast 64-bit hash for chunk state, cryptographic digest
//! for row/pk identity.

use std::hash::Hasher;

use rustc_hash::FxHasher;

use crate::model::HashAlgorithm;

/// Fast, uniformly-distributed, **deterministic** 64-bit hash of a byte
/// string. Used in `ChunkState.xor64` and chunk assignment (§4.2/§4.3).
///
/// `FxHasher` (unlike `ahash`'s default `RandomState`) has no process-local
/// random seed, so the same bytes hash identically on every process and
/// every database — a hard requirement for cross-database comparison.
pub fn fasthash64(bytes: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// Cryptographic digest of a byte string, under the database's pinned
/// `HashAlgorithm` (§4.2, §9 Open Question resolution).
pub fn digest(algorithm: HashAlgorithm, bytes: &[u8]) -> [u8; 32] {
    match algorithm {
        HashAlgorithm::Sha256 => {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            hasher.finalize().into()
        }
        HashAlgorithm::Blake3 => *blake3::hash(bytes).as_bytes(),
    }
}

/// `pk_hash = cryptographic_digest(pk_bytes)`.
pub fn pk_hash(algorithm: HashAlgorithm, pk_bytes: &[u8]) -> [u8; 32] {
    digest(algorithm, pk_bytes)
}

/// `row_digest(row_bytes)`, used in RowHash / sorted-fold chunk digests.
pub fn row_digest(algorithm: HashAlgorithm, row_bytes: &[u8]) -> [u8; 32] {
    digest(algorithm, row_bytes)
}

/// Cryptographic hash of the empty byte string, for the empty-chunk /
/// empty-table / empty-database digests (§4.5, §4.8).
pub fn empty_digest(algorithm: HashAlgorithm) -> [u8; 32] {
    digest(algorithm, b"")
}

/// Lowercase hex encoding of a digest, as emitted on the wire (§6).
pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fasthash64_is_deterministic() {
        let a = fasthash64(b"hello");
        let b = fasthash64(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn fasthash64_differs_on_different_input() {
        assert_ne!(fasthash64(b"hello"), fasthash64(b"hellp"));
    }

    #[test]
    fn sha256_empty_matches_known_vector() {
        // S1 in §8.
        let d = empty_digest(HashAlgorithm::Sha256);
        assert_eq!(
            to_hex(&d),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_is_32_bytes_for_both_algorithms() {
        assert_eq!(digest(HashAlgorithm::Sha256, b"x").len(), 32);
        assert_eq!(digest(HashAlgorithm::Blake3, b"x").len(), 32);
    }

    #[test]
    fn to_hex_is_lowercase() {
        let hex = to_hex(&[0xAB, 0xCD]);
        assert_eq!(hex, "abcd");
    }
}
