//! Aggregator (C9) and the two chunk-digest derivations (C5/§4.5).
//!
//! Every function here is a pure fold over an already-ordered slice — the
//! caller (`pgsum-postgres`) owns the `ORDER BY chunk_id` / `ORDER BY
//! schema, table` / `ORDER BY pk_hash` queries. Keeping the fold itself
//! free of any database type means the one place that has to match the
//! spec's concatenation rule byte-for-byte is exhaustively unit-tested.

use crate::hasher::{digest, empty_digest, to_hex};
use crate::model::HashAlgorithm;

/// Derivation 1 (§4.5): `chunk_digest = H(decimal_text(xor64))`.
pub fn xor_chunk_digest(algorithm: HashAlgorithm, xor64: u64) -> [u8; 32] {
    digest(algorithm, xor64.to_string().as_bytes())
}

/// Derivation 2 (§4.5): fold row digests, already ordered by ascending
/// `pk_hash`, into one chunk digest. Empty chunk -> `H("")`.
pub fn sorted_fold_chunk_digest(
    algorithm: HashAlgorithm,
    row_hashes_by_pk_hash_asc: &[[u8; 32]],
) -> [u8; 32] {
    if row_hashes_by_pk_hash_asc.is_empty() {
        return empty_digest(algorithm);
    }
    let mut concatenated = String::with_capacity(row_hashes_by_pk_hash_asc.len() * 64);
    for h in row_hashes_by_pk_hash_asc {
        concatenated.push_str(&to_hex(h));
    }
    digest(algorithm, concatenated.as_bytes())
}

/// TableRoot (§4.8): hash of hex-encoded chunk digests, already ordered by
/// ascending `chunk_id`. Empty table -> `H("")`.
pub fn table_root(algorithm: HashAlgorithm, chunk_digests_by_id_asc: &[[u8; 32]]) -> [u8; 32] {
    if chunk_digests_by_id_asc.is_empty() {
        return empty_digest(algorithm);
    }
    let mut concatenated = String::with_capacity(chunk_digests_by_id_asc.len() * 64);
    for h in chunk_digests_by_id_asc {
        concatenated.push_str(&to_hex(h));
    }
    digest(algorithm, concatenated.as_bytes())
}

/// DatabaseRoot (§4.8): hash of hex-encoded table roots, already ordered by
/// ascending `(schema, table)`. Empty database -> `H("")`.
pub fn database_root(algorithm: HashAlgorithm, table_roots_by_name_asc: &[[u8; 32]]) -> [u8; 32] {
    // Same fold as table_root -- kept as a distinct function because the
    // two operate at different levels of the hierarchy and callers should
    // not accidentally swap the ordering key they sorted by.
    table_root(algorithm, table_roots_by_name_asc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_root_is_empty_digest() {
        assert_eq!(
            table_root(HashAlgorithm::Sha256, &[]),
            empty_digest(HashAlgorithm::Sha256)
        );
    }

    #[test]
    fn empty_database_root_is_empty_digest() {
        assert_eq!(
            database_root(HashAlgorithm::Sha256, &[]),
            empty_digest(HashAlgorithm::Sha256)
        );
    }

    #[test]
    fn s2_worked_example() {
        // S2: ChunkState xor64 = fasthash64("1" SEP "a" SEP), row_count=1.
        use crate::codec::encode_columns;
        use crate::hasher::fasthash64;

        let row_bytes = encode_columns(&[Some("1"), Some("a")]);
        let xor64 = fasthash64(&row_bytes);
        let chunk_hash = xor_chunk_digest(HashAlgorithm::Sha256, xor64);
        let t_root = table_root(HashAlgorithm::Sha256, &[chunk_hash]);
        let d_root = database_root(HashAlgorithm::Sha256, &[t_root]);

        // Same digest recomputed directly from the hex concatenation rule.
        let expected_t_root = digest(HashAlgorithm::Sha256, to_hex(&chunk_hash).as_bytes());
        let expected_d_root = digest(HashAlgorithm::Sha256, to_hex(&expected_t_root).as_bytes());
        assert_eq!(t_root, expected_t_root);
        assert_eq!(d_root, expected_d_root);
    }

    #[test]
    fn table_root_order_matters() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let forward = table_root(HashAlgorithm::Sha256, &[a, b]);
        let backward = table_root(HashAlgorithm::Sha256, &[b, a]);
        assert_ne!(forward, backward);
    }

    #[test]
    fn sorted_fold_empty_chunk_matches_empty_digest() {
        assert_eq!(
            sorted_fold_chunk_digest(HashAlgorithm::Blake3, &[]),
            empty_digest(HashAlgorithm::Blake3)
        );
    }

    #[test]
    fn chunk_locality_one_chunk_change_does_not_move_others() {
        // §8 property 5, modeled at the pure-fold level: changing one
        // chunk's digest leaves every other chunk digest byte-identical.
        let c0 = xor_chunk_digest(HashAlgorithm::Sha256, 10);
        let c1 = xor_chunk_digest(HashAlgorithm::Sha256, 20);
        let c1_after = xor_chunk_digest(HashAlgorithm::Sha256, 25);
        assert_eq!(c0, xor_chunk_digest(HashAlgorithm::Sha256, 10));
        assert_ne!(c1, c1_after);
    }
}
