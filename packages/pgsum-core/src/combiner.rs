//! The commutative combiner (C4 of §4.4): XOR is associative, commutative,
//! and self-inverse, so chunk state can be updated in any order and the
//! effect of any operation can be undone by repeating it.

use crate::model::ChunkState;

/// `INSERT row r`: `xor64 ^= fasthash64(row_bytes(r)); row_count += 1`.
pub fn apply_insert(state: ChunkState, row64: u64) -> ChunkState {
    ChunkState {
        xor64: state.xor64 ^ row64,
        row_count: state.row_count + 1,
    }
}

/// `DELETE row r`: `xor64 ^= fasthash64(row_bytes(r)); row_count -= 1`.
///
/// Saturates at zero rather than underflowing, so a delete applied to an
/// already-empty chunk (a corruption scenario per §7) does not panic; the
/// caller is expected to treat a reconstructed negative count as corruption
/// and mark the chunk dirty for a rehash.
pub fn apply_delete(state: ChunkState, row64: u64) -> ChunkState {
    ChunkState {
        xor64: state.xor64 ^ row64,
        row_count: state.row_count.saturating_sub(1),
    }
}

/// `UPDATE r -> r'` within the same chunk: `xor64 ^= fasthash64(row_bytes(r)) ^ fasthash64(row_bytes(r'))`.
///
/// row_count is unchanged — same number of live rows before and after.
pub fn apply_update_same_chunk(state: ChunkState, old_row64: u64, new_row64: u64) -> ChunkState {
    ChunkState {
        xor64: state.xor64 ^ old_row64 ^ new_row64,
        row_count: state.row_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_then_delete_same_row_is_identity() {
        let s0 = ChunkState::EMPTY;
        let s1 = apply_insert(s0, 0xDEAD_BEEF);
        let s2 = apply_delete(s1, 0xDEAD_BEEF);
        assert_eq!(s2, s0);
    }

    #[test]
    fn update_same_chunk_is_equivalent_to_delete_then_insert() {
        let s0 = ChunkState {
            xor64: 0x1234,
            row_count: 5,
        };
        let via_update = apply_update_same_chunk(s0, 0xAAAA, 0xBBBB);
        let via_delete_insert = apply_insert(apply_delete(s0, 0xAAAA), 0xBBBB);
        assert_eq!(via_update, via_delete_insert);
    }

    #[test]
    fn delete_never_panics_on_empty_chunk() {
        let s0 = ChunkState::EMPTY;
        let s1 = apply_delete(s0, 0x1);
        assert_eq!(s1.row_count, 0);
    }

    proptest! {
        #[test]
        fn combiner_is_commutative_over_any_event_order(
            rows in proptest::collection::vec(any::<u64>(), 0..64)
        ) {
            // Order independence (§8 property 1): folding the same
            // multiset of row hashes via XOR in any order gives the
            // same final state.
            let mut forward = ChunkState::EMPTY;
            for &r in &rows {
                forward = apply_insert(forward, r);
            }
            let mut reversed = ChunkState::EMPTY;
            for &r in rows.iter().rev() {
                reversed = apply_insert(reversed, r);
            }
            prop_assert_eq!(forward, reversed);
        }

        #[test]
        fn net_identity_sequence_restores_initial_state(
            rows in proptest::collection::vec(any::<u64>(), 0..32)
        ) {
            // Commutative combiner (§8 property 2): insert then delete
            // every row (in any order) returns to the initial state.
            let s0 = ChunkState { xor64: 0x9999_AAAA, row_count: 7 };
            let mut s = s0;
            for &r in &rows {
                s = apply_insert(s, r);
            }
            for &r in rows.iter().rev() {
                s = apply_delete(s, r);
            }
            prop_assert_eq!(s, s0);
        }
    }
}
