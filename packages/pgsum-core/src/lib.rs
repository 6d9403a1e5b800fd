//! pgsum-core: content-addressed database fingerprinting primitives.
//!
//! This crate has no database dependency. It implements the parts of the
//! fingerprinting engine that are pure functions of bytes: the row codec
//! (C1), the row hasher (C2), chunk assignment (C3), the commutative
//! chunk-state combiner (C4), the two chunk-digest derivations (C5), and
//! the table/database root aggregator (C9).
//!
//! The database-facing half (trigger capture, bootstrap, rehash, the
//! binary-COPY streaming fingerprint) lives in `pgsum-postgres`, which
//! depends on this crate for every hash it computes so the hot path and
//! the cold path are byte-for-byte consistent by construction.

pub mod aggregate;
pub mod chunk;
pub mod codec;
pub mod combiner;
pub mod error;
pub mod hasher;
pub mod model;

pub use aggregate::{database_root, sorted_fold_chunk_digest, table_root, xor_chunk_digest};
pub use chunk::chunk_id;
pub use codec::{pk_bytes, row_bytes, row_bytes_checked};
pub use combiner::{apply_delete, apply_insert, apply_update_same_chunk};
pub use error::{Error, Result};
pub use hasher::{digest, empty_digest, fasthash64, pk_hash, row_digest, to_hex};
pub use model::{ChunkDerivation, ChunkHash, ChunkState, HashAlgorithm, HashConfig, RowHash};
