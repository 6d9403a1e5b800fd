//! Persisted entity shapes (§3).
//!
//! These are plain value types — the storage mapping (table layout, SQL
//! types) is `pgsum-postgres`'s concern. Keeping them here means the
//! aggregator and combiner can be unit-tested without a database.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The single cryptographic hash a database is pinned to at first bootstrap
/// (§9 Open Question: the source mixes MD5/SHA-256/BLAKE3; we require one
/// per database so cross-database comparison is meaningful).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            other => Err(Error::UnknownHashAlgorithm(other.to_string())),
        }
    }
}

/// Which of the two §4.5 derivations produces a table's `ChunkHash.digest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkDerivation {
    /// `chunk_digest = H(decimal_text(xor64))`. O(1) per event.
    Xor,
    /// `chunk_digest = H(concat(hex(row_hash) for row in chunk order by pk_hash))`. O(k) per event.
    SortedFold,
}

impl ChunkDerivation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkDerivation::Xor => "xor",
            ChunkDerivation::SortedFold => "sorted_fold",
        }
    }
}

impl Default for ChunkDerivation {
    fn default() -> Self {
        ChunkDerivation::Xor
    }
}

impl std::str::FromStr for ChunkDerivation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "xor" => Ok(ChunkDerivation::Xor),
            "sorted_fold" => Ok(ChunkDerivation::SortedFold),
            other => Err(Error::UnknownChunkDerivation(other.to_string())),
        }
    }
}

/// `(schema, table) -> chunk_width`, plus the per-database/per-table pinned
/// choices that make bootstrap and the trigger bridge reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashConfig {
    pub schema: String,
    pub table: String,
    pub chunk_width: u32,
    pub hash_algorithm: HashAlgorithm,
    pub derivation: ChunkDerivation,
    /// Declared column order (attribute number order), captured once at
    /// watch time. §9: "declared column order by attribute number".
    pub column_order: Vec<String>,
    /// Primary-key projection, in declared PK order.
    pub pk_column_order: Vec<String>,
}

impl HashConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        chunk_width: u32,
        hash_algorithm: HashAlgorithm,
        derivation: ChunkDerivation,
        column_order: Vec<String>,
        pk_column_order: Vec<String>,
    ) -> Result<Self> {
        if chunk_width == 0 {
            return Err(Error::InvalidChunkWidth);
        }
        Ok(Self {
            schema: schema.into(),
            table: table.into(),
            chunk_width,
            hash_algorithm,
            derivation,
            column_order,
            pk_column_order,
        })
    }
}

/// `(schema, table, pk_hash) -> (chunk_id, row_hash)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowHash {
    pub pk_hash: [u8; 32],
    pub chunk_id: i64,
    pub row_hash: [u8; 32],
}

/// `(schema, table, chunk_id) -> (xor64, row_count)`. The commutative
/// running state of one chunk (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkState {
    pub xor64: u64,
    pub row_count: u32,
}

impl ChunkState {
    pub const EMPTY: ChunkState = ChunkState {
        xor64: 0,
        row_count: 0,
    };
}

/// `(schema, table, chunk_id) -> (digest, row_count, dirty)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHash {
    pub chunk_id: i64,
    pub digest: [u8; 32],
    pub row_count: u32,
    pub dirty: bool,
}
