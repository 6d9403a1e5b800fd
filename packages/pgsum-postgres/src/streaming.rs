//! Streaming fingerprint (C10, §4.9): hash of the raw `COPY ... (FORMAT
//! binary)` wire bytes for one table, ordered by primary key (or by every
//! column if the table has none). Unlike the chunked digests, this reads
//! every byte of the table on every call -- no incremental state, no
//! chunking, just a cryptographic hash fed by the COPY stream as it
//! arrives. Useful as an independent cross-check against the chunked
//! `table_root` (§8 property 6).

use futures_util::TryStreamExt;
use sqlx::PgPool;

use pgsum_core::{to_hex, HashAlgorithm};

use crate::catalog::all_columns;
use crate::error::Result;
use crate::trigger::quote_ident;

enum StreamingHasher {
    Sha256(sha2::Sha256),
    Blake3(blake3::Hasher),
}

impl StreamingHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        use sha2::Digest;
        match algorithm {
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Blake3 => StreamingHasher::Blake3(blake3::Hasher::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            StreamingHasher::Sha256(h) => {
                use sha2::Digest;
                h.update(bytes);
            }
            StreamingHasher::Blake3(h) => {
                h.update(bytes);
            }
        }
    }

    fn finalize(self) -> [u8; 32] {
        match self {
            StreamingHasher::Sha256(h) => {
                use sha2::Digest;
                h.finalize().into()
            }
            StreamingHasher::Blake3(h) => *h.finalize().as_bytes(),
        }
    }
}

/// Stream one table's rows via `COPY TO STDOUT (FORMAT binary)` and
/// cryptographically hash the raw bytes as they arrive. Ordered by primary
/// key when known, else by every column left-to-right (§4.9 fallback for
/// PK-less tables).
///
/// Returns the hex digest alongside the number of wire bytes read, per §6's
/// `(digest_hex, bytes_streamed)` output shape.
pub async fn table_fingerprint(
    pool: &PgPool,
    schema: &str,
    table: &str,
    pk_columns: &[String],
    algorithm: HashAlgorithm,
) -> Result<(String, u64)> {
    let columns = all_columns(pool, schema, table).await?;
    let select_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let order_cols = if pk_columns.is_empty() {
        &columns
    } else {
        pk_columns
    };
    let order_by = order_cols
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let query = format!(
        "COPY (SELECT {select_list} FROM {}.{} ORDER BY {order_by}) TO STDOUT (FORMAT binary)",
        quote_ident(schema),
        quote_ident(table),
    );

    let mut conn = pool.acquire().await?;
    let mut stream = conn.copy_out_raw(&query).await?;

    let mut hasher = StreamingHasher::new(algorithm);
    let mut bytes_streamed = 0u64;
    while let Some(chunk) = stream.try_next().await? {
        bytes_streamed += chunk.len() as u64;
        hasher.update(&chunk);
    }

    Ok((to_hex(&hasher.finalize()), bytes_streamed))
}
