//! Aggregator (C9), query half: fetch chunk/table digests in the order
//! `pgsum-core`'s pure folds require, and hand them over.

use sqlx::{PgPool, Row};

use pgsum_core::{database_root as fold_database_root, table_root as fold_table_root, HashAlgorithm};

use crate::catalog::load_hash_config;
use crate::error::{expect_32_bytes, Result};

/// TableRoot (§4.8) for one watched table: every non-dirty chunk digest,
/// ordered by ascending `chunk_id`, folded per the table's derivation.
///
/// Callers should `rehash_dirty` first if they need a digest that reflects
/// every applied write; a dirty chunk's stored digest is stale by
/// definition.
pub async fn table_root(pool: &PgPool, schema: &str, table: &str) -> Result<[u8; 32]> {
    let config = load_hash_config(pool, schema, table).await?;
    let digests = chunk_digests(pool, schema, table).await?;
    Ok(fold_table_root(config.hash_algorithm, &digests))
}

async fn chunk_digests(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<[u8; 32]>> {
    let rows = sqlx::query(
        "select chunk_hash from pgsum.chunk_hashes \
         where schema_name = $1 and table_name = $2 \
         order by chunk_id asc",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            let bytes: Vec<u8> = r.get(0);
            expect_32_bytes(bytes, &format!("chunk_hash for {schema}.{table}"))
        })
        .collect()
}

/// DatabaseRoot (§4.8): every watched table's TableRoot, ordered by
/// ascending `(schema, table)`, folded under a single algorithm.
///
/// `bootstrap::watch_table` rejects watching a table under a different
/// `HashAlgorithm` than the database is already pinned to (§9 Open
/// Question), so every row `hash_config` holds shares one algorithm; pass
/// that same algorithm here.
pub async fn database_root(pool: &PgPool, algorithm: HashAlgorithm) -> Result<[u8; 32]> {
    let tables = sqlx::query(
        "select schema_name, table_name from pgsum.hash_config order by schema_name, table_name",
    )
    .fetch_all(pool)
    .await?;

    let mut roots = Vec::with_capacity(tables.len());
    for row in tables {
        let schema: String = row.get(0);
        let table: String = row.get(1);
        roots.push(table_root(pool, &schema, &table).await?);
    }

    Ok(fold_database_root(algorithm, &roots))
}
