//! Rehash (C8's companion operation, §4.7 "Repair"): recompute the digest
//! of every chunk flagged `dirty`, clearing the flag once its digest is
//! current. Idempotent -- running it twice in a row with no intervening
//! writes is a no-op the second time.

use sqlx::{PgPool, Row};
use tracing::info;

use pgsum_core::{
    empty_digest, sorted_fold_chunk_digest, xor_chunk_digest, ChunkDerivation, HashConfig,
};

use crate::catalog::load_hash_config;
use crate::error::{expect_32_bytes, Result};

/// Recompute and persist the digest of every dirty chunk for one watched
/// table. Returns the number of chunks rehashed.
pub async fn rehash_dirty(pool: &PgPool, schema: &str, table: &str) -> Result<u64> {
    let config = load_hash_config(pool, schema, table).await?;

    let dirty_chunks: Vec<i64> = sqlx::query(
        "select chunk_id from pgsum.chunk_hashes \
         where schema_name = $1 and table_name = $2 and dirty = true",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|r| r.get(0))
    .collect();

    let mut count = 0u64;
    for chunk in dirty_chunks {
        let (digest, row_count) = recompute_chunk_digest(pool, &config, chunk).await?;
        sqlx::query(
            "update pgsum.chunk_hashes set chunk_hash = $4, row_count = $5, dirty = false \
             where schema_name = $1 and table_name = $2 and chunk_id = $3",
        )
        .bind(schema)
        .bind(table)
        .bind(chunk)
        .bind(&digest[..])
        .bind(row_count as i32)
        .execute(pool)
        .await?;
        count += 1;
    }

    if count > 0 {
        info!(schema, table, count, "rehashed dirty chunks");
    }
    Ok(count)
}

async fn recompute_chunk_digest(
    pool: &PgPool,
    config: &HashConfig,
    chunk: i64,
) -> Result<([u8; 32], u32)> {
    let state_row = sqlx::query(
        "select xor64, row_count from pgsum.chunk_state \
         where schema_name = $1 and table_name = $2 and chunk_id = $3",
    )
    .bind(&config.schema)
    .bind(&config.table)
    .bind(chunk)
    .fetch_optional(pool)
    .await?;

    // A dirty chunk with no underlying `chunk_state` row has no rows left
    // in it (every row was deleted); its digest is the empty digest, not
    // `xor_chunk_digest(algorithm, 0)` -- those are different hashes.
    let Some(state_row) = state_row else {
        return Ok((empty_digest(config.hash_algorithm), 0));
    };
    let (xor64, row_count): (u64, u32) = (
        state_row.get::<i64, _>(0) as u64,
        state_row.get::<i32, _>(1) as u32,
    );

    let digest = match config.derivation {
        ChunkDerivation::Xor => xor_chunk_digest(config.hash_algorithm, xor64),
        ChunkDerivation::SortedFold => {
            let rows = sqlx::query(
                "select row_hash from pgsum.row_hashes \
                 where schema_name = $1 and table_name = $2 and chunk_id = $3 \
                 order by pk_hash",
            )
            .bind(&config.schema)
            .bind(&config.table)
            .bind(chunk)
            .fetch_all(pool)
            .await?;
            let digests: Vec<[u8; 32]> = rows
                .into_iter()
                .map(|r| {
                    let bytes: Vec<u8> = r.get(0);
                    expect_32_bytes(bytes, "row_hash")
                })
                .collect::<Result<_>>()?;
            sorted_fold_chunk_digest(config.hash_algorithm, &digests)
        }
    };

    Ok((digest, row_count))
}
