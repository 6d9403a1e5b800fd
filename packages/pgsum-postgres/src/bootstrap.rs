//! Bootstrap (C8, §4.7): one-time full-table aggregation plus trigger
//! installation for a single watched table.
//!
//! Ordering matters: the trigger is installed *after* the initial
//! aggregation completes, inside the same transaction, so that a row
//! changed by concurrent DML during bootstrap is either captured by the
//! full scan (if committed before our snapshot) or by the trigger (if
//! committed after we install it) -- never both, never neither.

use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{info, warn};

use pgsum_core::{
    chunk_id, pk_bytes, pk_hash, row_bytes, row_digest, ChunkDerivation, ChunkState,
    HashAlgorithm, HashConfig,
};

use crate::catalog::{all_columns, database_hash_algorithm, pk_columns};
use crate::error::{expect_32_bytes, Error, Result};
use crate::trigger::install_trigger_sql;

/// Options controlling how a table is watched; defaults match §4.1's
/// chunk-width guidance and the sorted-fold derivation's stronger binding.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub chunk_width: u32,
    pub hash_algorithm: HashAlgorithm,
    pub derivation: ChunkDerivation,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            chunk_width: 1024,
            hash_algorithm: HashAlgorithm::Sha256,
            derivation: ChunkDerivation::Xor,
        }
    }
}

/// Begin watching one `(schema, table)`: validate it has a primary key,
/// scan it once, persist per-chunk state, and install the capture trigger.
///
/// Returns `Err(ErrorKind::SchemaMismatch)` if the table has no primary
/// key (§4.1 edge case), without touching any `pgsum.*` table.
pub async fn watch_table(
    pool: &PgPool,
    schema: &str,
    table: &str,
    opts: &WatchOptions,
) -> Result<()> {
    let pk_cols = pk_columns(pool, schema, table).await?;
    if pk_cols.is_empty() {
        return Err(Error::schema_mismatch(format!(
            "{schema}.{table} has no primary key; cannot be watched"
        )));
    }
    if let Some(pinned) = database_hash_algorithm(pool).await? {
        if pinned != opts.hash_algorithm {
            return Err(Error::config(format!(
                "database is pinned to {pinned:?}; cannot watch {schema}.{table} under {:?}",
                opts.hash_algorithm
            )));
        }
    }
    let columns = all_columns(pool, schema, table).await?;

    let config = HashConfig::new(
        schema.to_string(),
        table.to_string(),
        opts.chunk_width,
        opts.hash_algorithm,
        opts.derivation,
        columns.clone(),
        pk_cols.clone(),
    )?;

    let mut tx = pool.begin().await?;

    clear_existing_state(&mut tx, schema, table).await?;
    let row_count = aggregate_full_table(&mut tx, &config, &columns, &pk_cols).await?;
    upsert_hash_config(&mut tx, &config).await?;

    let trigger_sql = install_trigger_sql(schema, table, &columns);
    sqlx::query(&trigger_sql).execute(&mut *tx).await?;

    tx.commit().await?;

    info!(schema, table, row_count, "watch installed");
    Ok(())
}

/// Bootstrap an entire database (§4.7 step 1 / §6 `bootstrap(db, chunk_width)`):
/// enumerate every candidate table, watch each one that has a primary key,
/// and return the resulting `DatabaseRoot`.
///
/// Per-table failures (including "no primary key") are logged and skipped
/// rather than aborting the run (§7 propagation policy) -- the database
/// root reflects whichever tables ended up watched.
pub async fn bootstrap_database(pool: &PgPool, opts: &WatchOptions) -> Result<[u8; 32]> {
    let candidates = crate::catalog::list_candidate_tables(pool).await?;

    for candidate in &candidates {
        match watch_table(pool, &candidate.schema, &candidate.table, opts).await {
            Ok(()) => {}
            Err(err) if err.kind == crate::error::ErrorKind::SchemaMismatch => {
                info!(
                    schema = %candidate.schema,
                    table = %candidate.table,
                    "skipping table with no primary key"
                );
            }
            Err(err) => {
                warn!(
                    schema = %candidate.schema,
                    table = %candidate.table,
                    %err,
                    "bootstrap failed for table, continuing with the rest of the database"
                );
            }
        }
    }

    crate::aggregator::database_root(pool, opts.hash_algorithm).await
}

async fn clear_existing_state(
    tx: &mut Transaction<'_, Postgres>,
    schema: &str,
    table: &str,
) -> Result<()> {
    for stmt in crate::ddl::drop_derived_state_sql().split(';') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        sqlx::query(stmt)
            .bind(schema)
            .bind(table)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn upsert_hash_config(tx: &mut Transaction<'_, Postgres>, config: &HashConfig) -> Result<()> {
    sqlx::query(
        r#"
        insert into pgsum.hash_config
            (schema_name, table_name, chunk_width, hash_algorithm, derivation, column_order, pk_column_order)
        values ($1, $2, $3, $4, $5, $6, $7)
        on conflict (schema_name, table_name) do update set
            chunk_width = excluded.chunk_width,
            hash_algorithm = excluded.hash_algorithm,
            derivation = excluded.derivation,
            column_order = excluded.column_order,
            pk_column_order = excluded.pk_column_order
        "#,
    )
    .bind(&config.schema)
    .bind(&config.table)
    .bind(config.chunk_width as i32)
    .bind(config.hash_algorithm.as_str())
    .bind(config.derivation.as_str())
    .bind(&config.column_order)
    .bind(&config.pk_column_order)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Scan every row of the table once, computing row hashes and folding them
/// into per-chunk XOR state (§4.4), then derive each chunk's digest and
/// persist it (§4.5). Returns the number of rows scanned.
async fn aggregate_full_table(
    tx: &mut Transaction<'_, Postgres>,
    config: &HashConfig,
    columns: &[String],
    pk_cols: &[String],
) -> Result<u64> {
    let select_list = columns
        .iter()
        .map(|c| format!("{}::text as {}", crate::trigger::quote_ident(c), crate::trigger::quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let order_by = pk_cols
        .iter()
        .map(|c| crate::trigger::quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        "select {select_list} from {}.{} order by {order_by}",
        crate::trigger::quote_ident(&config.schema),
        crate::trigger::quote_ident(&config.table),
    );

    let rows = sqlx::query(&query).fetch_all(&mut **tx).await?;

    let mut chunks: std::collections::HashMap<i64, ChunkState> = std::collections::HashMap::new();
    let mut row_count = 0u64;

    for row in &rows {
        let values: Vec<Option<String>> = (0..columns.len())
            .map(|i| row.try_get::<Option<String>, _>(i).unwrap_or(None))
            .collect();
        let value_refs: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();

        let pk_values: Vec<Option<&str>> = pk_cols
            .iter()
            .map(|pk| {
                let idx = columns.iter().position(|c| c == pk).unwrap();
                value_refs[idx]
            })
            .collect();

        let pk = pk_bytes(&pk_values);
        let row_buf = row_bytes(&value_refs);
        let row64 = pgsum_core::fasthash64(&row_buf);
        let cid = chunk_id(&pk, config.chunk_width);

        let entry = chunks.entry(cid).or_insert(ChunkState::EMPTY);
        *entry = pgsum_core::apply_insert(*entry, row64);

        if config.derivation == ChunkDerivation::SortedFold {
            let digest = row_digest(config.hash_algorithm, &row_buf);
            let pk_digest = pk_hash(config.hash_algorithm, &pk);
            sqlx::query(
                "insert into pgsum.row_hashes(schema_name, table_name, pk_hash, chunk_id, row_hash) \
                 values ($1, $2, $3, $4, $5) \
                 on conflict (schema_name, table_name, pk_hash) do update set \
                 chunk_id = excluded.chunk_id, row_hash = excluded.row_hash",
            )
            .bind(&config.schema)
            .bind(&config.table)
            .bind(&pk_digest[..])
            .bind(cid)
            .bind(&digest[..])
            .execute(&mut **tx)
            .await?;
        }

        row_count += 1;
    }

    for (cid, state) in &chunks {
        sqlx::query(
            "insert into pgsum.chunk_state(schema_name, table_name, chunk_id, xor64, row_count) \
             values ($1, $2, $3, $4, $5) \
             on conflict (schema_name, table_name, chunk_id) do update set \
             xor64 = excluded.xor64, row_count = excluded.row_count",
        )
        .bind(&config.schema)
        .bind(&config.table)
        .bind(cid)
        .bind(state.xor64 as i64)
        .bind(state.row_count as i32)
        .execute(&mut **tx)
        .await?;

        let digest = chunk_digest_for(config, *cid, *state, tx).await?;
        sqlx::query(
            "insert into pgsum.chunk_hashes(schema_name, table_name, chunk_id, chunk_hash, row_count, dirty) \
             values ($1, $2, $3, $4, $5, false) \
             on conflict (schema_name, table_name, chunk_id) do update set \
             chunk_hash = excluded.chunk_hash, row_count = excluded.row_count, dirty = false",
        )
        .bind(&config.schema)
        .bind(&config.table)
        .bind(cid)
        .bind(&digest[..])
        .bind(state.row_count as i32)
        .execute(&mut **tx)
        .await?;
    }

    if row_count == 0 {
        warn!(schema = %config.schema, table = %config.table, "watching empty table");
    }

    Ok(row_count)
}


async fn chunk_digest_for(
    config: &HashConfig,
    chunk_id: i64,
    state: ChunkState,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<[u8; 32]> {
    match config.derivation {
        ChunkDerivation::Xor => Ok(pgsum_core::xor_chunk_digest(
            config.hash_algorithm,
            state.xor64,
        )),
        ChunkDerivation::SortedFold => {
            let rows = sqlx::query(
                "select row_hash from pgsum.row_hashes \
                 where schema_name = $1 and table_name = $2 and chunk_id = $3 \
                 order by pk_hash",
            )
            .bind(&config.schema)
            .bind(&config.table)
            .bind(chunk_id)
            .fetch_all(&mut **tx)
            .await?;
            let digests: Vec<[u8; 32]> = rows
                .into_iter()
                .map(|r| {
                    let bytes: Vec<u8> = r.get(0);
                    expect_32_bytes(bytes, "row_hash")
                })
                .collect::<Result<_>>()?;
            Ok(pgsum_core::sorted_fold_chunk_digest(
                config.hash_algorithm,
                &digests,
            ))
        }
    }
}
