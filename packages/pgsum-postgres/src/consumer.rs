//! Trigger bridge (C7), consumer half.
//!
//! Drains `pgsum.change_queue` in ascending `id` order and applies the
//! §4.6 state machine using the exact same `pgsum-core` combinator and
//! hash functions bootstrap uses. This is what makes the hot path (trigger
//! capture) and the cold path (bootstrap) agree without reimplementing any
//! Postgres-internal hashing in Rust.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, warn};

use pgsum_core::{
    apply_delete, apply_insert, apply_update_same_chunk, chunk_id, fasthash64, pk_bytes,
    row_bytes, row_digest, ChunkDerivation, ChunkState, HashConfig,
};

use crate::catalog::load_hash_config;
use crate::error::Result;

/// One row of `pgsum.change_queue`.
#[derive(Debug, Clone)]
struct ChangeEvent {
    id: i64,
    op: String,
    old_row: Option<JsonValue>,
    new_row: Option<JsonValue>,
}

/// Drains queued change events for every watched table, applying them to
/// `chunk_state`/`row_hashes`/`chunk_hashes` and marking affected chunks
/// dirty. Designed to be run on a timer or between CLI invocations (§5:
/// "single-writer per table" -- callers are responsible for not running two
/// consumers for the same table concurrently).
pub struct ChangeConsumer<'a> {
    pool: &'a PgPool,
}

impl<'a> ChangeConsumer<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Drain every queued event for one watched table, applying the §4.6
    /// state machine and marking touched chunks dirty. Returns the number
    /// of events applied.
    pub async fn drain_table(&self, schema: &str, table: &str) -> Result<u64> {
        let config = load_hash_config(self.pool, schema, table).await?;
        let events = fetch_events(self.pool, schema, table).await?;
        if events.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut dirty_chunks: HashMap<i64, ()> = HashMap::new();
        let mut max_id = 0i64;

        for event in &events {
            apply_event(&mut tx, &config, event, &mut dirty_chunks).await?;
            max_id = max_id.max(event.id);
        }

        for chunk in dirty_chunks.keys() {
            mark_chunk_dirty(&mut tx, schema, table, *chunk).await?;
        }

        delete_consumed(&mut tx, schema, table, max_id).await?;
        tx.commit().await?;

        debug!(schema, table, count = events.len(), "drained change_queue");
        Ok(events.len() as u64)
    }
}

async fn fetch_events(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<ChangeEvent>> {
    let rows = sqlx::query(
        "select id, op, old_row, new_row from pgsum.change_queue \
         where schema_name = $1 and table_name = $2 order by id asc",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ChangeEvent {
            id: r.get(0),
            op: r.get(1),
            old_row: r.get(2),
            new_row: r.get(3),
        })
        .collect())
}

/// Project a captured jsonb row (column name -> text value, or JSON null)
/// into the declared column order, matching how bootstrap reads columns.
fn project(row: &JsonValue, column_order: &[String]) -> Vec<Option<String>> {
    column_order
        .iter()
        .map(|c| row.get(c).and_then(|v| v.as_str().map(str::to_string)))
        .collect()
}

/// Reject a captured row whose key count no longer matches `column_order`
/// -- e.g. a concurrent `ALTER TABLE` landed between bootstrap and this
/// event being queued. `project` alone can't detect this: it silently
/// reads `None` for any column named in `column_order` but absent from
/// the captured object, so a shrunk row would otherwise hash as if every
/// dropped column were NULL.
fn validate_row_shape(row: &JsonValue, column_order: &[String]) -> Result<()> {
    let actual = row.as_object().map_or(0, |m| m.len());
    if actual != column_order.len() {
        return Err(pgsum_core::Error::ColumnCountMismatch {
            expected: column_order.len(),
            actual,
        }
        .into());
    }
    Ok(())
}

fn row64_of(row: &JsonValue, column_order: &[String]) -> Result<u64> {
    validate_row_shape(row, column_order)?;
    let values = project(row, column_order);
    let refs: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
    Ok(fasthash64(&row_bytes(&refs)))
}

fn chunk_of(row: &JsonValue, config: &HashConfig) -> i64 {
    let pk_values: Vec<Option<&str>> = config
        .pk_column_order
        .iter()
        .map(|pk| {
            row.get(pk)
                .and_then(|v| v.as_str())
        })
        .collect();
    chunk_id(&pk_bytes(&pk_values), config.chunk_width)
}

async fn apply_event(
    tx: &mut Transaction<'_, Postgres>,
    config: &HashConfig,
    event: &ChangeEvent,
    dirty_chunks: &mut HashMap<i64, ()>,
) -> Result<()> {
    match event.op.as_str() {
        "insert" => {
            let new_row = event.new_row.as_ref().expect("insert event missing new_row");
            let cid = chunk_of(new_row, config);
            let row64 = row64_of(new_row, &config.column_order)?;
            fold_chunk(tx, config, cid, |s| apply_insert(s, row64)).await?;
            if config.derivation == ChunkDerivation::SortedFold {
                upsert_row_hash(tx, config, new_row, cid).await?;
            }
            dirty_chunks.insert(cid, ());
        }
        "delete" => {
            let old_row = event.old_row.as_ref().expect("delete event missing old_row");
            let cid = chunk_of(old_row, config);
            let row64 = row64_of(old_row, &config.column_order)?;
            fold_chunk(tx, config, cid, |s| apply_delete(s, row64)).await?;
            if config.derivation == ChunkDerivation::SortedFold {
                delete_row_hash(tx, config, old_row).await?;
            }
            dirty_chunks.insert(cid, ());
        }
        "update" => {
            let old_row = event.old_row.as_ref().expect("update event missing old_row");
            let new_row = event.new_row.as_ref().expect("update event missing new_row");
            let old_cid = chunk_of(old_row, config);
            let new_cid = chunk_of(new_row, config);
            let old64 = row64_of(old_row, &config.column_order)?;
            let new64 = row64_of(new_row, &config.column_order)?;

            if old_cid == new_cid {
                fold_chunk(tx, config, old_cid, |s| {
                    apply_update_same_chunk(s, old64, new64)
                })
                .await?;
            } else {
                fold_chunk(tx, config, old_cid, |s| apply_delete(s, old64)).await?;
                fold_chunk(tx, config, new_cid, |s| apply_insert(s, new64)).await?;
                dirty_chunks.insert(new_cid, ());
            }
            if config.derivation == ChunkDerivation::SortedFold {
                delete_row_hash(tx, config, old_row).await?;
                upsert_row_hash(tx, config, new_row, new_cid).await?;
            }
            dirty_chunks.insert(old_cid, ());
        }
        other => {
            warn!(op = other, "ignoring unknown change_queue op");
        }
    }
    Ok(())
}

async fn fold_chunk(
    tx: &mut Transaction<'_, Postgres>,
    config: &HashConfig,
    chunk: i64,
    f: impl FnOnce(ChunkState) -> ChunkState,
) -> Result<()> {
    let row = sqlx::query(
        "select xor64, row_count from pgsum.chunk_state \
         where schema_name = $1 and table_name = $2 and chunk_id = $3",
    )
    .bind(&config.schema)
    .bind(&config.table)
    .bind(chunk)
    .fetch_optional(&mut **tx)
    .await?;

    let current = match row {
        Some(r) => ChunkState {
            xor64: r.get::<i64, _>(0) as u64,
            row_count: r.get::<i32, _>(1) as u32,
        },
        None => ChunkState::EMPTY,
    };

    let next = f(current);

    sqlx::query(
        "insert into pgsum.chunk_state(schema_name, table_name, chunk_id, xor64, row_count) \
         values ($1, $2, $3, $4, $5) \
         on conflict (schema_name, table_name, chunk_id) do update set \
         xor64 = excluded.xor64, row_count = excluded.row_count",
    )
    .bind(&config.schema)
    .bind(&config.table)
    .bind(chunk)
    .bind(next.xor64 as i64)
    .bind(next.row_count as i32)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn upsert_row_hash(
    tx: &mut Transaction<'_, Postgres>,
    config: &HashConfig,
    row: &JsonValue,
    chunk: i64,
) -> Result<()> {
    let values = project(row, &config.column_order);
    let refs: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
    let row_buf = row_bytes(&refs);
    let digest = row_digest(config.hash_algorithm, &row_buf);

    let pk_values: Vec<Option<&str>> = config
        .pk_column_order
        .iter()
        .map(|pk| row.get(pk).and_then(|v| v.as_str()))
        .collect();
    let pk = pk_bytes(&pk_values);
    let pk_digest = pgsum_core::pk_hash(config.hash_algorithm, &pk);

    sqlx::query(
        "insert into pgsum.row_hashes(schema_name, table_name, pk_hash, chunk_id, row_hash) \
         values ($1, $2, $3, $4, $5) \
         on conflict (schema_name, table_name, pk_hash) do update set \
         chunk_id = excluded.chunk_id, row_hash = excluded.row_hash",
    )
    .bind(&config.schema)
    .bind(&config.table)
    .bind(&pk_digest[..])
    .bind(chunk)
    .bind(&digest[..])
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn delete_row_hash(
    tx: &mut Transaction<'_, Postgres>,
    config: &HashConfig,
    row: &JsonValue,
) -> Result<()> {
    let pk_values: Vec<Option<&str>> = config
        .pk_column_order
        .iter()
        .map(|pk| row.get(pk).and_then(|v| v.as_str()))
        .collect();
    let pk = pk_bytes(&pk_values);
    let pk_digest = pgsum_core::pk_hash(config.hash_algorithm, &pk);

    sqlx::query(
        "delete from pgsum.row_hashes \
         where schema_name = $1 and table_name = $2 and pk_hash = $3",
    )
    .bind(&config.schema)
    .bind(&config.table)
    .bind(&pk_digest[..])
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn mark_chunk_dirty(
    tx: &mut Transaction<'_, Postgres>,
    schema: &str,
    table: &str,
    chunk: i64,
) -> Result<()> {
    sqlx::query(
        "insert into pgsum.chunk_hashes(schema_name, table_name, chunk_id, chunk_hash, row_count, dirty) \
         values ($1, $2, $3, $4, 0, true) \
         on conflict (schema_name, table_name, chunk_id) do update set dirty = true",
    )
    .bind(schema)
    .bind(table)
    .bind(chunk)
    .bind(&pgsum_core::empty_digest(pgsum_core::HashAlgorithm::Sha256)[..])
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn delete_consumed(
    tx: &mut Transaction<'_, Postgres>,
    schema: &str,
    table: &str,
    up_to_id: i64,
) -> Result<()> {
    sqlx::query(
        "delete from pgsum.change_queue \
         where schema_name = $1 and table_name = $2 and id <= $3",
    )
    .bind(schema)
    .bind(table)
    .bind(up_to_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_reads_columns_in_declared_order() {
        let row = json!({"v": "a", "id": "1"});
        let columns = vec!["id".to_string(), "v".to_string()];
        let values = project(&row, &columns);
        assert_eq!(values, vec![Some("1".to_string()), Some("a".to_string())]);
    }

    #[test]
    fn project_treats_missing_key_as_null() {
        let row = json!({"id": "1"});
        let columns = vec!["id".to_string(), "v".to_string()];
        let values = project(&row, &columns);
        assert_eq!(values, vec![Some("1".to_string()), None]);
    }

    #[test]
    fn validate_row_shape_accepts_matching_key_count() {
        let row = json!({"id": "1", "v": "a"});
        let columns = vec!["id".to_string(), "v".to_string()];
        assert!(validate_row_shape(&row, &columns).is_ok());
    }

    #[test]
    fn validate_row_shape_rejects_shrunk_row() {
        let row = json!({"id": "1"});
        let columns = vec!["id".to_string(), "v".to_string()];
        assert!(validate_row_shape(&row, &columns).is_err());
    }

    #[test]
    fn row64_of_is_deterministic_for_same_row() {
        let row = json!({"id": "1", "v": "a"});
        let columns = vec!["id".to_string(), "v".to_string()];
        let a = row64_of(&row, &columns).unwrap();
        let b = row64_of(&row, &columns).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn row64_of_differs_on_different_values() {
        let columns = vec!["id".to_string(), "v".to_string()];
        let a = row64_of(&json!({"id": "1", "v": "a"}), &columns).unwrap();
        let b = row64_of(&json!({"id": "1", "v": "b"}), &columns).unwrap();
        assert_ne!(a, b);
    }
}
