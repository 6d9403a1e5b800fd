//! Catalog introspection: enumerate watchable user tables and their column
//! lists. Implemented as plain queries against `pg_catalog`/
//! `information_schema` rather than stored procedures (§9 REDESIGN FLAGS:
//! "a generic function that reads column metadata at event time" — simpler
//! than per-table code generation, and it's only called once per table, at
//! watch time).

use sqlx::{PgPool, Row};

use pgsum_core::{HashAlgorithm, HashConfig};

use crate::error::Result;

/// One user table eligible to be watched: has a primary key, lives outside
/// `pg_catalog`/`information_schema`/`pgsum`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

/// Enumerate every ordinary table in a non-system, non-`pgsum` schema
/// (§4.7 step 1). Tables without a primary key are skipped by the caller,
/// not by this query, so bootstrap can log which ones it is skipping.
pub async fn list_candidate_tables(pool: &PgPool) -> Result<Vec<TableRef>> {
    let rows = sqlx::query(
        r#"
        select n.nspname, c.relname
        from pg_class c
        join pg_namespace n on n.oid = c.relnamespace
        where c.relkind = 'r'
          and n.nspname not in ('pg_catalog', 'information_schema', 'pgsum')
        order by 1, 2
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| TableRef {
            schema: r.get(0),
            table: r.get(1),
        })
        .collect())
}

/// Primary-key columns, in declared PK order (§9 tie-break: attribute number
/// order). Empty if the table has no primary key.
pub async fn pk_columns(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        select a.attname
        from pg_constraint con
        join pg_class c on c.oid = con.conrelid
        join pg_namespace n on n.oid = c.relnamespace
        join unnest(con.conkey) with ordinality as x(attnum, k) on true
        join pg_attribute a on a.attrelid = c.oid and a.attnum = x.attnum
        where con.contype = 'p' and n.nspname = $1 and c.relname = $2
        order by x.k
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.get(0)).collect())
}

/// Every non-dropped column, in attribute-number order (§4.1's "declared
/// order of all non-dropped columns").
pub async fn all_columns(pool: &PgPool, schema: &str, table: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        select a.attname
        from pg_attribute a
        join pg_class c on a.attrelid = c.oid
        join pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1 and c.relname = $2
          and a.attnum > 0 and not a.attisdropped
        order by a.attnum
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.get(0)).collect())
}

/// The hash algorithm already pinned for this database, if any table has
/// been watched yet (§9 Open Question: one `HashAlgorithm` per database,
/// shared by every watched table).
pub async fn database_hash_algorithm(pool: &PgPool) -> Result<Option<HashAlgorithm>> {
    let row = sqlx::query("select hash_algorithm from pgsum.hash_config limit 1")
        .fetch_optional(pool)
        .await?;
    match row {
        Some(r) => {
            let algorithm: String = r.get(0);
            Ok(Some(algorithm.parse()?))
        }
        None => Ok(None),
    }
}

/// Load a watched table's pinned configuration, as persisted by
/// `bootstrap::watch_table` -- the single source of truth the consumer and
/// rehash read back, rather than re-deriving it from the live catalog.
pub async fn load_hash_config(pool: &PgPool, schema: &str, table: &str) -> Result<HashConfig> {
    let row = sqlx::query(
        "select chunk_width, hash_algorithm, derivation, column_order, pk_column_order \
         from pgsum.hash_config where schema_name = $1 and table_name = $2",
    )
    .bind(schema)
    .bind(table)
    .fetch_one(pool)
    .await?;

    let chunk_width: i32 = row.get(0);
    let hash_algorithm: String = row.get(1);
    let derivation: String = row.get(2);
    let column_order: Vec<String> = row.get(3);
    let pk_column_order: Vec<String> = row.get(4);

    Ok(HashConfig::new(
        schema.to_string(),
        table.to_string(),
        chunk_width as u32,
        hash_algorithm.parse()?,
        derivation.parse()?,
        column_order,
        pk_column_order,
    )?)
}
