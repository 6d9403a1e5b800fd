//! Schema DDL (§6 "Persisted layout"): the `pgsum` schema and its five
//! entities. `hash_config` is a normal table (small, rarely written);
//! everything else is UNLOGGED because it is fully recomputable from the
//! watched user tables (§5 "Shared-resource policy").

/// Idempotent schema bootstrap, run once per database before any table is
/// watched.
pub const SCHEMA_DDL: &str = r#"
create schema if not exists pgsum;

create table if not exists pgsum.hash_config(
  schema_name text not null,
  table_name text not null,
  chunk_width int not null,
  hash_algorithm text not null,
  derivation text not null,
  column_order text[] not null,
  pk_column_order text[] not null,
  primary key(schema_name, table_name)
);

create unlogged table if not exists pgsum.row_hashes(
  schema_name text not null,
  table_name text not null,
  pk_hash bytea not null,
  chunk_id bigint not null,
  row_hash bytea not null,
  primary key(schema_name, table_name, pk_hash)
);

create index if not exists row_hashes_chunk_idx
  on pgsum.row_hashes(schema_name, table_name, chunk_id);

create unlogged table if not exists pgsum.chunk_state(
  schema_name text not null,
  table_name text not null,
  chunk_id bigint not null,
  xor64 bigint not null,
  row_count int not null,
  primary key(schema_name, table_name, chunk_id)
);

create unlogged table if not exists pgsum.chunk_hashes(
  schema_name text not null,
  table_name text not null,
  chunk_id bigint not null,
  chunk_hash bytea not null,
  row_count int not null,
  dirty boolean not null default false,
  primary key(schema_name, table_name, chunk_id)
);

-- Thin DML capture (§2 trigger-bridge redesign): triggers only append here.
-- All hashing happens in the Rust consumer, sharing code with bootstrap.
create unlogged table if not exists pgsum.change_queue(
  id bigserial primary key,
  schema_name text not null,
  table_name text not null,
  op text not null,
  old_row jsonb,
  new_row jsonb,
  captured_at timestamptz not null default now()
);

create index if not exists change_queue_table_idx
  on pgsum.change_queue(schema_name, table_name, id);
"#;

/// Drop every derived object for one `(schema, table)`: used when an
/// explicit reconfiguration changes `chunk_width` (§3 "Lifecycle") and when
/// a watch is dropped entirely.
pub fn drop_derived_state_sql() -> &'static str {
    r#"
    delete from pgsum.row_hashes where schema_name = $1 and table_name = $2;
    delete from pgsum.chunk_state where schema_name = $1 and table_name = $2;
    delete from pgsum.chunk_hashes where schema_name = $1 and table_name = $2;
    delete from pgsum.change_queue where schema_name = $1 and table_name = $2;
    delete from pgsum.hash_config where schema_name = $1 and table_name = $2;
    "#
}
