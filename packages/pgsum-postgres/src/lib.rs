//! pgsum-postgres: the Postgres driver for content-addressed database
//! fingerprinting. Talks to the database, owns the `pgsum` schema, and
//! wires `pgsum-core`'s pure hashing/combinator primitives to real tables,
//! triggers, and queries.

pub mod aggregator;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod consumer;
pub mod ddl;
pub mod error;
pub mod rehash;
pub mod streaming;
pub mod trigger;

pub use bootstrap::{bootstrap_database, watch_table, WatchOptions};
pub use catalog::{list_candidate_tables, load_hash_config, TableRef};
pub use config::DriverConfig;
pub use consumer::ChangeConsumer;
pub use error::{Error, ErrorKind, Result};
pub use rehash::rehash_dirty;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to a database and ensure the `pgsum` schema exists (§6: "run
/// automatically on first connection... rather than via a separate
/// migration step").
pub async fn connect(dsn: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new().max_connections(5).connect(dsn).await?;
    sqlx::query(ddl::SCHEMA_DDL).execute(&pool).await?;
    Ok(pool)
}
