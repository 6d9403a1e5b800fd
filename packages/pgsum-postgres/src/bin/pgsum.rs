//! `pgsum`: CLI for content-addressed Postgres fingerprinting (§6).

use clap::{Parser, Subcommand};
use pgsum_core::{to_hex, HashAlgorithm};
use pgsum_postgres::{
    aggregator, bootstrap::WatchOptions, bootstrap_database, connect, streaming, DriverConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pgsum", about = "Content-addressed Postgres fingerprinting")]
struct Cli {
    /// Target database name; appended to PGSUM_DATABASE_URL's base path.
    #[arg(long)]
    database: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bootstrap the whole database: watch every table with a primary key
    /// and print the resulting database root.
    Bootstrap {
        #[arg(long, default_value_t = 1024)]
        chunk_width: u32,
        #[arg(long, default_value = "sha256")]
        hash_algorithm: String,
        #[arg(long, default_value = "xor")]
        derivation: String,
    },
    /// Print one table's current digest.
    TableDigest {
        #[arg(long)]
        schema: String,
        #[arg(long)]
        table: String,
    },
    /// Print the whole database's digest.
    DatabaseRoot {
        #[arg(long, default_value = "sha256")]
        hash_algorithm: String,
    },
    /// Recompute digests for any chunks flagged dirty.
    RehashDirty {
        #[arg(long)]
        schema: String,
        #[arg(long)]
        table: String,
    },
    /// Drain queued DML events into chunk state.
    DrainChanges {
        #[arg(long)]
        schema: String,
        #[arg(long)]
        table: String,
    },
    /// Independent cross-check: stream-hash the raw table bytes.
    Fingerprint {
        #[arg(long)]
        schema: String,
        #[arg(long)]
        table: String,
        #[arg(long, default_value = "sha256")]
        hash_algorithm: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        tracing::error!(%err, "pgsum failed");
        std::process::exit(err.exit_code());
    }
}

async fn run() -> pgsum_postgres::Result<()> {
    let cli = Cli::parse();
    let driver_config = DriverConfig::from_env()?;
    let pool = connect(&driver_config.dsn_for(&cli.database)).await?;

    match cli.command {
        Command::Bootstrap {
            chunk_width,
            hash_algorithm,
            derivation,
        } => {
            let opts = WatchOptions {
                chunk_width,
                hash_algorithm: hash_algorithm
                    .parse()
                    .map_err(pgsum_postgres::Error::from)?,
                derivation: derivation.parse().map_err(pgsum_postgres::Error::from)?,
            };
            let digest = bootstrap_database(&pool, &opts).await?;
            println!("{}", to_hex(&digest));
        }
        Command::TableDigest { schema, table } => {
            let digest = aggregator::table_root(&pool, &schema, &table).await?;
            println!("{}", to_hex(&digest));
        }
        Command::DatabaseRoot { hash_algorithm } => {
            let algorithm: HashAlgorithm = hash_algorithm.parse().map_err(pgsum_postgres::Error::from)?;
            let digest = aggregator::database_root(&pool, algorithm).await?;
            println!("{}", to_hex(&digest));
        }
        Command::RehashDirty { schema, table } => {
            let count = pgsum_postgres::rehash_dirty(&pool, &schema, &table).await?;
            println!("rehashed {count} chunks");
        }
        Command::DrainChanges { schema, table } => {
            let consumer = pgsum_postgres::ChangeConsumer::new(&pool);
            let count = consumer.drain_table(&schema, &table).await?;
            println!("applied {count} events");
        }
        Command::Fingerprint {
            schema,
            table,
            hash_algorithm,
        } => {
            let algorithm: HashAlgorithm = hash_algorithm.parse().map_err(pgsum_postgres::Error::from)?;
            let pk_cols = pgsum_postgres::catalog::pk_columns(&pool, &schema, &table).await?;
            let (digest, bytes_streamed) =
                streaming::table_fingerprint(&pool, &schema, &table, &pk_cols, algorithm).await?;
            println!("{digest} {bytes_streamed}");
        }
    }

    Ok(())
}
