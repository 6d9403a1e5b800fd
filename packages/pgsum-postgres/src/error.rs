//! Error types for pgsum-postgres (§7).

use thiserror::Error;

/// Error kinds, matching §7's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing/malformed connection string, unsupported scheme.
    Config,
    /// Watched table has no primary key (not fatal -- callers skip it).
    SchemaMismatch,
    /// Postgres driver / query failure.
    Database,
    /// RowHash/ChunkState/ChunkHash inconsistency detected at read time.
    Corruption,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::SchemaMismatch => "schema_mismatch",
            ErrorKind::Database => "database",
            ErrorKind::Corruption => "corruption",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct Error {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaMismatch, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corruption, message)
    }

    /// Exit code for the CLI binary (§6): 0 reserved for success, any
    /// fatal error maps to 1.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::database(format!("Postgres error: {err}")).with_source(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::config(format!("invalid connection string: {err}")).with_source(err)
    }
}

impl From<pgsum_core::Error> for Error {
    fn from(err: pgsum_core::Error) -> Self {
        Error::new(ErrorKind::Config, format!("hashing config error: {err}")).with_source(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Narrow a stored digest column into a 32-byte array, surfacing a short
/// column as corruption rather than panicking on `copy_from_slice`.
pub fn expect_32_bytes(bytes: Vec<u8>, context: &str) -> Result<[u8; 32]> {
    if bytes.len() != 32 {
        return Err(Error::corruption(format!(
            "{context}: expected a 32-byte digest, got {}",
            bytes.len()
        )));
    }
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&bytes);
    Ok(buf)
}
