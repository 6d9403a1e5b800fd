//! Driver configuration (§6), built explicitly at construction time rather
//! than read ambiently downstream (REDESIGN FLAGS, §9: "Global
//! configuration via environment... Replace with explicit injection at
//! construction time").

use url::Url;

use crate::error::{Error, Result};

/// Environment variable naming the base connection string.
pub const DATABASE_URL_VAR: &str = "PGSUM_DATABASE_URL";

/// Validated base connection configuration. The base URL's path component
/// (database name) is replaced per-database by [`DriverConfig::dsn_for`].
#[derive(Debug, Clone)]
pub struct DriverConfig {
    base_url: Url,
}

impl DriverConfig {
    /// Build a `DriverConfig` from an explicit connection string, validating
    /// the scheme eagerly (§6: "Missing or malformed connection string →
    /// fatal initialization error").
    pub fn new(base_connection_string: &str) -> Result<Self> {
        let url = Url::parse(base_connection_string)
            .map_err(|e| Error::config(format!("malformed {DATABASE_URL_VAR}: {e}")))?;
        if url.scheme() != "postgres" && url.scheme() != "postgresql" {
            return Err(Error::config(format!(
                "{DATABASE_URL_VAR} must be a postgres:// or postgresql:// URL, got scheme {:?}",
                url.scheme()
            )));
        }
        Ok(Self { base_url: url })
    }

    /// Build a `DriverConfig` from the `PGSUM_DATABASE_URL` environment
    /// variable.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var(DATABASE_URL_VAR)
            .map_err(|_| Error::config(format!("{DATABASE_URL_VAR} is not set")))?;
        Self::new(&raw)
    }

    /// Connection string for a specific target database, substituting the
    /// base URL's path.
    pub fn dsn_for(&self, dbname: &str) -> String {
        let mut url = self.base_url.clone();
        url.set_path(dbname);
        url.to_string()
    }
}
