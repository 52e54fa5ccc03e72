use serde::{Deserialize, Serialize};

use crate::SerializableSecretString;
use crate::shared::ValidationError;

/// Default upper bound of connections a single data source pool may open.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

/// Connection descriptor of a source or target datastore.
///
/// The descriptor is opaque to the preparation pipeline, only the engine selected by
/// [`DataSourceConfig::database_type`] interprets the url.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DataSourceConfig {
    /// Engine variant identifier, for example `PostgreSQL`.
    pub database_type: String,
    /// Engine specific connection url.
    pub url: String,
    /// User to authenticate as, when not embedded in the url.
    #[serde(default)]
    pub username: Option<String>,
    /// Password of [`DataSourceConfig::username`]. Redacted in debug output.
    #[serde(default)]
    pub password: Option<SerializableSecretString>,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Identity of a connection pool.
///
/// Two descriptors with the same key share one pool within a preparation call.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataSourceKey {
    pub database_type: String,
    pub url: String,
    pub username: Option<String>,
}

impl DataSourceConfig {
    pub fn new(database_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            database_type: database_type.into(),
            url: url.into(),
            username: None,
            password: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<SerializableSecretString>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Returns the key identifying the pool for this descriptor.
    pub fn key(&self) -> DataSourceKey {
        DataSourceKey {
            database_type: self.database_type.to_lowercase(),
            url: self.url.clone(),
            username: self.username.clone(),
        }
    }

    /// Checks that the descriptor names an engine and a location.
    pub fn validate(&self, name: &str) -> Result<(), ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidDataSource {
            name: name.to_owned(),
            reason: reason.to_owned(),
        };

        if self.database_type.trim().is_empty() {
            return Err(invalid("`database_type` is empty"));
        }
        if self.url.trim().is_empty() {
            return Err(invalid("`url` is empty"));
        }
        if self.max_connections == 0 {
            return Err(invalid("`max_connections` cannot be zero"));
        }

        Ok(())
    }
}
