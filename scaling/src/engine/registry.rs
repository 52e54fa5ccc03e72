use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::bail;
use crate::error::{ErrorKind, ScalingResult};

/// Engine components keyed by database type.
///
/// Database types are matched case-insensitively, `"PostgreSQL"` and `"postgresql"` name
/// the same engine.
pub struct DatabaseTypeRegistry<T: ?Sized> {
    entries: BTreeMap<String, Arc<T>>,
}

impl<T: ?Sized> DatabaseTypeRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registers `entry` for `database_type`, returning the entry it replaced.
    pub fn register(&mut self, database_type: &str, entry: Arc<T>) -> Option<Arc<T>> {
        self.entries.insert(normalize(database_type), entry)
    }

    pub fn with(mut self, database_type: &str, entry: Arc<T>) -> Self {
        self.register(database_type, entry);
        self
    }

    /// Returns the entry of `database_type`.
    ///
    /// Fails with [`ErrorKind::UnsupportedDatabaseType`] when nothing is registered for it.
    pub fn get(&self, database_type: &str) -> ScalingResult<Arc<T>> {
        match self.entries.get(&normalize(database_type)) {
            Some(entry) => Ok(entry.clone()),
            None => bail!(
                ErrorKind::UnsupportedDatabaseType,
                "No engine registered for database type",
                format!(
                    "database type '{database_type}' is not one of [{}]",
                    self.database_types().collect::<Vec<_>>().join(", ")
                )
            ),
        }
    }

    pub fn contains(&self, database_type: &str) -> bool {
        self.entries.contains_key(&normalize(database_type))
    }

    /// Registered database types, lowercased.
    pub fn database_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<T: ?Sized> Default for DatabaseTypeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for DatabaseTypeRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTypeRegistry")
            .field("database_types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize(database_type: &str) -> String {
    database_type.trim().to_ascii_lowercase()
}
