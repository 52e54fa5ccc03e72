use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio_postgres::types::PgLsn;

use crate::bail;
use crate::error::{ErrorKind, ScalingResult};

/// An opaque, totally ordered checkpoint in a source's change stream.
///
/// Engines encode their native checkpoint so that ordering the tokens orders the points in
/// the stream. A [`Position`] is the fence point separating what the inventory copy reads
/// from what the incremental replication applies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes a position produced from a Postgres WAL location.
    pub fn to_lsn(&self) -> ScalingResult<PgLsn> {
        match u64::from_str_radix(&self.0, 16) {
            Ok(lsn) => Ok(PgLsn::from(lsn)),
            Err(err) => bail!(
                ErrorKind::InvalidData,
                "Position is not a WAL location",
                format!("position '{}': {err}", self.0)
            ),
        }
    }
}

/// Fixed width hex keeps the lexical order of tokens equal to the WAL order.
impl From<PgLsn> for Position {
    fn from(lsn: PgLsn) -> Self {
        Self(format!("{:016X}", u64::from(lsn)))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Progress marker of a single inventory (historical copy) unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InventoryPosition {
    /// The whole table is copied, no key range applies.
    Placeholder,
    /// Rows whose integer primary key lies in `begin..=end`.
    PrimaryKey { begin: i64, end: i64 },
    /// The unit has already been copied.
    Finished,
}

impl InventoryPosition {
    pub fn is_finished(&self) -> bool {
        matches!(self, InventoryPosition::Finished)
    }
}

impl fmt::Display for InventoryPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryPosition::Placeholder => write!(f, "placeholder"),
            InventoryPosition::PrimaryKey { begin, end } => write!(f, "{begin}..={end}"),
            InventoryPosition::Finished => write!(f, "finished"),
        }
    }
}

/// Checkpoint set saved by a previous attempt of a job.
///
/// Incremental positions are keyed by source data source name. Inventory positions are
/// keyed by source data source name and then actual table name, since sources of a sharded
/// job usually share table names, and are ordered by split index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosition {
    #[serde(default)]
    pub incremental: BTreeMap<String, Position>,
    #[serde(default)]
    pub inventory: BTreeMap<String, BTreeMap<String, Vec<InventoryPosition>>>,
}

impl JobPosition {
    pub fn incremental_position(&self, data_source_name: &str) -> Option<&Position> {
        self.incremental.get(data_source_name)
    }

    pub fn inventory_positions(
        &self,
        data_source_name: &str,
        table_name: &str,
    ) -> Option<&[InventoryPosition]> {
        self.inventory
            .get(data_source_name)
            .and_then(|tables| tables.get(table_name))
            .map(Vec::as_slice)
            .filter(|positions| !positions.is_empty())
    }

    pub fn from_json(json: &str) -> ScalingResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> ScalingResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
