use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::inline;
use crate::key_generator::KeyGeneratorConfig;
use crate::Error;

/// Logical table split across data sources and/or physical tables.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ShardedTable {
    /// Logical table name, as written in SQL.
    pub name: String,
    /// Physical data nodes, e.g. `ds_${0..1}.t_order_${0..1}`.
    ///
    /// If none specified, the table is assumed to exist under its
    /// logical name in every data source.
    #[serde(default)]
    pub actual_data_nodes: Option<String>,
    /// Strategy selecting the data source. Falls back to `default_database_strategy`.
    #[serde(default)]
    pub database_strategy: Option<ShardingStrategy>,
    /// Strategy selecting the table inside a data source. Falls back to `default_table_strategy`.
    #[serde(default)]
    pub table_strategy: Option<ShardingStrategy>,
    /// Column populated by the middleware when an `INSERT` doesn't supply it.
    #[serde(default)]
    pub key_generator: Option<KeyGeneratorConfig>,
}

impl ShardedTable {
    /// Expand `actual_data_nodes` into `(data_source, table)` pairs.
    pub fn data_nodes(&self, data_sources: &[String]) -> Result<Vec<(String, String)>, Error> {
        match &self.actual_data_nodes {
            Some(expression) => inline::data_nodes(expression),
            None => Ok(data_sources
                .iter()
                .map(|ds| (ds.clone(), self.name.clone()))
                .collect()),
        }
    }
}

/// How a logical table picks its shards along one axis (database or table).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShardingStrategy {
    /// Single sharding column.
    Standard {
        column: String,
        algorithm: ShardingAlgorithm,
    },
    /// Several sharding columns, every column narrows the result.
    Complex {
        columns: Vec<String>,
        algorithm: ShardingAlgorithm,
    },
    /// Shard values supplied by the caller instead of the query.
    Hint { algorithm: ShardingAlgorithm },
    /// No sharding on this axis.
    #[default]
    None,
}

impl ShardingStrategy {
    /// Columns this strategy reads from the query.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Standard { column, .. } => vec![column.as_str()],
            Self::Complex { columns, .. } => columns.iter().map(|c| c.as_str()).collect(),
            Self::Hint { .. } | Self::None => vec![],
        }
    }

    pub fn algorithm(&self) -> Option<&ShardingAlgorithm> {
        match self {
            Self::Standard { algorithm, .. }
            | Self::Complex { algorithm, .. }
            | Self::Hint { algorithm } => Some(algorithm),
            Self::None => None,
        }
    }

    pub fn is_hint(&self) -> bool {
        matches!(self, Self::Hint { .. })
    }

    /// Validate strategy parameters.
    pub fn check(&self) -> Result<(), Error> {
        if let Self::Complex { columns, .. } = self {
            if columns.is_empty() {
                return Err(Error::invalid(format!("{}: no sharding columns", self)));
            }
        }

        match self.algorithm() {
            Some(algorithm) => algorithm.check(),
            None => Ok(()),
        }
    }
}

impl Display for ShardingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard { column, algorithm } => {
                write!(f, "standard(column={}, algorithm={})", column, algorithm)
            }
            Self::Complex { columns, algorithm } => write!(
                f,
                "complex(columns=[{}], algorithm={})",
                columns.join(", "),
                algorithm
            ),
            Self::Hint { algorithm } => write!(f, "hint(algorithm={})", algorithm),
            Self::None => write!(f, "none"),
        }
    }
}

/// Function mapping a sharding value to a shard index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShardingAlgorithm {
    /// `value % sharding_count`, integers only.
    Mod { sharding_count: usize },
    /// `crc32c(value) % sharding_count`.
    HashMod { sharding_count: usize },
    /// Half-open `[start, end)` ranges.
    Range { ranges: Vec<RangeShard> },
    /// Explicit value lists.
    List { lists: Vec<ListShard> },
}

impl ShardingAlgorithm {
    /// Validate algorithm parameters.
    pub fn check(&self) -> Result<(), Error> {
        match self {
            Self::Mod { sharding_count } | Self::HashMod { sharding_count }
                if *sharding_count == 0 =>
            {
                Err(Error::invalid(format!(
                    "{}: sharding_count must be greater than zero",
                    self
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Display for ShardingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mod { sharding_count } => write!(f, "mod({})", sharding_count),
            Self::HashMod { sharding_count } => write!(f, "hash_mod({})", sharding_count),
            Self::Range { ranges } => write!(f, "range({} ranges)", ranges.len()),
            Self::List { lists } => write!(f, "list({} lists)", lists.len()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct RangeShard {
    #[serde(default)]
    pub start: Option<FlexibleType>,
    #[serde(default)]
    pub end: Option<FlexibleType>,
    pub shard: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ListShard {
    pub values: Vec<FlexibleType>,
    pub shard: usize,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Eq, Hash, JsonSchema)]
#[serde(untagged)]
pub enum FlexibleType {
    Integer(i64),
    Uuid(uuid::Uuid),
    String(String),
}

impl From<i64> for FlexibleType {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<uuid::Uuid> for FlexibleType {
    fn from(value: uuid::Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<String> for FlexibleType {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for FlexibleType {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

/// Tables sharded in lockstep with each other.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct BindingTables {
    pub tables: Vec<String>,
}
