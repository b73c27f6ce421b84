//! Routing and rewrite errors.

use thiserror::Error;

use crate::rule::key_generator;

#[derive(Debug, Error)]
pub enum Error {
    #[error("statement can't be routed: {0}")]
    UnroutableStatement(String),

    #[error("ambiguous sharding value: {0}")]
    AmbiguousShardingValue(String),

    #[error("{0}")]
    AbsentDataNodes(Box<AbsentDataNodes>),

    #[error("assisted query column \"{table}.{column}\" requires an encryptor that supports it")]
    MissingEncryptConfiguration { table: String, column: String },

    #[error("rewrite tokens overlap at {first:?} and {second:?}")]
    GeneratorOverlap {
        first: (usize, usize),
        second: (usize, usize),
    },

    #[error("missing parameter: ?{0}")]
    MissingParameter(usize),

    #[error("cartesian route produces {units} units, limit is {limit}")]
    CartesianLimit { units: usize, limit: usize },

    #[error("sharding value \"{value}\" isn't valid for {algorithm}")]
    InvalidShardingValue { value: String, algorithm: String },

    #[error("encrypt \"{table}.{column}\": {reason}")]
    Encrypt {
        table: String,
        column: String,
        reason: String,
    },

    #[error("unknown data source \"{0}\"")]
    UnknownDataSource(String),

    #[error("unknown encryptor \"{0}\"")]
    UnknownEncryptor(String),

    #[error("{0}")]
    KeyGenerator(#[from] key_generator::Error),

    #[error("config: {0}")]
    Config(#[from] shardroute_config::Error),
}

impl Error {
    /// The error is an internal invariant violation, not bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::GeneratorOverlap { .. })
    }
}

impl From<AbsentDataNodes> for Error {
    fn from(value: AbsentDataNodes) -> Self {
        Self::AbsentDataNodes(Box::new(value))
    }
}

/// Data nodes a routing unit points at that don't exist.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsentDataNodes {
    /// Data source of the routing unit.
    pub data_source: String,
    /// One entry per logical table with missing nodes.
    pub tables: Vec<AbsentTable>,
}

impl AbsentDataNodes {
    /// Missing nodes of every table, as `data_source.table`.
    pub fn nodes(&self) -> Vec<&str> {
        self.tables
            .iter()
            .flat_map(|table| table.nodes.iter().map(|node| node.as_str()))
            .collect()
    }
}

impl std::fmt::Display for AbsentDataNodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self
            .tables
            .iter()
            .map(|table| table.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", tables)
    }
}

/// Missing nodes of one logical table, with the strategies that picked them.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsentTable {
    pub logical_table: String,
    /// Missing nodes, as `data_source.table`.
    pub nodes: Vec<String>,
    pub database_strategy: String,
    pub table_strategy: String,
    /// Route values the strategies were evaluated with.
    pub route_values: Vec<String>,
}

impl std::fmt::Display for AbsentTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "data nodes [{}] of table \"{}\" don't exist, database strategy: {}, table strategy: {}",
            self.nodes.join(", "),
            self.logical_table,
            self.database_strategy,
            self.table_strategy,
        )?;

        if !self.route_values.is_empty() {
            write!(f, ", route values: [{}]", self.route_values.join(", "))?;
        }

        Ok(())
    }
}
