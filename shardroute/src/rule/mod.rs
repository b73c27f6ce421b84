//! Runtime rule set.
//!
//! Immutable snapshot built from [`shardroute_config::Config`]. Shared
//! by every routing call; configuration changes publish a new snapshot
//! through [`store`].

pub mod algorithm;
pub mod encrypt;
pub mod key_generator;
pub mod store;

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use shardroute_config::{Config, DataSource, General, KeyGeneratorKind, ShardingStrategy};
use tracing::debug;

pub use algorithm::Shard;
pub use encrypt::{EncryptAlgorithm, EncryptColumnRule, EncryptTableRule, EncryptorRegistry};
pub use key_generator::KeyGenerator;
pub use store::{replace_rules, rules, RuleStore};

use crate::Error;

/// Physical table in a data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DataNode {
    pub data_source: String,
    pub table: String,
}

impl DataNode {
    pub fn new(data_source: impl ToString, table: impl ToString) -> Self {
        Self {
            data_source: data_source.to_string(),
            table: table.to_string(),
        }
    }
}

impl Display for DataNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.data_source, self.table)
    }
}

/// Key column filled in on `INSERT`.
#[derive(Debug, Clone)]
pub struct KeyColumn {
    pub column: String,
    pub kind: KeyGeneratorKind,
    pub generator: Arc<dyn KeyGenerator>,
}

/// Logical to physical mapping of a sharded table.
#[derive(Debug, Clone)]
pub struct TableRule {
    pub logical_table: String,
    /// Actual tables per data source, in declaration order.
    pub actual_tables: IndexMap<String, Vec<String>>,
    pub database_strategy: ShardingStrategy,
    pub table_strategy: ShardingStrategy,
    pub key_generator: Option<KeyColumn>,
}

impl TableRule {
    pub fn data_sources(&self) -> Vec<String> {
        self.actual_tables.keys().cloned().collect()
    }

    /// Actual tables in a data source.
    ///
    /// A data source the rule doesn't declare falls back to every
    /// actual table name, so strategies still produce a (missing) node
    /// that the validator can report.
    pub fn tables_in(&self, data_source: &str) -> Vec<String> {
        match self.actual_tables.get(data_source) {
            Some(tables) => tables.clone(),
            None => {
                let mut tables: Vec<String> = vec![];
                for table in self.actual_tables.values().flatten() {
                    if !tables.contains(table) {
                        tables.push(table.clone());
                    }
                }
                tables
            }
        }
    }

    pub fn data_nodes(&self) -> Vec<DataNode> {
        self.actual_tables
            .iter()
            .flat_map(|(ds, tables)| tables.iter().map(move |table| DataNode::new(ds, table)))
            .collect()
    }

    /// The data node is declared by this rule.
    pub fn contains(&self, data_source: &str, table: &str) -> bool {
        self.actual_tables
            .get(data_source)
            .map(|tables| tables.iter().any(|t| t.eq_ignore_ascii_case(table)))
            .unwrap_or(false)
    }

    /// Position of an actual table inside its data source.
    pub fn position(&self, data_source: &str, table: &str) -> Option<usize> {
        self.actual_tables
            .get(data_source)
            .and_then(|tables| tables.iter().position(|t| t.eq_ignore_ascii_case(table)))
    }

    /// Columns read by the database and table strategies.
    pub fn sharding_columns(&self) -> Vec<&str> {
        let mut columns = self.database_strategy.columns();
        for column in self.table_strategy.columns() {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                columns.push(column);
            }
        }
        columns
    }
}

/// Logical tables sharded in lockstep.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BindingTableGroup {
    pub tables: Vec<String>,
}

impl BindingTableGroup {
    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.eq_ignore_ascii_case(table))
    }
}

/// Immutable rule snapshot.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub general: General,
    pub data_sources: Vec<DataSource>,
    pub default_data_source: Option<String>,
    pub default_database_strategy: ShardingStrategy,
    /// Sharded tables, by lowercase logical name.
    tables: IndexMap<String, TableRule>,
    binding_groups: Vec<BindingTableGroup>,
    broadcast_tables: HashSet<String>,
    encrypt_tables: HashMap<String, EncryptTableRule>,
}

impl RuleSet {
    /// Build a rule set from configuration.
    pub fn new(config: &Config, encryptors: &EncryptorRegistry) -> Result<Self, Error> {
        Self::with_previous(config, encryptors, None)
    }

    /// Build a rule set, reusing key generators of the previous snapshot
    /// whose configuration didn't change.
    pub fn with_previous(
        config: &Config,
        encryptors: &EncryptorRegistry,
        previous: Option<&RuleSet>,
    ) -> Result<Self, Error> {
        config.check()?;

        let data_source_names = config.data_source_names();
        let mut tables = IndexMap::new();

        for table in &config.sharded_tables {
            let mut actual_tables: IndexMap<String, Vec<String>> = IndexMap::new();
            for (ds, actual) in table.data_nodes(&data_source_names)? {
                actual_tables.entry(ds).or_default().push(actual);
            }

            let key_generator = match &table.key_generator {
                Some(key) => {
                    let kind = key
                        .generator
                        .clone()
                        .or_else(|| config.default_key_generator.clone())
                        .unwrap_or_default();

                    let reused = previous
                        .and_then(|previous| previous.table_rule(&table.name))
                        .and_then(|rule| rule.key_generator.as_ref())
                        .filter(|existing| {
                            existing.kind == kind
                                && existing.column.eq_ignore_ascii_case(&key.column)
                                && previous.map(|p| p.general.worker_id)
                                    == Some(config.general.worker_id)
                        })
                        .map(|existing| existing.generator.clone());

                    let generator = match reused {
                        Some(generator) => generator,
                        None => key_generator::build(&kind, config.general.worker_id)?,
                    };

                    Some(KeyColumn {
                        column: key.column.clone(),
                        kind,
                        generator,
                    })
                }
                None => None,
            };

            tables.insert(
                table.name.to_lowercase(),
                TableRule {
                    logical_table: table.name.clone(),
                    actual_tables,
                    database_strategy: table
                        .database_strategy
                        .clone()
                        .unwrap_or_else(|| config.default_database_strategy.clone()),
                    table_strategy: table
                        .table_strategy
                        .clone()
                        .unwrap_or_else(|| config.default_table_strategy.clone()),
                    key_generator,
                },
            );
        }

        let mut encrypt_tables = HashMap::new();
        for table in &config.encrypt_tables {
            encrypt_tables.insert(
                table.name.to_lowercase(),
                EncryptTableRule::new(table, encryptors)?,
            );
        }

        debug!(
            "rule set with {} sharded tables, {} broadcast tables, {} data sources",
            tables.len(),
            config.broadcast_tables.len(),
            config.data_sources.len()
        );

        Ok(Self {
            general: config.general.clone(),
            data_sources: config.data_sources.clone(),
            default_data_source: config.default_data_source.clone(),
            default_database_strategy: config.default_database_strategy.clone(),
            tables,
            binding_groups: config
                .binding_tables
                .iter()
                .map(|group| BindingTableGroup {
                    tables: group.tables.clone(),
                })
                .collect(),
            broadcast_tables: config
                .broadcast_tables
                .iter()
                .map(|table| table.to_lowercase())
                .collect(),
            encrypt_tables,
        })
    }

    pub fn table_rule(&self, table: &str) -> Option<&TableRule> {
        self.tables.get(&table.to_lowercase())
    }

    pub fn is_sharding_table(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_lowercase())
    }

    pub fn is_broadcast_table(&self, table: &str) -> bool {
        self.broadcast_tables.contains(&table.to_lowercase())
    }

    /// The table has a sharding or broadcast rule.
    pub fn has_rule(&self, table: &str) -> bool {
        self.is_sharding_table(table) || self.is_broadcast_table(table)
    }

    pub fn binding_group(&self, table: &str) -> Option<&BindingTableGroup> {
        self.binding_groups.iter().find(|group| group.contains(table))
    }

    /// Every table belongs to the same binding group.
    pub fn is_all_binding_tables(&self, tables: &[&str]) -> bool {
        match tables.first().and_then(|table| self.binding_group(table)) {
            Some(group) => tables.iter().all(|table| group.contains(table)),
            None => false,
        }
    }

    /// Tables routed in lockstep with `table`, itself first.
    pub fn bound_tables(&self, table: &str) -> Vec<String> {
        let mut tables = vec![table.to_string()];
        if let Some(group) = self.binding_group(table) {
            for other in &group.tables {
                if !other.eq_ignore_ascii_case(table) {
                    tables.push(other.clone());
                }
            }
        }
        tables
    }

    /// Sharding columns of a table, empty for tables without a sharding rule.
    pub fn sharding_columns(&self, table: &str) -> Vec<String> {
        self.table_rule(table)
            .map(|rule| {
                rule.sharding_columns()
                    .into_iter()
                    .map(|c| c.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_sharding_column(&self, table: &str, column: &str) -> bool {
        self.table_rule(table)
            .map(|rule| {
                rule.sharding_columns()
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(column))
            })
            .unwrap_or(false)
    }

    pub fn data_source_names(&self) -> Vec<String> {
        self.data_sources.iter().map(|ds| ds.name.clone()).collect()
    }

    /// One data source per server instance, in configuration order.
    pub fn instance_representatives(&self) -> Vec<String> {
        let mut instances = HashSet::new();
        self.data_sources
            .iter()
            .filter(|ds| instances.insert(ds.instance()))
            .map(|ds| ds.name.clone())
            .collect()
    }

    pub fn encrypt_table(&self, table: &str) -> Option<&EncryptTableRule> {
        self.encrypt_tables.get(&table.to_lowercase())
    }

    pub fn encrypt_column(&self, table: &str, column: &str) -> Option<&EncryptColumnRule> {
        self.encrypt_table(table)
            .and_then(|rule| rule.column(column))
    }

    pub fn key_generator(&self, table: &str) -> Option<&KeyColumn> {
        self.table_rule(table)
            .and_then(|rule| rule.key_generator.as_ref())
    }
}
