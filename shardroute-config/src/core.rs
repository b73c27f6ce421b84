use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::read_to_string;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use super::data_source::DataSource;
use super::encrypt::EncryptTable;
use super::error::Error;
use super::general::General;
use super::key_generator::KeyGeneratorKind;
use super::sharding::{BindingTables, ShardedTable, ShardingStrategy};

/// Rule configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: General,

    /// Data source receiving statements on tables without a sharding rule.
    #[serde(default)]
    pub default_data_source: Option<String>,

    /// Tables replicated identically to every data source.
    #[serde(default)]
    pub broadcast_tables: Vec<String>,

    /// Database strategy for sharded tables that don't declare one.
    #[serde(default)]
    pub default_database_strategy: ShardingStrategy,

    /// Table strategy for sharded tables that don't declare one.
    #[serde(default)]
    pub default_table_strategy: ShardingStrategy,

    /// Key generator for key columns that don't declare one.
    #[serde(default)]
    pub default_key_generator: Option<KeyGeneratorKind>,

    /// Physical databases.
    #[serde(default)]
    pub data_sources: Vec<DataSource>,

    /// Sharded tables.
    #[serde(default)]
    pub sharded_tables: Vec<ShardedTable>,

    /// Groups of tables sharded in lockstep.
    #[serde(default)]
    pub binding_tables: Vec<BindingTables>,

    /// Tables with encrypted columns.
    #[serde(default)]
    pub encrypt_tables: Vec<EncryptTable>,
}

impl Config {
    /// Load configuration from disk or use defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        let config = if let Ok(text) = read_to_string(path) {
            let config = Self::from_str(&text)?;
            info!("loaded \"{}\"", path.display());
            config
        } else {
            warn!(
                "\"{}\" doesn't exist, loading defaults instead",
                path.display()
            );
            Config::default()
        };

        config.check()?;

        Ok(config)
    }

    /// Names of all data sources, in configuration order.
    pub fn data_source_names(&self) -> Vec<String> {
        self.data_sources.iter().map(|ds| ds.name.clone()).collect()
    }

    /// Find sharded table configuration by logical name.
    pub fn sharded_table(&self, name: &str) -> Option<&ShardedTable> {
        self.sharded_tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    /// Validate references between sections.
    pub fn check(&self) -> Result<(), Error> {
        let data_sources = self
            .data_sources
            .iter()
            .map(|ds| ds.name.as_str())
            .collect::<HashSet<_>>();

        if data_sources.len() != self.data_sources.len() {
            return Err(Error::invalid("data source names must be unique"));
        }

        if let Some(ref default) = self.default_data_source {
            if !data_sources.contains(default.as_str()) {
                return Err(Error::invalid(format!(
                    "default data source \"{}\" is not configured",
                    default
                )));
            }
        }

        self.default_database_strategy.check()?;
        self.default_table_strategy.check()?;

        let names = self.data_source_names();
        for table in &self.sharded_tables {
            for strategy in [&table.database_strategy, &table.table_strategy]
                .into_iter()
                .flatten()
            {
                strategy.check()?;
            }

            for (ds, _) in table.data_nodes(&names)? {
                if !data_sources.contains(ds.as_str()) {
                    return Err(Error::invalid(format!(
                        "table \"{}\" references unknown data source \"{}\"",
                        table.name, ds
                    )));
                }
            }
        }

        for group in &self.binding_tables {
            for table in &group.tables {
                if self.sharded_table(table).is_none() {
                    return Err(Error::invalid(format!(
                        "binding table \"{}\" has no sharding rule",
                        table
                    )));
                }
            }
        }

        for table in &self.broadcast_tables {
            if self.sharded_table(table).is_some() {
                return Err(Error::invalid(format!(
                    "table \"{}\" can't be both sharded and broadcast",
                    table
                )));
            }
        }

        for table in &self.encrypt_tables {
            for column in &table.columns {
                if column.cipher_column.is_empty() {
                    return Err(Error::invalid(format!(
                        "encrypted column \"{}.{}\" has no cipher column",
                        table.name, column.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// JSON schema of the configuration file.
    pub fn json_schema() -> Result<String, Error> {
        let schema = schemars::schema_for!(Config);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
