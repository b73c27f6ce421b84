//! Tables that physically exist, per reachable data source.

use std::collections::{HashMap, HashSet};

/// Live connectivity metadata.
///
/// Filled by whoever owns the connections; the router only reads it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveMetadata {
    /// Lowercase table names, by lowercase data source.
    data_sources: HashMap<String, HashSet<String>>,
}

impl LiveMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an existing table on a reachable data source.
    pub fn add_table(&mut self, data_source: &str, table: &str) -> &mut Self {
        self.data_sources
            .entry(data_source.to_lowercase())
            .or_default()
            .insert(table.to_lowercase());
        self
    }

    /// The table exists on a reachable data source.
    pub fn contains(&self, data_source: &str, table: &str) -> bool {
        self.data_sources
            .get(&data_source.to_lowercase())
            .map(|tables| tables.contains(&table.to_lowercase()))
            .unwrap_or(false)
    }
}
