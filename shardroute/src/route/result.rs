//! Routing result.

use std::collections::BTreeSet;
use std::fmt::Display;

use indexmap::IndexSet;
use serde::Serialize;

use crate::rule::DataNode;

/// Logical table and the actual table it's rewritten to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableUnit {
    pub logical_table: String,
    pub actual_table: String,
}

impl TableUnit {
    pub fn new(logical_table: impl ToString, actual_table: impl ToString) -> Self {
        Self {
            logical_table: logical_table.to_string(),
            actual_table: actual_table.to_string(),
        }
    }
}

/// One data source connection and the tables addressed on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RoutingUnit {
    pub data_source: String,
    pub table_units: BTreeSet<TableUnit>,
}

impl RoutingUnit {
    pub fn new(data_source: impl ToString) -> Self {
        Self {
            data_source: data_source.to_string(),
            table_units: BTreeSet::new(),
        }
    }

    pub fn with_table(mut self, logical_table: impl ToString, actual_table: impl ToString) -> Self {
        self.table_units
            .insert(TableUnit::new(logical_table, actual_table));
        self
    }

    /// Actual table a logical table is rewritten to in this unit.
    pub fn actual_table(&self, logical_table: &str) -> Option<&str> {
        self.table_units
            .iter()
            .find(|unit| unit.logical_table.eq_ignore_ascii_case(logical_table))
            .map(|unit| unit.actual_table.as_str())
    }

    /// Data nodes addressed by this unit.
    pub fn data_nodes(&self) -> Vec<DataNode> {
        self.table_units
            .iter()
            .map(|unit| DataNode::new(&self.data_source, &unit.actual_table))
            .collect()
    }

    /// The unit addresses the data node.
    pub fn contains(&self, node: &DataNode) -> bool {
        self.data_source == node.data_source
            && self
                .table_units
                .iter()
                .any(|unit| unit.actual_table.eq_ignore_ascii_case(&node.table))
    }
}

impl Display for RoutingUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[{}]",
            self.data_source,
            self.table_units
                .iter()
                .map(|unit| format!("{}->{}", unit.logical_table, unit.actual_table))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// Where a statement executes.
///
/// Units are unique and kept in the order they were first produced,
/// so routing the same statement twice gives the same result.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RoutingResult {
    pub units: IndexSet<RoutingUnit>,
    /// Data nodes of each `INSERT` row, in row order.
    pub insert_rows: Vec<Vec<DataNode>>,
}

impl RoutingResult {
    /// Result that executes nowhere.
    pub fn ignore() -> Self {
        Self::default()
    }

    pub fn from_units(units: impl IntoIterator<Item = RoutingUnit>) -> Self {
        Self {
            units: units.into_iter().collect(),
            insert_rows: vec![],
        }
    }

    pub fn add(&mut self, unit: RoutingUnit) {
        self.units.insert(unit);
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Executes on exactly one data source.
    pub fn is_single(&self) -> bool {
        self.units.len() == 1
    }

    pub fn data_sources(&self) -> Vec<&str> {
        let mut names: Vec<&str> = vec![];
        for unit in &self.units {
            if !names.contains(&unit.data_source.as_str()) {
                names.push(&unit.data_source);
            }
        }
        names
    }
}

impl Display for RoutingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.units
                .iter()
                .map(|unit| unit.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        )
    }
}
