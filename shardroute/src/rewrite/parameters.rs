//! Parameters sent with each rewritten statement.

use std::collections::{BTreeMap, HashSet};

use super::insert::{InsertArena, RowValue};
use crate::route::RoutingUnit;
use crate::rule::DataNode;
use crate::value::Scalar;
use crate::Error;

/// Original parameters with in-place edits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatParameters {
    params: Vec<Scalar>,
    replaced: BTreeMap<usize, Scalar>,
    /// Values inserted before an original index.
    inserted: BTreeMap<usize, Vec<Scalar>>,
    appended: Vec<Scalar>,
}

impl FlatParameters {
    pub fn new(params: &[Scalar]) -> Self {
        Self {
            params: params.to_vec(),
            ..Default::default()
        }
    }

    /// Current value of an original parameter.
    pub fn get(&self, index: usize) -> Result<&Scalar, Error> {
        self.replaced
            .get(&index)
            .or_else(|| self.params.get(index))
            .ok_or(Error::MissingParameter(index))
    }

    /// Original value, before any replacement.
    pub fn original(&self, index: usize) -> Result<&Scalar, Error> {
        self.params.get(index).ok_or(Error::MissingParameter(index))
    }

    pub fn replace(&mut self, index: usize, value: Scalar) -> Result<(), Error> {
        if index >= self.params.len() {
            return Err(Error::MissingParameter(index));
        }
        self.replaced.insert(index, value);
        Ok(())
    }

    /// Insert a derived value before original parameter `index`.
    /// `index` may equal the parameter count.
    pub fn insert_before(&mut self, index: usize, value: Scalar) {
        self.inserted.entry(index).or_default().push(value);
    }

    pub fn append(&mut self, value: Scalar) {
        self.appended.push(value);
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn parameters(&self) -> Vec<Scalar> {
        let mut result = Vec::with_capacity(self.params.len() + self.appended.len());

        for (index, value) in self.params.iter().enumerate() {
            if let Some(inserted) = self.inserted.get(&index) {
                result.extend(inserted.iter().cloned());
            }
            result.push(self.replaced.get(&index).unwrap_or(value).clone());
        }

        if let Some(inserted) = self.inserted.get(&self.params.len()) {
            result.extend(inserted.iter().cloned());
        }

        result.extend(self.appended.iter().cloned());
        result
    }
}

/// Per-row parameters of a multi-row `INSERT`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedParameters {
    /// Parameters of each row, in row order.
    groups: Vec<Vec<Scalar>>,
    /// Data nodes of each row. Empty means every unit.
    nodes: Vec<Vec<DataNode>>,
    /// Parameters outside the rows, e.g. `ON DUPLICATE KEY UPDATE`.
    trailing: Vec<Scalar>,
}

impl GroupedParameters {
    /// Build from the final insert rows.
    ///
    /// Original parameters no row references stay at the end.
    pub fn new(arena: &InsertArena, flat: &FlatParameters) -> Result<Self, Error> {
        let mut referenced = HashSet::new();
        let mut groups = Vec::with_capacity(arena.rows.len());
        let mut nodes = Vec::with_capacity(arena.rows.len());

        for row in &arena.rows {
            let mut group = vec![];
            for value in &row.values {
                if let RowValue::Param { value, source } = value {
                    group.push(value.clone());
                    if let Some(source) = source {
                        referenced.insert(*source);
                    }
                }
            }
            groups.push(group);
            nodes.push(row.nodes.clone());
        }

        let mut trailing = vec![];
        for index in 0..flat.len() {
            if !referenced.contains(&index) {
                trailing.push(flat.get(index)?.clone());
            }
        }

        Ok(Self {
            groups,
            nodes,
            trailing,
        })
    }

    pub fn groups(&self) -> &[Vec<Scalar>] {
        &self.groups
    }

    /// Parameters of the rows the unit receives, then the trailing ones.
    pub fn parameters_for(&self, unit: &RoutingUnit) -> Vec<Scalar> {
        let mut result = vec![];

        for (group, nodes) in self.groups.iter().zip(self.nodes.iter()) {
            if nodes.is_empty() || nodes.iter().any(|node| unit.contains(node)) {
                result.extend(group.iter().cloned());
            }
        }

        result.extend(self.trailing.iter().cloned());
        result
    }
}

/// Parameter rebuilding mode.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterBuilder {
    /// Same parameters for every unit.
    Flat(FlatParameters),
    /// `INSERT` rows split across units.
    Grouped(GroupedParameters),
}

impl Default for ParameterBuilder {
    fn default() -> Self {
        Self::Flat(FlatParameters::default())
    }
}

impl ParameterBuilder {
    pub fn parameters_for(&self, unit: &RoutingUnit) -> Vec<Scalar> {
        match self {
            Self::Flat(flat) => flat.parameters(),
            Self::Grouped(grouped) => grouped.parameters_for(unit),
        }
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self, Self::Grouped(_))
    }
}
