//! `INSERT` rows, restructured before rendering.
//!
//! Rows are addressed by index everywhere: routing, parameter groups
//! and rendering all refer to the same arena.

use crate::key::GeneratedKey;
use crate::route::RoutingUnit;
use crate::rule::DataNode;
use crate::statement::{BoundStatement, Expr, Insert};
use crate::value::Scalar;
use crate::Error;

/// Value in a rewritten row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    Literal(Scalar),
    /// `?` marker. `source` is the original parameter index, `None`
    /// for derived values.
    Param {
        value: Scalar,
        source: Option<usize>,
    },
    /// Expression copied from the original SQL.
    Raw(String),
    Default,
}

impl RowValue {
    fn render(&self) -> String {
        match self {
            Self::Literal(value) => value.to_sql(),
            Self::Param { .. } => "?".into(),
            Self::Raw(text) => text.clone(),
            Self::Default => "DEFAULT".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertRow {
    pub values: Vec<RowValue>,
    /// Data nodes the row goes to. Empty means every unit.
    pub nodes: Vec<DataNode>,
}

impl InsertRow {
    fn uses_params(&self) -> bool {
        self.values
            .iter()
            .any(|value| matches!(value, RowValue::Param { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertArena {
    pub columns: Vec<String>,
    pub rows: Vec<InsertRow>,
    /// The column list differs from the statement's.
    pub columns_changed: bool,
}

impl InsertArena {
    /// Build rows from the statement.
    ///
    /// The generated key, if any, becomes the first column. It's sent as
    /// a parameter in rows that use parameters and as a literal otherwise.
    /// `DEFAULT` is replaced with the column default when there is one.
    pub fn new(
        statement: &BoundStatement,
        insert: &Insert,
        params: &[Scalar],
        generated: Option<&GeneratedKey>,
        nodes: &[Vec<DataNode>],
    ) -> Result<Self, Error> {
        let mut columns: Vec<String> = insert.columns.iter().map(|c| c.name.clone()).collect();
        let mut rows = Vec::with_capacity(insert.rows.len());

        for (index, exprs) in insert.rows.iter().enumerate() {
            let mut values = Vec::with_capacity(exprs.len() + 1);

            for (position, expr) in exprs.iter().enumerate() {
                let value = match expr {
                    Expr::Literal { value, .. } => RowValue::Literal(value.clone()),
                    Expr::Param { index, .. } => RowValue::Param {
                        value: params
                            .get(*index)
                            .cloned()
                            .ok_or(Error::MissingParameter(*index))?,
                        source: Some(*index),
                    },
                    Expr::Default { .. } => match insert
                        .columns
                        .get(position)
                        .and_then(|column| column.default.clone())
                    {
                        Some(default) => RowValue::Literal(default),
                        None => RowValue::Default,
                    },
                    Expr::Other { span } => RowValue::Raw(statement.text(*span).to_string()),
                };
                values.push(value);
            }

            rows.push(InsertRow {
                values,
                nodes: nodes.get(index).cloned().unwrap_or_default(),
            });
        }

        let mut columns_changed = false;

        if let Some(generated) = generated {
            columns.insert(0, generated.column.clone());
            columns_changed = true;

            for (row, key) in rows.iter_mut().zip(generated.values.iter()) {
                let value = if row.uses_params() {
                    RowValue::Param {
                        value: key.clone(),
                        source: None,
                    }
                } else {
                    RowValue::Literal(key.clone())
                };
                row.values.insert(0, value);
            }
        }

        Ok(Self {
            columns,
            rows,
            columns_changed,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }

    /// Rename a column.
    pub fn rename_column(&mut self, index: usize, name: &str) {
        if let Some(column) = self.columns.get_mut(index) {
            *column = name.to_string();
            self.columns_changed = true;
        }
    }

    /// Insert a column and its value in every row.
    pub fn insert_column(
        &mut self,
        index: usize,
        name: &str,
        mut value: impl FnMut(&InsertRow) -> Result<RowValue, Error>,
    ) -> Result<(), Error> {
        for row in self.rows.iter_mut() {
            let derived = value(row)?;
            row.values.insert(index.min(row.values.len()), derived);
        }
        self.columns.insert(index.min(self.columns.len()), name.to_string());
        self.columns_changed = true;
        Ok(())
    }

    /// Rows a unit receives.
    pub fn rows_for<'a>(&'a self, unit: &'a RoutingUnit) -> impl Iterator<Item = &'a InsertRow> {
        self.rows.iter().filter(move |row| {
            row.nodes.is_empty() || row.nodes.iter().any(|node| unit.contains(node))
        })
    }

    /// `(a, b, c)`
    pub fn render_columns(&self) -> String {
        format!("({})", self.columns.join(", "))
    }

    /// `(1, ?), (2, ?)` for the rows the unit receives.
    pub fn render_values(&self, unit: &RoutingUnit) -> String {
        self.rows_for(unit)
            .map(|row| {
                format!(
                    "({})",
                    row.values
                        .iter()
                        .map(|value| value.render())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
