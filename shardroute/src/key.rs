//! Generated key allocation.

use serde::Serialize;
use tracing::trace;

use crate::rule::TableRule;
use crate::statement::Insert;
use crate::value::Scalar;
use crate::Error;

/// Key values allocated for an `INSERT`, one per row, in row order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedKey {
    pub column: String,
    pub values: Vec<Scalar>,
}

/// Allocate key values for every row of an `INSERT`.
///
/// Returns `None` if the table has no key generator or the statement
/// already supplies the key column.
pub fn allocate(table_rule: &TableRule, insert: &Insert) -> Result<Option<GeneratedKey>, Error> {
    let Some(key) = &table_rule.key_generator else {
        return Ok(None);
    };

    if insert.column_index(&key.column).is_some() {
        return Ok(None);
    }

    let mut values = Vec::with_capacity(insert.rows.len());
    for _ in &insert.rows {
        values.push(key.generator.next_key()?);
    }

    trace!(
        "allocated {} keys for \"{}.{}\"",
        values.len(),
        table_rule.logical_table,
        key.column
    );

    Ok(Some(GeneratedKey {
        column: key.column.clone(),
        values,
    }))
}
