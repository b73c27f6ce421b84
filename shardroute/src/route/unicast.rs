//! Unicast routing: one data source, one actual table per logical table.

use tracing::trace;

use super::{RoutingResult, RoutingUnit};
use crate::rule::RuleSet;
use crate::Error;

/// Route to the first data source every table can live on.
///
/// Sharded tables address their first actual table in that data source;
/// other tables keep their name.
pub fn route(rules: &RuleSet, tables: &[&str]) -> Result<RoutingResult, Error> {
    trace!("routing using unicast");

    let mut candidates = rules.data_source_names();

    for table in tables {
        if let Some(rule) = rules.table_rule(table) {
            let data_sources = rule.data_sources();
            candidates.retain(|ds| data_sources.contains(ds));
        }
    }

    let Some(data_source) = candidates.into_iter().next() else {
        return Err(Error::UnroutableStatement(format!(
            "no data source holds all of [{}]",
            tables.join(", ")
        )));
    };

    let mut unit = RoutingUnit::new(&data_source);
    for table in tables {
        match rules.table_rule(table) {
            Some(rule) => {
                let actual = rule
                    .tables_in(&data_source)
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        Error::UnroutableStatement(format!(
                            "table \"{}\" has no data nodes in \"{}\"",
                            table, data_source
                        ))
                    })?;
                unit = unit.with_table(table, actual);
            }
            None => unit = unit.with_table(table, table),
        }
    }

    Ok(RoutingResult::from_units([unit]))
}
