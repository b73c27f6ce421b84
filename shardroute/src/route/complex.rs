//! Complex routing: sharded tables that aren't bound to each other.
//!
//! Each binding group is routed on its own, then the units are combined
//! per data source. Only combinations that share a data source survive.

use tracing::trace;

use super::{standard, Hints, RoutingResult, RoutingUnit};
use crate::condition::ShardingConditions;
use crate::rule::RuleSet;
use crate::statement::BoundStatement;
use crate::Error;

pub fn route(
    rules: &RuleSet,
    statement: &BoundStatement,
    tables: &[&str],
    conditions: &ShardingConditions,
    hints: &Hints,
) -> Result<RoutingResult, Error> {
    trace!("routing {:?} using complex strategy", tables);

    // One table per binding group.
    let mut representatives: Vec<&str> = vec![];
    for &table in tables {
        let bound = representatives.iter().any(|representative| {
            rules
                .binding_group(representative)
                .map(|group| group.contains(table))
                .unwrap_or(false)
        });
        if !bound {
            representatives.push(table);
        }
    }

    let mut results = Vec::with_capacity(representatives.len());
    for table in &representatives {
        results.push(standard::route(rules, statement, table, conditions, hints)?);
    }

    let limit = rules.general.max_cartesian_units;
    let mut combined = RoutingResult::default();
    let Some(first) = results.first() else {
        return Ok(combined);
    };

    for data_source in first.data_sources() {
        // Units of each group on this data source.
        let groups: Vec<Vec<&RoutingUnit>> = results
            .iter()
            .map(|result| {
                result
                    .units
                    .iter()
                    .filter(|unit| unit.data_source == data_source)
                    .collect()
            })
            .collect();

        if groups.iter().any(|units| units.is_empty()) {
            continue;
        }

        let mut product = vec![RoutingUnit::new(data_source)];
        for units in groups {
            let mut next = Vec::with_capacity(product.len() * units.len());
            for partial in &product {
                for unit in &units {
                    let mut merged = partial.clone();
                    merged.table_units.extend(unit.table_units.iter().cloned());
                    next.push(merged);
                }
            }

            if combined.len() + next.len() > limit {
                return Err(Error::CartesianLimit {
                    units: combined.len() + next.len(),
                    limit,
                });
            }
            product = next;
        }

        for unit in product {
            combined.add(unit);
        }
    }

    if combined.is_empty() {
        return Err(Error::UnroutableStatement(format!(
            "tables [{}] share no data source",
            tables.join(", ")
        )));
    }

    Ok(combined)
}
