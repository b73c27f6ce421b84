//! Standard routing: one sharded table, or tables of one binding group.

use tracing::trace;

use super::{Hints, RoutingResult, RoutingUnit};
use crate::condition::{RouteValue, ShardingConditions};
use crate::rule::{algorithm, DataNode, RuleSet, TableRule};
use crate::statement::BoundStatement;
use crate::Error;

/// Route `table` and its binding siblings referenced by the statement.
///
/// Every condition is evaluated separately and the units are unioned.
/// Empty conditions route to every data node.
pub fn route(
    rules: &RuleSet,
    statement: &BoundStatement,
    table: &str,
    conditions: &ShardingConditions,
    hints: &Hints,
) -> Result<RoutingResult, Error> {
    let rule = rules
        .table_rule(table)
        .ok_or_else(|| Error::UnroutableStatement(format!("\"{}\" isn't sharded", table)))?;

    trace!("routing \"{}\" using standard strategy", rule.logical_table);

    let referenced = statement.table_names();
    let group = rules.bound_tables(table);
    let group: Vec<&str> = group.iter().map(|t| t.as_str()).collect();

    // Siblings addressed in the same unit.
    let siblings: Vec<&str> = group
        .iter()
        .skip(1)
        .filter(|sibling| {
            referenced
                .iter()
                .any(|table| table.eq_ignore_ascii_case(sibling))
        })
        .copied()
        .collect();

    let mut result = RoutingResult::default();
    let insert = statement.insert().is_some();

    if conditions.is_empty() {
        let nodes = route_condition(rules, rule, &siblings, &[], hints, &mut result)?;
        if insert {
            check_insert_row(&nodes)?;
            result.insert_rows.push(nodes);
        }
        return Ok(result);
    }

    for condition in &conditions.conditions {
        let values = condition.values_for(&group);
        let nodes = route_condition(rules, rule, &siblings, &values, hints, &mut result)?;

        if insert {
            check_insert_row(&nodes)?;
            result.insert_rows.push(nodes);
        }
    }

    Ok(result)
}

// Route one condition. Returns the data nodes of the primary table.
fn route_condition(
    rules: &RuleSet,
    rule: &TableRule,
    siblings: &[&str],
    values: &[&RouteValue],
    hints: &Hints,
    result: &mut RoutingResult,
) -> Result<Vec<DataNode>, Error> {
    let table = &rule.logical_table;
    let mut nodes = vec![];

    let data_sources = algorithm::route(
        &rule.database_strategy,
        &rule.data_sources(),
        values,
        hints.database_values(table),
    )?;

    for data_source in data_sources {
        let tables = algorithm::route(
            &rule.table_strategy,
            &rule.tables_in(&data_source),
            values,
            hints.table_values(table),
        )?;

        for actual in tables {
            let mut unit = RoutingUnit::new(&data_source).with_table(table, &actual);

            for sibling in siblings {
                let sibling_table = bound_table(rules, rule, sibling, &data_source, &actual)?;
                unit = unit.with_table(sibling, sibling_table);
            }

            nodes.push(DataNode::new(&data_source, &actual));
            result.add(unit);
        }
    }

    Ok(nodes)
}

/// Actual table of a binding sibling, at the same position as the
/// primary's actual table in the data source.
fn bound_table(
    rules: &RuleSet,
    primary: &TableRule,
    sibling: &str,
    data_source: &str,
    actual: &str,
) -> Result<String, Error> {
    let rule = rules
        .table_rule(sibling)
        .ok_or_else(|| Error::UnroutableStatement(format!("\"{}\" isn't sharded", sibling)))?;

    if let Some(table) = primary
        .position(data_source, actual)
        .and_then(|position| rule.actual_tables.get(data_source)?.get(position))
    {
        return Ok(table.clone());
    }

    // Outside the declared nodes: match by shard suffix instead.
    match algorithm::suffix(actual) {
        Some(index) => Ok(algorithm::resolve(&rule.tables_in(data_source), index)),
        None => Err(Error::UnroutableStatement(format!(
            "can't find the table bound to \"{}\" in \"{}\"",
            actual, sibling
        ))),
    }
}

fn check_insert_row(nodes: &[DataNode]) -> Result<(), Error> {
    if nodes.len() == 1 {
        Ok(())
    } else {
        Err(Error::AmbiguousShardingValue(format!(
            "insert row routes to {} data nodes: [{}]",
            nodes.len(),
            nodes
                .iter()
                .map(|node| node.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}
