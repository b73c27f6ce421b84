//! Routing decision tree.
//!
//! Rules are checked in order and the first match wins.

use tracing::debug;

use super::{broadcast, complex, standard, unicast, Hints, RoutingResult};
use crate::condition::{RouteValue, ShardingCondition, ShardingConditions};
use crate::rule::RuleSet;
use crate::statement::{BoundStatement, DalKind, DdlKind, StatementKind};
use crate::Error;

/// Route a bound statement.
pub fn route(
    rules: &RuleSet,
    statement: &BoundStatement,
    conditions: &ShardingConditions,
    hints: &Hints,
) -> Result<RoutingResult, Error> {
    if let Some(result) = hints.route_database_only(rules)? {
        return Ok(result);
    }

    let tables = statement.table_names();
    let ruled: Vec<&str> = tables
        .iter()
        .copied()
        .filter(|table| rules.has_rule(table))
        .collect();

    let result = match &statement.kind {
        StatementKind::Tcl => {
            debug!("transaction control, broadcasting to every data source");
            broadcast::database(rules)
        }

        StatementKind::Ddl { kind, .. } => match kind {
            DdlKind::Routine => broadcast::database(rules),
            DdlKind::Tablespace => broadcast::instance(rules),
            _ if !tables.is_empty() && ruled.is_empty() => default_or_ignore(rules, &tables),
            _ if tables.is_empty() => broadcast::database(rules),
            _ => broadcast::tables(rules, &ruled),
        },

        StatementKind::Dal(kind) => match kind {
            DalKind::Use => RoutingResult::ignore(),
            DalKind::Set | DalKind::ShowDatabases => broadcast::database(rules),
            _ if !tables.is_empty() && ruled.is_empty() => default_or_ignore(rules, &tables),
            DalKind::Optimize => broadcast::tables(rules, &ruled),
            DalKind::Analyze if ruled.is_empty() => broadcast::database(rules),
            DalKind::Analyze => broadcast::tables(rules, &ruled),
            DalKind::ShowTable => unicast::route(rules, &tables)?,
            DalKind::Other if !ruled.is_empty() => {
                dml(rules, statement, &tables, conditions, hints)?
            }
            DalKind::Other => broadcast::instance(rules),
        },

        StatementKind::Dcl { wildcard } => {
            if tables.len() == 1 && !wildcard {
                broadcast::tables(rules, &ruled)
            } else {
                broadcast::instance(rules)
            }
        }

        StatementKind::Unsupported(reason) => {
            return Err(Error::UnroutableStatement(reason.clone()));
        }

        StatementKind::Select(_)
        | StatementKind::Insert(_)
        | StatementKind::Update(_)
        | StatementKind::Delete(_) => dml(rules, statement, &tables, conditions, hints)?,
    };

    debug!("routed to [{}]", result);

    Ok(result)
}

fn default_or_ignore(rules: &RuleSet, tables: &[&str]) -> RoutingResult {
    match &rules.default_data_source {
        Some(data_source) => broadcast::single(data_source, tables),
        None => RoutingResult::ignore(),
    }
}

fn dml(
    rules: &RuleSet,
    statement: &BoundStatement,
    tables: &[&str],
    conditions: &ShardingConditions,
    hints: &Hints,
) -> Result<RoutingResult, Error> {
    if let Some(data_source) = &rules.default_data_source {
        if !tables.is_empty() && tables.iter().all(|table| !rules.has_rule(table)) {
            debug!("no rule applies, routing to default data source \"{}\"", data_source);
            return Ok(broadcast::single(data_source, tables));
        }
    }

    if !tables.is_empty() && tables.iter().all(|table| rules.is_broadcast_table(table)) {
        return if statement.is_read() {
            unicast::route(rules, tables)
        } else {
            Ok(broadcast::database(rules))
        };
    }

    if tables.is_empty() {
        if let Some(data_source) = &rules.default_data_source {
            return Ok(broadcast::single(data_source, tables));
        }
    }

    let sharded: Vec<&str> = tables
        .iter()
        .copied()
        .filter(|table| rules.is_sharding_table(table))
        .collect();

    if sharded.is_empty() || conditions.always_false {
        return unicast::route(rules, tables);
    }

    if !statement.is_dml() && conditions.is_empty() {
        return Err(Error::AmbiguousShardingValue(format!(
            "no sharding value for [{}]",
            sharded.join(", ")
        )));
    }

    let merged;
    let mut conditions = conditions;
    let subquery = statement.has_subquery() && !conditions.is_empty();
    if subquery {
        merged = merge_subquery_conditions(rules, conditions)?;
        conditions = &merged;
    }

    let result = if sharded.len() == 1 || rules.is_all_binding_tables(&sharded) {
        let primary = conditions
            .conditions
            .first()
            .and_then(|condition| condition.values.first())
            .and_then(|value| {
                sharded
                    .iter()
                    .find(|table| table.eq_ignore_ascii_case(&value.table))
            })
            .copied()
            .unwrap_or(sharded[0]);

        standard::route(rules, statement, primary, conditions, hints)?
    } else {
        complex::route(rules, statement, &sharded, conditions, hints)?
    };

    if subquery && result.len() != 1 {
        return Err(Error::AmbiguousShardingValue(format!(
            "statement with subquery must route to one unit, routed to {}",
            result.len()
        )));
    }

    Ok(result)
}

/// Subqueries must restrict the statement to one set of values.
///
/// Every condition, outer and nested, must carry the same route values
/// on the same columns. Tables of one binding group count as the same
/// table. Equal conditions collapse into one.
fn merge_subquery_conditions(
    rules: &RuleSet,
    conditions: &ShardingConditions,
) -> Result<ShardingConditions, Error> {
    let Some(first) = conditions.conditions.first() else {
        return Ok(conditions.clone());
    };

    for condition in &conditions.conditions[1..] {
        if !same_condition(rules, first, condition) {
            return Err(Error::AmbiguousShardingValue(format!(
                "subquery condition [{}] differs from [{}]",
                describe(condition),
                describe(first)
            )));
        }
    }

    Ok(ShardingConditions::new(vec![first.clone()]))
}

fn same_condition(rules: &RuleSet, a: &ShardingCondition, b: &ShardingCondition) -> bool {
    let key = |value: &RouteValue| {
        let table = rules
            .binding_group(&value.table)
            .and_then(|group| group.tables.first())
            .unwrap_or(&value.table)
            .to_lowercase();
        (table, value.column.to_lowercase())
    };

    let covers = |a: &ShardingCondition, b: &ShardingCondition| {
        a.values.iter().all(|value| {
            b.values
                .iter()
                .any(|other| key(value) == key(other) && value.values == other.values)
        })
    };

    a.values.len() == b.values.len() && covers(a, b) && covers(b, a)
}

fn describe(condition: &ShardingCondition) -> String {
    condition
        .values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
