//! Extract sharding conditions from a bound statement.

use std::ops::Bound;

use tracing::trace;

use super::{RouteRange, RouteValue, RouteValues, ShardingCondition, ShardingConditions};
use crate::key::GeneratedKey;
use crate::rule::RuleSet;
use crate::statement::{BoundStatement, Expr, Filter, Insert, Operator, Predicate};
use crate::value::Scalar;
use crate::Error;

/// Extract sharding conditions.
///
/// `INSERT` produces one condition per row, generated keys included.
/// Filtered statements produce one condition per satisfiable `AND` group,
/// followed by the conditions of their subqueries. Subqueries are skipped
/// when the outer filter can't match any row.
pub fn extract(
    rules: &RuleSet,
    statement: &BoundStatement,
    params: &[Scalar],
    generated: Option<&GeneratedKey>,
) -> Result<ShardingConditions, Error> {
    if let Some(insert) = statement.insert() {
        let Some(table) = statement.tables.first() else {
            return Ok(ShardingConditions::default());
        };
        return insert_conditions(rules, &table.name, insert, params, generated);
    }

    let Some(filter) = statement.filter() else {
        return Ok(ShardingConditions::default());
    };

    let mut conditions = filter_conditions(rules, filter, params)?;

    // Without outer sharding values, the subquery values restrict the route.
    if !conditions.always_false {
        for subquery in &filter.subqueries {
            nested(rules, subquery, params, &mut conditions)?;
        }
    }

    trace!("extracted {} sharding conditions", conditions.conditions.len());

    Ok(conditions)
}

fn nested(
    rules: &RuleSet,
    filter: &Filter,
    params: &[Scalar],
    conditions: &mut ShardingConditions,
) -> Result<(), Error> {
    let extracted = filter_conditions(rules, filter, params)?;
    conditions.conditions.extend(extracted.conditions);

    for subquery in &filter.subqueries {
        nested(rules, subquery, params, conditions)?;
    }

    Ok(())
}

fn insert_conditions(
    rules: &RuleSet,
    table: &str,
    insert: &Insert,
    params: &[Scalar],
    generated: Option<&GeneratedKey>,
) -> Result<ShardingConditions, Error> {
    let columns = rules.sharding_columns(table);
    if columns.is_empty() {
        return Ok(ShardingConditions::default());
    }

    let mut conditions = Vec::with_capacity(insert.rows.len());

    for (row_index, row) in insert.rows.iter().enumerate() {
        let mut values = vec![];

        for (column, expr) in insert.columns.iter().zip(row.iter()) {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(&column.name)) {
                continue;
            }

            let value = match expr {
                Expr::Default { .. } => column.default.clone(),
                expr => expr.resolve(params)?,
            };

            if let Some(value) = value {
                values.push(RouteValue::list(table, &column.name, vec![value]));
            }
        }

        if let Some(generated) = generated {
            if columns
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&generated.column))
            {
                if let Some(value) = generated.values.get(row_index) {
                    values.push(RouteValue::list(
                        table,
                        &generated.column,
                        vec![value.clone()],
                    ));
                }
            }
        }

        conditions.push(ShardingCondition::new(values));
    }

    Ok(ShardingConditions::new(conditions))
}

fn filter_conditions(
    rules: &RuleSet,
    filter: &Filter,
    params: &[Scalar],
) -> Result<ShardingConditions, Error> {
    if filter.groups.is_empty() {
        return Ok(ShardingConditions::default());
    }

    let mut conditions = vec![];

    for group in &filter.groups {
        let mut values: Vec<RouteValue> = vec![];
        let mut satisfiable = true;

        for predicate in group {
            if !rules.is_sharding_column(&predicate.column.table, &predicate.column.name) {
                continue;
            }

            let Some(value) = route_value(predicate, params)? else {
                continue;
            };

            match values
                .iter_mut()
                .find(|existing| existing.is_column(&value.table, &value.column))
            {
                Some(existing) => match existing.values.intersect(&value.values) {
                    Some(intersection) => existing.values = intersection,
                    None => {
                        satisfiable = false;
                        break;
                    }
                },
                None => values.push(value),
            }
        }

        if !satisfiable {
            trace!("predicate group is always false");
            continue;
        }

        // One unrestricted branch of an OR widens the whole filter.
        if values.is_empty() {
            return Ok(ShardingConditions::default());
        }

        conditions.push(ShardingCondition::new(values));
    }

    if conditions.is_empty() {
        Ok(ShardingConditions::always_false())
    } else {
        Ok(ShardingConditions::new(conditions))
    }
}

fn route_value(predicate: &Predicate, params: &[Scalar]) -> Result<Option<RouteValue>, Error> {
    let mut values = Vec::with_capacity(predicate.values.len());
    for expr in &predicate.values {
        match expr.resolve(params)? {
            Some(value) => values.push(value),
            None => return Ok(None),
        }
    }

    let table = &predicate.column.table;
    let column = &predicate.column.name;

    let range = |lower, upper| {
        Some(RouteValue::range(
            table,
            column,
            RouteRange::new(lower, upper),
        ))
    };

    let value = match (predicate.operator, values.as_slice()) {
        (Operator::Eq | Operator::In, values) if !values.is_empty() => {
            Some(RouteValue::list(table, column, values.to_vec()))
        }
        (Operator::Between, [low, high]) => {
            range(Bound::Included(low.clone()), Bound::Included(high.clone()))
        }
        (Operator::Lt, [value]) => range(Bound::Unbounded, Bound::Excluded(value.clone())),
        (Operator::LtEq, [value]) => range(Bound::Unbounded, Bound::Included(value.clone())),
        (Operator::Gt, [value]) => range(Bound::Excluded(value.clone()), Bound::Unbounded),
        (Operator::GtEq, [value]) => range(Bound::Included(value.clone()), Bound::Unbounded),
        _ => None,
    };

    Ok(value)
}
