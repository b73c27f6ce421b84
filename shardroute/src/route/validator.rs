//! Check that every routed data node exists.

use tracing::debug;

use super::{LiveMetadata, RoutingResult};
use crate::condition::ShardingConditions;
use crate::error::{AbsentDataNodes, AbsentTable};
use crate::rule::RuleSet;
use crate::statement::BoundStatement;
use crate::Error;

/// Validate a routing result.
///
/// A data node passes if the rule declares it or live metadata has it.
/// All missing nodes of the first failing unit are reported together,
/// grouped by logical table with that table's strategies.
/// Index DDL is exempt since the index may not exist yet.
pub fn check(
    rules: &RuleSet,
    metadata: &LiveMetadata,
    result: &RoutingResult,
    statement: &BoundStatement,
    conditions: &ShardingConditions,
) -> Result<(), Error> {
    if statement.is_index_ddl() {
        return Ok(());
    }

    for unit in &result.units {
        let mut tables: Vec<AbsentTable> = vec![];

        for table_unit in &unit.table_units {
            let Some(rule) = rules.table_rule(&table_unit.logical_table) else {
                continue;
            };

            if rule.contains(&unit.data_source, &table_unit.actual_table)
                || metadata.contains(&unit.data_source, &table_unit.actual_table)
            {
                continue;
            }

            let node = format!("{}.{}", unit.data_source, table_unit.actual_table);

            match tables
                .iter_mut()
                .find(|absent| absent.logical_table == rule.logical_table)
            {
                Some(absent) => absent.nodes.push(node),
                None => {
                    let route_values = if statement.is_dml() {
                        conditions.describe(&[rule.logical_table.as_str()])
                    } else {
                        vec![]
                    };

                    tables.push(AbsentTable {
                        logical_table: rule.logical_table.clone(),
                        nodes: vec![node],
                        database_strategy: rule.database_strategy.to_string(),
                        table_strategy: rule.table_strategy.to_string(),
                        route_values,
                    });
                }
            }
        }

        if !tables.is_empty() {
            debug!("absent data nodes in {}", unit);
            return Err(AbsentDataNodes {
                data_source: unit.data_source.clone(),
                tables,
            }
            .into());
        }
    }

    Ok(())
}
