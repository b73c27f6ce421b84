//! Statement pipeline: key allocation, condition extraction, routing,
//! validation and rewriting.

use std::sync::Arc;

use tracing::{debug, info};

use crate::condition;
use crate::key::{self, GeneratedKey};
use crate::rewrite;
use crate::route::{self, Hints, LiveMetadata, RoutingResult};
use crate::rule::{self, RuleSet};
use crate::statement::BoundStatement;
use crate::value::Scalar;
use crate::Error;

pub use crate::rewrite::ExecutionUnit;

/// What to execute, and where.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    pub result: RoutingResult,
    /// One entry per routing unit, in routing order.
    pub units: Vec<ExecutionUnit>,
    /// Keys allocated for an `INSERT`, in row order.
    pub generated_keys: Option<GeneratedKey>,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Routes and rewrites statements against one rule snapshot.
#[derive(Debug, Clone)]
pub struct ShardingEngine {
    rules: Arc<RuleSet>,
    metadata: Arc<LiveMetadata>,
}

impl ShardingEngine {
    pub fn new(rules: Arc<RuleSet>, metadata: Arc<LiveMetadata>) -> Self {
        Self { rules, metadata }
    }

    /// Engine using the process-wide rule set at the time of the call.
    pub fn from_global(metadata: Arc<LiveMetadata>) -> Self {
        Self::new(rule::rules(), metadata)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Plan a bound statement.
    pub fn plan(
        &self,
        statement: &BoundStatement,
        params: &[Scalar],
        hints: &Hints,
    ) -> Result<ExecutionPlan, Error> {
        let rules = &*self.rules;

        // Hint-only statements are sent as-is.
        if let Some(result) = hints.route_database_only(rules)? {
            let units = result
                .units
                .iter()
                .map(|unit| ExecutionUnit {
                    unit: unit.clone(),
                    sql: statement.sql.clone(),
                    parameters: params.to_vec(),
                })
                .collect();
            return Ok(self.finish(statement, result, units, None));
        }

        let generated = match (statement.insert(), statement.tables.first()) {
            (Some(insert), Some(table)) => match rules.table_rule(&table.name) {
                Some(table_rule) => key::allocate(table_rule, insert)?,
                None => None,
            },
            _ => None,
        };

        let conditions = condition::extract(rules, statement, params, generated.as_ref())?;
        let result = route::route(rules, statement, &conditions, hints)?;

        if rules.general.check_table_metadata {
            route::check(rules, &self.metadata, &result, statement, &conditions)?;
        }

        let rewrite = rewrite::rewrite(rules, statement, params, &result, generated.as_ref())?;
        let units = rewrite.render(&result);

        Ok(self.finish(statement, result, units, generated))
    }

    fn finish(
        &self,
        statement: &BoundStatement,
        result: RoutingResult,
        units: Vec<ExecutionUnit>,
        generated_keys: Option<GeneratedKey>,
    ) -> ExecutionPlan {
        debug!(
            "planned {} units on [{}]",
            units.len(),
            result.data_sources().join(", ")
        );

        if self.rules.general.sql_show {
            info!("logical sql: {}", statement.sql);
            for unit in &units {
                info!("actual sql: {} ::: {}", unit.unit.data_source, unit.sql);
            }
        }

        ExecutionPlan {
            result,
            units,
            generated_keys,
        }
    }
}
