//! Statement rewriting.
//!
//! Tokens are generated once per statement. SQL and parameters are
//! then produced for each routing unit without touching the tokens.

pub mod builder;
pub mod generator;
pub mod insert;
pub mod parameters;
pub mod token;

use tracing::trace;

use crate::key::GeneratedKey;
use crate::route::{RoutingResult, RoutingUnit};
use crate::rule::RuleSet;
use crate::statement::BoundStatement;
use crate::value::Scalar;
use crate::Error;

pub use builder::Template;
pub use generator::{RewriteContext, TokenGenerator};
pub use insert::InsertArena;
pub use parameters::{FlatParameters, GroupedParameters, ParameterBuilder};
pub use token::SqlToken;

/// SQL and parameters sent to one routing unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUnit {
    pub unit: RoutingUnit,
    pub sql: String,
    pub parameters: Vec<Scalar>,
}

/// Rewritten statement, ready to render for each routing unit.
#[derive(Debug, Clone)]
pub struct Rewrite {
    sql: String,
    tokens: Vec<SqlToken>,
    parameters: ParameterBuilder,
    insert: Option<InsertArena>,
}

impl Rewrite {
    pub fn tokens(&self) -> &[SqlToken] {
        &self.tokens
    }

    pub fn parameters(&self) -> &ParameterBuilder {
        &self.parameters
    }

    pub fn insert(&self) -> Option<&InsertArena> {
        self.insert.as_ref()
    }

    /// Render SQL and parameters for every unit, in routing order.
    pub fn render(&self, result: &RoutingResult) -> Vec<ExecutionUnit> {
        if result.is_single() {
            return result
                .units
                .iter()
                .map(|unit| ExecutionUnit {
                    unit: unit.clone(),
                    sql: builder::render_direct(
                        &self.sql,
                        &self.tokens,
                        unit,
                        self.insert.as_ref(),
                    ),
                    parameters: self.parameters.parameters_for(unit),
                })
                .collect();
        }

        let template = Template::build(&self.sql, &self.tokens);

        result
            .units
            .iter()
            .map(|unit| ExecutionUnit {
                unit: unit.clone(),
                sql: template.render(unit, self.insert.as_ref()),
                parameters: self.parameters.parameters_for(unit),
            })
            .collect()
    }
}

/// Rewrite a routed statement.
pub fn rewrite(
    rules: &RuleSet,
    statement: &BoundStatement,
    params: &[Scalar],
    result: &RoutingResult,
    generated: Option<&GeneratedKey>,
) -> Result<Rewrite, Error> {
    let insert = match (statement.insert(), statement.tables.first()) {
        (Some(insert), Some(table))
            if rules.is_sharding_table(&table.name)
                || rules.encrypt_table(&table.name).is_some() =>
        {
            Some(InsertArena::new(
                statement,
                insert,
                params,
                generated,
                &result.insert_rows,
            )?)
        }
        _ => None,
    };

    let mut context = RewriteContext {
        rules,
        statement,
        result,
        parameters: FlatParameters::new(params),
        insert,
    };

    let tokens = generator::generate(&mut context)?;

    trace!("{} rewrite tokens", tokens.len());

    let RewriteContext {
        parameters, insert, ..
    } = context;

    let parameters = match &insert {
        Some(arena) => ParameterBuilder::Grouped(GroupedParameters::new(arena, &parameters)?),
        None => ParameterBuilder::Flat(parameters),
    };

    Ok(Rewrite {
        sql: statement.sql.clone(),
        tokens,
        parameters,
        insert,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rule::DataNode;
    use crate::statement::{StatementKind, TableRef};
    use crate::test::{insert_statement, rule_set, span_of};

    #[test]
    fn test_insert_split_across_units() {
        let rules = rule_set();
        let statement = insert_statement(
            "INSERT INTO t_order (user_id, status) VALUES (?, ?), (?, ?)",
            "t_order",
            &["user_id", "status"],
        );
        let params: Vec<Scalar> = vec![1.into(), "a".into(), 2.into(), "b".into()];
        let generated = GeneratedKey {
            column: "order_id".into(),
            values: vec![Scalar::from(10), Scalar::from(11)],
        };

        let mut result = RoutingResult::from_units([
            RoutingUnit::new("ds_1").with_table("t_order", "t_order_0"),
            RoutingUnit::new("ds_0").with_table("t_order", "t_order_1"),
        ]);
        result.insert_rows = vec![
            vec![DataNode::new("ds_1", "t_order_0")],
            vec![DataNode::new("ds_0", "t_order_1")],
        ];

        let rewrite = rewrite(&rules, &statement, &params, &result, Some(&generated)).unwrap();
        assert!(rewrite.parameters().is_grouped());

        let units = rewrite.render(&result);
        assert_eq!(units.len(), 2);
        assert_eq!(
            units[0].sql,
            "INSERT INTO t_order_0 (order_id, user_id, status) VALUES (?, ?, ?)"
        );
        let expected: Vec<Scalar> = vec![10.into(), 1.into(), "a".into()];
        assert_eq!(units[0].parameters, expected);

        assert_eq!(
            units[1].sql,
            "INSERT INTO t_order_1 (order_id, user_id, status) VALUES (?, ?, ?)"
        );
        let expected: Vec<Scalar> = vec![11.into(), 2.into(), "b".into()];
        assert_eq!(units[1].parameters, expected);
    }

    #[test]
    fn test_render_is_repeatable() {
        let rules = rule_set();
        let sql = "SELECT * FROM t_order";
        let statement = crate::statement::BoundStatement::new(
            sql,
            StatementKind::Select(Default::default()),
        )
        .with_table(TableRef::new("t_order", span_of(sql, "t_order")));
        let result = RoutingResult::from_units([
            RoutingUnit::new("ds_0").with_table("t_order", "t_order_0"),
            RoutingUnit::new("ds_0").with_table("t_order", "t_order_1"),
        ]);

        let rewrite = rewrite(&rules, &statement, &[], &result, None).unwrap();
        let first = rewrite.render(&result);
        assert_eq!(first, rewrite.render(&result));
        assert_eq!(first[1].sql, "SELECT * FROM t_order_1");
        assert!(first[1].parameters.is_empty());
    }

    #[test]
    fn test_unruled_table_untouched() {
        let rules = rule_set();
        let sql = "SELECT * FROM t_misc WHERE id = ?";
        let statement = crate::statement::BoundStatement::new(
            sql,
            StatementKind::Select(Default::default()),
        )
        .with_table(TableRef::new("t_misc", span_of(sql, "t_misc")));
        let result = RoutingResult::from_units([RoutingUnit::new("ds_0")]);

        let rewrite = rewrite(&rules, &statement, &[Scalar::from(1)], &result, None).unwrap();
        assert!(rewrite.tokens().is_empty());
        let units = rewrite.render(&result);
        assert_eq!(units[0].sql, sql);
        assert_eq!(units[0].parameters, vec![Scalar::from(1)]);
    }
}
