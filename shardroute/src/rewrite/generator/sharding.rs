//! Logical to actual names, `INSERT` restructuring and pagination.

use tracing::trace;

use super::{RewriteContext, TokenGenerator};
use crate::rewrite::token::{Family, SqlToken, TokenKind};
use crate::statement::{Expr, Limit, Span, StatementKind};
use crate::value::Scalar;
use crate::Error;

#[derive(Debug, Default)]
pub struct ShardingGenerator;

impl TokenGenerator for ShardingGenerator {
    fn generate(&self, context: &mut RewriteContext<'_>) -> Result<Vec<SqlToken>, Error> {
        let rules = context.rules;
        let statement = context.statement;
        let mut tokens = vec![];

        for table in &statement.tables {
            if !rules.is_sharding_table(&table.name) {
                continue;
            }

            if let Some(owner) = table.owner {
                tokens.push(SqlToken::new(Family::Sharding, owner, TokenKind::Remove));
            }

            tokens.push(SqlToken::new(
                Family::Sharding,
                table.span,
                TokenKind::Table {
                    logical: table.name.clone(),
                    quote: table.quote,
                },
            ));
        }

        if let StatementKind::Ddl { indexes, .. } = &statement.kind {
            let sharded = statement
                .table_names()
                .into_iter()
                .find(|table| rules.is_sharding_table(table));

            if let Some(logical) = sharded {
                for index in indexes {
                    tokens.push(SqlToken::new(
                        Family::Sharding,
                        index.span,
                        TokenKind::Index {
                            name: index.name.clone(),
                            logical: logical.to_string(),
                        },
                    ));
                }
            }
        }

        if let (Some(insert), Some(arena)) = (statement.insert(), context.insert.as_ref()) {
            match insert.columns_span {
                Some(span) => tokens.push(SqlToken::new(
                    Family::Sharding,
                    span,
                    TokenKind::InsertColumns { parens: true },
                )),
                None if arena.columns_changed => {
                    if let Some(table) = statement.tables.first() {
                        tokens.push(SqlToken::new(
                            Family::Sharding,
                            Span::at(table.span.stop),
                            TokenKind::InsertColumns { parens: false },
                        ));
                    }
                }
                None => (),
            }

            tokens.push(SqlToken::new(
                Family::Sharding,
                insert.values_span,
                TokenKind::InsertValues,
            ));
        }

        if let StatementKind::Select(select) = &statement.kind {
            if let Some(limit) = &select.limit {
                if context.result.len() > 1 {
                    tokens.extend(paginate(limit, context)?);
                }
            }
        }

        Ok(tokens)
    }
}

/// Every unit must return the first `offset + row_count` rows; the
/// merge layer skips the offset.
fn paginate(limit: &Limit, context: &mut RewriteContext<'_>) -> Result<Vec<SqlToken>, Error> {
    let Some(offset_expr) = &limit.offset else {
        return Ok(vec![]);
    };

    let offset = match offset_expr {
        Expr::Literal { value, .. } => value.integer(),
        Expr::Param { index, .. } => context.parameters.get(*index)?.integer(),
        _ => None,
    };

    let Some(offset) = offset.filter(|offset| *offset > 0) else {
        return Ok(vec![]);
    };

    trace!("rewriting offset {} for {} units", offset, context.result.len());

    let mut tokens = vec![];

    match offset_expr {
        Expr::Literal { span, .. } => tokens.push(SqlToken::new(
            Family::Sharding,
            *span,
            TokenKind::Text("0".into()),
        )),
        Expr::Param { index, .. } => context.parameters.replace(*index, Scalar::Integer(0))?,
        _ => (),
    }

    match &limit.row_count {
        Some(Expr::Literal { value, span }) => {
            if let Some(count) = value.integer() {
                tokens.push(SqlToken::new(
                    Family::Sharding,
                    *span,
                    TokenKind::Text(offset.saturating_add(count).to_string()),
                ));
            }
        }
        Some(Expr::Param { index, .. }) => {
            if let Some(count) = context.parameters.get(*index)?.integer() {
                context
                    .parameters
                    .replace(*index, Scalar::Integer(offset.saturating_add(count)))?;
            }
        }
        _ => (),
    }

    Ok(tokens)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rewrite::parameters::FlatParameters;
    use crate::route::{RoutingResult, RoutingUnit};
    use crate::statement::{BoundStatement, DdlKind, IndexRef, Select, TableRef};
    use crate::test::{rule_set, span_of};

    fn context<'a>(
        rules: &'a crate::rule::RuleSet,
        statement: &'a BoundStatement,
        result: &'a RoutingResult,
        params: &[Scalar],
    ) -> RewriteContext<'a> {
        RewriteContext {
            rules,
            statement,
            result,
            parameters: FlatParameters::new(params),
            insert: None,
        }
    }

    fn two_units() -> RoutingResult {
        RoutingResult::from_units([
            RoutingUnit::new("ds_0").with_table("t_order", "t_order_0"),
            RoutingUnit::new("ds_1").with_table("t_order", "t_order_0"),
        ])
    }

    #[test]
    fn test_table_and_owner() {
        let rules = rule_set();
        let sql = "SELECT * FROM db.t_order JOIN t_config";
        let statement = BoundStatement::new(sql, StatementKind::Select(Select::default()))
            .with_table(
                TableRef::new("t_order", span_of(sql, "t_order")).with_owner(span_of(sql, "db.")),
            )
            .with_table(TableRef::new("t_config", span_of(sql, "t_config")));
        let result = RoutingResult::default();

        let tokens = ShardingGenerator
            .generate(&mut context(&rules, &statement, &result, &[]))
            .unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Remove);
        assert_eq!(
            tokens[1].kind,
            TokenKind::Table {
                logical: "t_order".into(),
                quote: None
            }
        );
    }

    #[test]
    fn test_index_tokens() {
        let rules = rule_set();
        let sql = "CREATE INDEX idx_status ON t_order (status)";
        let statement = BoundStatement::new(
            sql,
            StatementKind::Ddl {
                kind: DdlKind::CreateIndex,
                indexes: vec![IndexRef {
                    name: "idx_status".into(),
                    span: span_of(sql, "idx_status"),
                }],
            },
        )
        .with_table(TableRef::new("t_order", span_of(sql, "t_order")));
        let result = RoutingResult::default();

        let tokens = ShardingGenerator
            .generate(&mut context(&rules, &statement, &result, &[]))
            .unwrap();
        assert!(tokens.iter().any(|token| token.kind
            == TokenKind::Index {
                name: "idx_status".into(),
                logical: "t_order".into()
            }));
    }

    #[test]
    fn test_literal_pagination() {
        let rules = rule_set();
        let sql = "SELECT * FROM t_order LIMIT 10, 20";
        let statement = BoundStatement::new(
            sql,
            StatementKind::Select(Select {
                limit: Some(Limit {
                    offset: Some(Expr::literal(10, span_of(sql, "10"))),
                    row_count: Some(Expr::literal(20, span_of(sql, "20"))),
                }),
                ..Default::default()
            }),
        );
        let result = two_units();

        let tokens = ShardingGenerator
            .generate(&mut context(&rules, &statement, &result, &[]))
            .unwrap();
        let texts: Vec<_> = tokens.iter().map(|token| token.kind.clone()).collect();
        assert_eq!(
            texts,
            vec![TokenKind::Text("0".into()), TokenKind::Text("30".into())]
        );
    }

    #[test]
    fn test_param_pagination() {
        let rules = rule_set();
        let sql = "SELECT * FROM t_order WHERE status = ? LIMIT ?, ?";
        let statement = BoundStatement::new(
            sql,
            StatementKind::Select(Select {
                limit: Some(Limit {
                    offset: Some(Expr::param(1, Span::default())),
                    row_count: Some(Expr::param(2, Span::default())),
                }),
                ..Default::default()
            }),
        );
        let result = two_units();
        let mut context = context(&rules, &statement, &result, &["x".into(), 5.into(), 7.into()]);

        let tokens = ShardingGenerator.generate(&mut context).unwrap();
        assert!(tokens.is_empty());
        let expected: Vec<Scalar> = vec!["x".into(), 0.into(), 12.into()];
        assert_eq!(context.parameters.parameters(), expected);
    }

    #[test]
    fn test_single_unit_keeps_limit() {
        let rules = rule_set();
        let sql = "SELECT * FROM t_order LIMIT 10, 20";
        let statement = BoundStatement::new(
            sql,
            StatementKind::Select(Select {
                limit: Some(Limit {
                    offset: Some(Expr::literal(10, span_of(sql, "10"))),
                    row_count: Some(Expr::literal(20, span_of(sql, "20"))),
                }),
                ..Default::default()
            }),
        );
        let result =
            RoutingResult::from_units([RoutingUnit::new("ds_0").with_table("t_order", "t_order_0")]);

        assert!(ShardingGenerator
            .generate(&mut context(&rules, &statement, &result, &[]))
            .unwrap()
            .is_empty());
    }
}
