//! Plain columns to cipher and assisted query columns.

use super::{RewriteContext, TokenGenerator};
use crate::rewrite::insert::{InsertArena, RowValue};
use crate::rewrite::parameters::FlatParameters;
use crate::rewrite::token::{Family, SqlToken, TokenKind};
use crate::rule::{EncryptColumnRule, RuleSet};
use crate::statement::{Assignment, BoundStatement, Expr, Filter, Projection, Span, StatementKind};
use crate::Error;

#[derive(Debug, Default)]
pub struct EncryptGenerator;

impl TokenGenerator for EncryptGenerator {
    fn generate(&self, context: &mut RewriteContext<'_>) -> Result<Vec<SqlToken>, Error> {
        let rules = context.rules;
        let statement = context.statement;
        let mut tokens = vec![];

        match &statement.kind {
            StatementKind::Select(select) => {
                projections(rules, &select.projections, &mut tokens);
                predicates(rules, &select.filter, &mut context.parameters, &mut tokens)?;
            }

            StatementKind::Update(update) => {
                for assignment in &update.assignments {
                    assign(rules, statement, assignment, &mut context.parameters, &mut tokens)?;
                }
                predicates(rules, &update.filter, &mut context.parameters, &mut tokens)?;
            }

            StatementKind::Delete(delete) => {
                predicates(rules, &delete.filter, &mut context.parameters, &mut tokens)?;
            }

            StatementKind::Insert(_) => {
                if let (Some(table), Some(arena)) =
                    (statement.tables.first(), context.insert.as_mut())
                {
                    insert(rules, &table.name, arena)?;
                }
            }

            _ => (),
        }

        Ok(tokens)
    }
}

fn projections(rules: &RuleSet, projections: &[Projection], tokens: &mut Vec<SqlToken>) {
    for projection in projections {
        let Projection::Column { column, alias } = projection else {
            continue;
        };

        if let Some(rule) = rules.encrypt_column(&column.table, &column.name) {
            // Aliased columns keep their alias after the span.
            let text = match alias {
                Some(_) => rule.cipher_column.clone(),
                None => format!("{} AS {}", rule.cipher_column, column.name),
            };
            tokens.push(SqlToken::new(
                Family::Encrypt,
                column.span,
                TokenKind::Text(text),
            ));
        }
    }
}

fn predicates(
    rules: &RuleSet,
    filter: &Filter,
    parameters: &mut FlatParameters,
    tokens: &mut Vec<SqlToken>,
) -> Result<(), Error> {
    for predicate in filter.predicates() {
        let Some(rule) = rules.encrypt_column(&predicate.column.table, &predicate.column.name)
        else {
            continue;
        };

        tokens.push(SqlToken::new(
            Family::Encrypt,
            predicate.column.span,
            TokenKind::Text(rule.query_column().to_string()),
        ));

        for value in &predicate.values {
            match value {
                Expr::Literal { value, span } => tokens.push(SqlToken::new(
                    Family::Encrypt,
                    *span,
                    TokenKind::Text(rule.query_value(value)?.to_sql()),
                )),
                Expr::Param { index, .. } => {
                    let encrypted = rule.query_value(parameters.original(*index)?)?;
                    parameters.replace(*index, encrypted)?;
                }
                _ => (),
            }
        }
    }

    Ok(())
}

fn assign(
    rules: &RuleSet,
    statement: &BoundStatement,
    assignment: &Assignment,
    parameters: &mut FlatParameters,
    tokens: &mut Vec<SqlToken>,
) -> Result<(), Error> {
    let column = &assignment.column;
    let Some(rule) = rules.encrypt_column(&column.table, &column.name) else {
        return Ok(());
    };

    tokens.push(SqlToken::new(
        Family::Encrypt,
        column.span,
        TokenKind::Text(rule.cipher_column.clone()),
    ));

    let end = assignment.value.span().stop;

    match &assignment.value {
        Expr::Literal { value, span } => {
            tokens.push(SqlToken::new(
                Family::Encrypt,
                *span,
                TokenKind::Text(rule.encrypt(value)?.to_sql()),
            ));
            if let Some(assisted) = &rule.assisted_query_column {
                tokens.push(SqlToken::new(
                    Family::Encrypt,
                    Span::at(end),
                    TokenKind::Insert(format!(
                        ", {} = {}",
                        assisted,
                        rule.assisted(value)?.to_sql()
                    )),
                ));
            }
        }

        Expr::Param { index, .. } => {
            let original = parameters.original(*index)?.clone();
            parameters.replace(*index, rule.encrypt(&original)?)?;
            if let Some(assisted) = &rule.assisted_query_column {
                tokens.push(SqlToken::new(
                    Family::Encrypt,
                    Span::at(end),
                    TokenKind::Insert(format!(", {} = ?", assisted)),
                ));
                parameters.insert_before(index + 1, rule.assisted(&original)?);
            }
        }

        other => {
            return Err(unsupported(
                rule,
                format!("can't encrypt \"{}\"", statement.text(other.span())),
            ))
        }
    }

    Ok(())
}

fn insert(rules: &RuleSet, table: &str, arena: &mut InsertArena) -> Result<(), Error> {
    let Some(encrypt) = rules.encrypt_table(table) else {
        return Ok(());
    };

    let encrypted: Vec<String> = arena
        .columns
        .iter()
        .filter(|column| encrypt.column(column).is_some())
        .cloned()
        .collect();

    for name in encrypted {
        let (Some(index), Some(rule)) = (arena.column_index(&name), encrypt.column(&name)) else {
            continue;
        };

        // Assisted values are derived from the plain text, before it's replaced.
        if let Some(assisted) = &rule.assisted_query_column {
            arena.insert_column(index + 1, assisted, |row| {
                assisted_value(rule, row.values.get(index))
            })?;
        }

        for row in arena.rows.iter_mut() {
            if let Some(value) = row.values.get_mut(index) {
                *value = match value {
                    RowValue::Literal(plain) => RowValue::Literal(rule.encrypt(plain)?),
                    RowValue::Param { value, source } => RowValue::Param {
                        value: rule.encrypt(value)?,
                        source: *source,
                    },
                    RowValue::Default => RowValue::Default,
                    RowValue::Raw(text) => {
                        return Err(unsupported(rule, format!("can't encrypt \"{}\"", text)))
                    }
                };
            }
        }

        arena.rename_column(index, &rule.cipher_column);
    }

    Ok(())
}

fn assisted_value(rule: &EncryptColumnRule, value: Option<&RowValue>) -> Result<RowValue, Error> {
    match value {
        Some(RowValue::Literal(plain)) => Ok(RowValue::Literal(rule.assisted(plain)?)),
        Some(RowValue::Param { value, .. }) => Ok(RowValue::Param {
            value: rule.assisted(value)?,
            source: None,
        }),
        Some(RowValue::Raw(text)) => Err(unsupported(rule, format!("can't encrypt \"{}\"", text))),
        Some(RowValue::Default) | None => Ok(RowValue::Default),
    }
}

fn unsupported(rule: &EncryptColumnRule, reason: String) -> Error {
    Error::Encrypt {
        table: rule.table.clone(),
        column: rule.name.clone(),
        reason,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::route::{RoutingResult, RoutingUnit};
    use crate::statement::{ColumnRef, Predicate, Select, TableRef, Update};
    use crate::test::{insert_statement, rule_set, span_of, span_of_nth};
    use crate::value::Scalar;

    fn pwd(sql: &str, nth: usize) -> ColumnRef {
        ColumnRef::new("t_encrypt", "pwd", span_of_nth(sql, "pwd", nth))
    }

    fn run(
        rules: &RuleSet,
        statement: &BoundStatement,
        params: &[Scalar],
        insert: Option<InsertArena>,
    ) -> Result<(Vec<SqlToken>, FlatParameters, Option<InsertArena>), Error> {
        let result = RoutingResult::default();
        let mut context = RewriteContext {
            rules,
            statement,
            result: &result,
            parameters: FlatParameters::new(params),
            insert,
        };
        let tokens = EncryptGenerator.generate(&mut context)?;
        Ok((tokens, context.parameters, context.insert))
    }

    #[test]
    fn test_select_literal() {
        let rules = rule_set();
        let sql = "SELECT pwd FROM t_encrypt WHERE pwd = 'x'";
        let statement = BoundStatement::new(
            sql,
            StatementKind::Select(Select {
                projections: vec![Projection::Column {
                    column: pwd(sql, 0),
                    alias: None,
                }],
                filter: Filter::and(vec![Predicate::eq(
                    pwd(sql, 1),
                    Expr::literal("x", span_of(sql, "'x'")),
                )]),
                ..Default::default()
            }),
        )
        .with_table(TableRef::new("t_encrypt", span_of(sql, "t_encrypt")));

        let (tokens, _, _) = run(&rules, &statement, &[], None).unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Text("pwd_cipher AS pwd".into()),
                TokenKind::Text("pwd_assisted".into()),
                TokenKind::Text("'ast:x'".into()),
            ]
        );
    }

    #[test]
    fn test_aliased_projection() {
        let rules = rule_set();
        let sql = "SELECT pwd AS p FROM t_encrypt";
        let statement = BoundStatement::new(
            sql,
            StatementKind::Select(Select {
                projections: vec![Projection::Column {
                    column: pwd(sql, 0),
                    alias: Some("p".into()),
                }],
                ..Default::default()
            }),
        );

        let (tokens, _, _) = run(&rules, &statement, &[], None).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Text("pwd_cipher".into()));
    }

    #[test]
    fn test_param_predicate() {
        let rules = rule_set();
        let sql = "DELETE FROM t_encrypt WHERE pwd = ?";
        let statement = BoundStatement::new(
            sql,
            StatementKind::Delete(crate::statement::Delete {
                filter: Filter::and(vec![Predicate::eq(
                    pwd(sql, 0),
                    Expr::param(0, span_of(sql, "?")),
                )]),
            }),
        );

        let (tokens, parameters, _) = run(&rules, &statement, &["x".into()], None).unwrap();
        assert_eq!(tokens.len(), 1);
        let expected: Vec<Scalar> = vec!["ast:x".into()];
        assert_eq!(parameters.parameters(), expected);
    }

    #[test]
    fn test_update_adds_assisted_column() {
        let rules = rule_set();
        let sql = "UPDATE t_encrypt SET pwd = ? WHERE id = ?";
        let statement = BoundStatement::new(
            sql,
            StatementKind::Update(Update {
                assignments: vec![Assignment {
                    column: pwd(sql, 0),
                    value: Expr::param(0, span_of(sql, "?")),
                }],
                filter: Filter::and(vec![Predicate::eq(
                    ColumnRef::new("t_encrypt", "id", span_of(sql, "id")),
                    Expr::param(1, span_of_nth(sql, "?", 1)),
                )]),
            }),
        );

        let (tokens, parameters, _) = run(&rules, &statement, &["secret".into(), 7.into()], None).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Text("pwd_cipher".into()));
        assert_eq!(
            tokens[1],
            SqlToken::new(
                Family::Encrypt,
                Span::at(span_of(sql, "?").stop),
                TokenKind::Insert(", pwd_assisted = ?".into())
            )
        );
        let expected: Vec<Scalar> = vec!["enc:secret".into(), "ast:secret".into(), 7.into()];
        assert_eq!(parameters.parameters(), expected);
    }

    #[test]
    fn test_update_expression_is_rejected() {
        let rules = rule_set();
        let sql = "UPDATE t_encrypt SET pwd = upper(name)";
        let statement = BoundStatement::new(
            sql,
            StatementKind::Update(Update {
                assignments: vec![Assignment {
                    column: pwd(sql, 0),
                    value: Expr::Other {
                        span: span_of(sql, "upper(name)"),
                    },
                }],
                filter: Filter::default(),
            }),
        );

        assert!(matches!(
            run(&rules, &statement, &[], None),
            Err(Error::Encrypt { .. })
        ));
    }

    #[test]
    fn test_insert_rows() {
        let rules = rule_set();
        let statement = insert_statement(
            "INSERT INTO t_encrypt (id, pwd) VALUES (1, ?), (2, 'b')",
            "t_encrypt",
            &["id", "pwd"],
        );
        let params: Vec<Scalar> = vec!["a".into()];
        let arena =
            InsertArena::new(&statement, statement.insert().unwrap(), &params, None, &[]).unwrap();

        let (tokens, _, arena) = run(&rules, &statement, &params, Some(arena)).unwrap();
        assert!(tokens.is_empty());

        let arena = arena.unwrap();
        assert_eq!(arena.render_columns(), "(id, pwd_cipher, pwd_assisted)");
        assert_eq!(
            arena.render_values(&RoutingUnit::new("ds_0")),
            "(1, ?, ?), (2, 'enc:b', 'ast:b')"
        );
        assert_eq!(
            arena.rows[0].values[1..],
            [
                RowValue::Param {
                    value: "enc:a".into(),
                    source: Some(0)
                },
                RowValue::Param {
                    value: "ast:a".into(),
                    source: None
                },
            ]
        );
    }
}
