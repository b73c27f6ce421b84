//! Edits every statement gets, whatever the rules.

use super::{RewriteContext, TokenGenerator};
use crate::rewrite::token::{Family, SqlToken, TokenKind};
use crate::statement::{Projection, StatementKind};
use crate::Error;

/// Expands `*` into explicit columns when some of them are encrypted,
/// so their cipher columns can be read under the plain name.
#[derive(Debug, Default)]
pub struct BaseGenerator;

impl TokenGenerator for BaseGenerator {
    fn generate(&self, context: &mut RewriteContext<'_>) -> Result<Vec<SqlToken>, Error> {
        let StatementKind::Select(select) = &context.statement.kind else {
            return Ok(vec![]);
        };

        let mut tokens = vec![];

        for projection in &select.projections {
            let Projection::Shorthand { span, columns } = projection else {
                continue;
            };

            if !columns
                .iter()
                .any(|column| context.rules.encrypt_column(&column.table, &column.name).is_some())
            {
                continue;
            }

            let expanded = columns
                .iter()
                .map(
                    |column| match context.rules.encrypt_column(&column.table, &column.name) {
                        Some(rule) => format!("{} AS {}", rule.cipher_column, column.name),
                        None => column.name.clone(),
                    },
                )
                .collect();

            tokens.push(SqlToken::new(
                Family::Base,
                *span,
                TokenKind::Projection(expanded),
            ));
        }

        Ok(tokens)
    }
}
