//! Positioned rewrite instructions over the logical SQL.

use crate::statement::Span;
use crate::Error;

/// Generator family. Tokens starting at the same position keep
/// this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Family {
    Base,
    Sharding,
    Encrypt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Logical table, replaced by the unit's actual table.
    Table { logical: String, quote: Option<char> },
    /// Index name, suffixed with the unit's actual table.
    Index { name: String, logical: String },
    /// Fixed replacement text.
    Text(String),
    /// Drop the span.
    Remove,
    /// Text inserted at a position. The span is empty.
    Insert(String),
    /// Projection list replacing a shorthand.
    Projection(Vec<String>),
    /// `INSERT` column list. Without parentheses in the original
    /// statement, the list is inserted after the table name.
    InsertColumns { parens: bool },
    /// `INSERT` rows, filtered per unit.
    InsertValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlToken {
    pub span: Span,
    pub kind: TokenKind,
    pub family: Family,
}

impl SqlToken {
    pub fn new(family: Family, span: Span, kind: TokenKind) -> Self {
        Self { span, kind, family }
    }

    pub fn start(&self) -> usize {
        self.span.start
    }

    pub fn stop(&self) -> usize {
        self.span.stop
    }
}

/// Sort tokens by start position and check that none overlap.
///
/// The sort is stable, so tokens at the same position keep the order
/// they were generated in. An empty token may sit where another one ends.
pub fn order(mut tokens: Vec<SqlToken>) -> Result<Vec<SqlToken>, Error> {
    tokens.sort_by_key(|token| token.start());

    let mut previous: Option<&SqlToken> = None;
    for token in &tokens {
        if let Some(previous) = previous {
            if token.start() < previous.stop() {
                return Err(Error::GeneratorOverlap {
                    first: (previous.start(), previous.stop()),
                    second: (token.start(), token.stop()),
                });
            }
        }

        if previous.map(|p| token.stop() >= p.stop()).unwrap_or(true) {
            previous = Some(token);
        }
    }

    Ok(tokens)
}
