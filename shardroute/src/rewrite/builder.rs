//! SQL text assembly.
//!
//! Tokens are folded into a template once per statement. Rendering a
//! template for a routing unit doesn't modify it.

use super::insert::InsertArena;
use super::token::{SqlToken, TokenKind};
use crate::route::RoutingUnit;

/// Part of the template resolved per unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Placeholder {
    Table { logical: String, quote: Option<char> },
    Index { name: String, logical: String },
    InsertColumns { parens: bool },
    InsertValues,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Build a template from the logical SQL and ordered tokens.
    pub fn build(sql: &str, tokens: &[SqlToken]) -> Self {
        let mut segments = vec![];
        let mut literal = String::new();
        let mut cursor = 0;

        for token in tokens {
            literal.push_str(slice(sql, cursor, token.start()));

            match fixed(&token.kind) {
                Some(text) => literal.push_str(&text),
                None => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    if let Some(placeholder) = placeholder(&token.kind) {
                        segments.push(Segment::Placeholder(placeholder));
                    }
                }
            }

            cursor = cursor.max(token.stop());
        }

        literal.push_str(slice(sql, cursor, sql.len()));
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// SQL for one routing unit.
    pub fn render(&self, unit: &RoutingUnit, insert: Option<&InsertArena>) -> String {
        let mut sql = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => sql.push_str(text),
                Segment::Placeholder(placeholder) => {
                    sql.push_str(&resolve(placeholder, unit, insert))
                }
            }
        }
        sql
    }
}

/// Render in one pass, without building a template.
pub fn render_direct(
    sql: &str,
    tokens: &[SqlToken],
    unit: &RoutingUnit,
    insert: Option<&InsertArena>,
) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut cursor = 0;

    for token in tokens {
        result.push_str(slice(sql, cursor, token.start()));

        match fixed(&token.kind) {
            Some(text) => result.push_str(&text),
            None => {
                if let Some(placeholder) = placeholder(&token.kind) {
                    result.push_str(&resolve(&placeholder, unit, insert));
                }
            }
        }

        cursor = cursor.max(token.stop());
    }

    result.push_str(slice(sql, cursor, sql.len()));
    result
}

fn slice(sql: &str, start: usize, stop: usize) -> &str {
    if start >= stop {
        return "";
    }
    sql.get(start..stop).unwrap_or_default()
}

// Text known before routing.
fn fixed(kind: &TokenKind) -> Option<String> {
    match kind {
        TokenKind::Text(text) | TokenKind::Insert(text) => Some(text.clone()),
        TokenKind::Remove => Some(String::new()),
        TokenKind::Projection(columns) => Some(columns.join(", ")),
        _ => None,
    }
}

fn placeholder(kind: &TokenKind) -> Option<Placeholder> {
    match kind {
        TokenKind::Table { logical, quote } => Some(Placeholder::Table {
            logical: logical.clone(),
            quote: *quote,
        }),
        TokenKind::Index { name, logical } => Some(Placeholder::Index {
            name: name.clone(),
            logical: logical.clone(),
        }),
        TokenKind::InsertColumns { parens } => Some(Placeholder::InsertColumns { parens: *parens }),
        TokenKind::InsertValues => Some(Placeholder::InsertValues),
        _ => None,
    }
}

fn resolve(placeholder: &Placeholder, unit: &RoutingUnit, insert: Option<&InsertArena>) -> String {
    match placeholder {
        Placeholder::Table { logical, quote } => {
            let actual = unit.actual_table(logical).unwrap_or(logical);
            match quote {
                Some(open) => {
                    let close = match open {
                        '[' => ']',
                        other => *other,
                    };
                    format!("{}{}{}", open, actual, close)
                }
                None => actual.to_string(),
            }
        }

        Placeholder::Index { name, logical } => match unit.actual_table(logical) {
            Some(actual) => format!("{}_{}", name, actual),
            None => name.clone(),
        },

        Placeholder::InsertColumns { parens } => match insert {
            Some(insert) if *parens => insert.render_columns(),
            Some(insert) => format!(" {}", insert.render_columns()),
            None => String::new(),
        },

        Placeholder::InsertValues => insert
            .map(|insert| insert.render_values(unit))
            .unwrap_or_default(),
    }
}
