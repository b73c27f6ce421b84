//! Test fixtures.

use std::str::FromStr;
use std::sync::Arc;

use shardroute_config::Config;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::rule::{EncryptAlgorithm, EncryptorRegistry, RuleSet};
use crate::statement::{BoundStatement, Expr, Insert, InsertColumn, Span, StatementKind, TableRef};
use crate::value::Scalar;

pub const CONFIG: &str = r#"
broadcast_tables = ["t_config"]

[[data_sources]]
name = "ds_0"

[[data_sources]]
name = "ds_1"

[[sharded_tables]]
name = "t_order"
actual_data_nodes = "ds_${0..1}.t_order_${0..1}"
database_strategy = { type = "standard", column = "user_id", algorithm = { type = "mod", sharding_count = 2 } }
table_strategy = { type = "standard", column = "order_id", algorithm = { type = "mod", sharding_count = 2 } }
key_generator = { column = "order_id", generator = { type = "increment", start = 1 } }

[[sharded_tables]]
name = "t_order_item"
actual_data_nodes = "ds_${0..1}.t_order_item_${0..1}"
database_strategy = { type = "standard", column = "user_id", algorithm = { type = "mod", sharding_count = 2 } }
table_strategy = { type = "standard", column = "order_id", algorithm = { type = "mod", sharding_count = 2 } }

[[sharded_tables]]
name = "t_user"
actual_data_nodes = "ds_${0..1}.t_user_${0..1}"
database_strategy = { type = "standard", column = "user_id", algorithm = { type = "mod", sharding_count = 2 } }
table_strategy = { type = "complex", columns = ["user_id", "tenant_id"], algorithm = { type = "mod", sharding_count = 2 } }

[[binding_tables]]
tables = ["t_order", "t_order_item"]

[[encrypt_tables]]
name = "t_encrypt"

[[encrypt_tables.columns]]
name = "pwd"
cipher_column = "pwd_cipher"
assisted_query_column = "pwd_assisted"
encryptor = "tagged"
"#;

/// Reversible encryptor with readable output.
#[derive(Debug, Default)]
pub struct Tagged;

impl EncryptAlgorithm for Tagged {
    fn name(&self) -> &str {
        "tagged"
    }

    fn encrypt(&self, value: &Scalar) -> Result<Scalar, String> {
        Ok(Scalar::Text(format!("enc:{}", value)))
    }

    fn decrypt(&self, value: &Scalar) -> Result<Scalar, String> {
        value
            .text()
            .and_then(|text| text.strip_prefix("enc:"))
            .map(Scalar::from)
            .ok_or_else(|| format!("\"{}\" isn't encrypted", value))
    }

    fn supports_assisted_query(&self) -> bool {
        true
    }

    fn assisted_encrypt(&self, value: &Scalar) -> Result<Scalar, String> {
        Ok(Scalar::Text(format!("ast:{}", value)))
    }
}

pub fn logger() {
    let format = fmt::layer().with_test_writer().with_file(false);
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(format)
        .with(filter)
        .try_init();
}

pub fn config() -> Config {
    Config::from_str(CONFIG).unwrap()
}

pub fn encryptors() -> EncryptorRegistry {
    let mut registry = EncryptorRegistry::new();
    registry.register(Arc::new(Tagged));
    registry
}

pub fn rule_set() -> RuleSet {
    RuleSet::new(&config(), &encryptors()).unwrap()
}

pub fn rule_set_with(f: impl FnOnce(&mut Config)) -> RuleSet {
    let mut config = config();
    f(&mut config);
    RuleSet::new(&config, &encryptors()).unwrap()
}

/// Span of the first occurrence of `needle`.
pub fn span_of(sql: &str, needle: &str) -> Span {
    span_of_nth(sql, needle, 0)
}

/// Span of the `nth` occurrence of `needle`, zero-based.
pub fn span_of_nth(sql: &str, needle: &str, nth: usize) -> Span {
    let (start, _) = sql
        .match_indices(needle)
        .nth(nth)
        .unwrap_or_else(|| panic!("\"{}\" not in \"{}\"", needle, sql));
    Span::new(start, start + needle.len())
}

/// Bind a simple `INSERT INTO table (columns) VALUES (...), ...`.
///
/// Values are `?`, quoted strings, integers or `DEFAULT`; anything else
/// is bound as an opaque expression. No nested parentheses.
pub fn insert_statement(sql: &str, table: &str, columns: &[&str]) -> BoundStatement {
    let table_span = span_of(sql, table);

    let columns_span = if columns.is_empty() {
        None
    } else {
        let open = table_span.stop + sql[table_span.stop..].find('(').unwrap();
        let close = open + sql[open..].find(')').unwrap();
        Some(Span::new(open, close + 1))
    };

    let keyword = sql.find("VALUES").unwrap() + "VALUES".len();
    let values_start = keyword + (sql[keyword..].len() - sql[keyword..].trim_start().len());
    let values_span = Span::new(values_start, sql.trim_end().len());

    let mut rows = vec![];
    let mut row: Option<Vec<Expr>> = None;
    let mut start = 0;
    let mut quoted = false;
    let mut param = 0;

    for (i, c) in sql[values_start..].char_indices() {
        let i = i + values_start;
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted && row.is_none() => {
                row = Some(vec![]);
                start = i + 1;
            }
            ',' | ')' if !quoted && row.is_some() => {
                let value = expr(sql, Span::new(start, i), &mut param);
                row.as_mut().unwrap().push(value);
                start = i + 1;
                if c == ')' {
                    rows.push(row.take().unwrap());
                }
            }
            _ => (),
        }
    }

    let insert = Insert {
        columns: columns
            .iter()
            .map(|column| InsertColumn::new(column, span_of(sql, column)))
            .collect(),
        columns_span,
        rows,
        values_span,
    };

    BoundStatement::new(sql, StatementKind::Insert(insert))
        .with_table(TableRef::new(table, table_span))
}

fn expr(sql: &str, span: Span, param: &mut usize) -> Expr {
    let raw = &sql[span.start..span.stop];
    let start = span.start + (raw.len() - raw.trim_start().len());
    let text = raw.trim();
    let span = Span::new(start, start + text.len());

    if text == "?" {
        let expr = Expr::param(*param, span);
        *param += 1;
        expr
    } else if text.eq_ignore_ascii_case("DEFAULT") {
        Expr::Default { span }
    } else if let Some(text) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        Expr::literal(text, span)
    } else if let Ok(value) = text.parse::<i64>() {
        Expr::literal(value, span)
    } else {
        Expr::Other { span }
    }
}
