//! Bound statement.
//!
//! Produced by the binder: statement kind, table references with
//! alias/owner information, and column provenance for predicates,
//! assignments and insert rows. Every element that may be rewritten
//! carries its byte span in the original SQL text.

pub mod span;

pub use span::Span;

use crate::value::Scalar;
use crate::Error;

/// Reference to a logical table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    /// Logical table name, unquoted.
    pub name: String,
    /// Span of the table identifier, quotes included.
    pub span: Span,
    /// Span of the `owner.` qualifier, dot included.
    pub owner: Option<Span>,
    /// Quote character wrapping the identifier.
    pub quote: Option<char>,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl ToString, span: Span) -> Self {
        Self {
            name: name.to_string(),
            span,
            owner: None,
            quote: None,
            alias: None,
        }
    }

    pub fn with_owner(mut self, owner: Span) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = Some(quote);
        self
    }

    pub fn with_alias(mut self, alias: impl ToString) -> Self {
        self.alias = Some(alias.to_string());
        self
    }
}

/// Column resolved to the logical table it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: String,
    pub name: String,
    /// Span of the column name, without any qualifier.
    pub span: Span,
}

impl ColumnRef {
    pub fn new(table: impl ToString, name: impl ToString, span: Span) -> Self {
        Self {
            table: table.to_string(),
            name: name.to_string(),
            span,
        }
    }
}

/// Value expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal { value: Scalar, span: Span },
    /// Positional `?` marker, zero-based.
    Param { index: usize, span: Span },
    Default { span: Span },
    /// Anything else: functions, arithmetic, column references.
    Other { span: Span },
}

impl Expr {
    pub fn literal(value: impl Into<Scalar>, span: Span) -> Self {
        Self::Literal {
            value: value.into(),
            span,
        }
    }

    pub fn param(index: usize, span: Span) -> Self {
        Self::Param { index, span }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Literal { span, .. }
            | Self::Param { span, .. }
            | Self::Default { span }
            | Self::Other { span } => *span,
        }
    }

    /// Value of the expression, if it can be known before execution.
    pub fn resolve(&self, params: &[Scalar]) -> Result<Option<Scalar>, Error> {
        match self {
            Self::Literal { value, .. } => Ok(Some(value.clone())),
            Self::Param { index, .. } => params
                .get(*index)
                .cloned()
                .map(Some)
                .ok_or(Error::MissingParameter(*index)),
            Self::Default { .. } | Self::Other { .. } => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    In,
    Between,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Other,
}

/// `column <operator> values`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: ColumnRef,
    pub operator: Operator,
    pub values: Vec<Expr>,
}

impl Predicate {
    pub fn new(column: ColumnRef, operator: Operator, values: Vec<Expr>) -> Self {
        Self {
            column,
            operator,
            values,
        }
    }

    pub fn eq(column: ColumnRef, value: Expr) -> Self {
        Self::new(column, Operator::Eq, vec![value])
    }
}

/// `WHERE` clause in disjunctive normal form.
///
/// Each group is a conjunction of predicates; groups are OR'ed together.
/// No groups means no filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    pub groups: Vec<Vec<Predicate>>,
    /// Filters of nested subqueries.
    pub subqueries: Vec<Filter>,
}

impl Filter {
    /// Single conjunction.
    pub fn and(predicates: Vec<Predicate>) -> Self {
        Self {
            groups: vec![predicates],
            subqueries: vec![],
        }
    }

    pub fn with_subquery(mut self, filter: Filter) -> Self {
        self.subqueries.push(filter);
        self
    }

    /// Every predicate, including those in subqueries.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut result: Vec<&Predicate> = self.groups.iter().flatten().collect();
        for subquery in &self.subqueries {
            result.extend(subquery.predicates());
        }
        result
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `*` or `t.*`, with the columns the binder expanded it to.
    Shorthand { span: Span, columns: Vec<ColumnRef> },
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
    Expression { span: Span },
}

/// `LIMIT offset, row_count`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Limit {
    pub offset: Option<Expr>,
    pub row_count: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub projections: Vec<Projection>,
    pub filter: Filter,
    pub limit: Option<Limit>,
}

/// Column of an `INSERT` column list.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertColumn {
    pub name: String,
    pub span: Span,
    /// Default declared when the table was created.
    pub default: Option<Scalar>,
}

impl InsertColumn {
    pub fn new(name: impl ToString, span: Span) -> Self {
        Self {
            name: name.to_string(),
            span,
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub columns: Vec<InsertColumn>,
    /// Span of the column list, parentheses included. `None` if the
    /// statement doesn't list columns.
    pub columns_span: Option<Span>,
    pub rows: Vec<Vec<Expr>>,
    /// Span of every row after `VALUES`.
    pub values_span: Span,
}

impl Insert {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
    }
}

/// `column = value` in `UPDATE ... SET`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Update {
    pub assignments: Vec<Assignment>,
    pub filter: Filter,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delete {
    pub filter: Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    CreateTable,
    AlterTable,
    DropTable,
    Truncate,
    CreateIndex,
    DropIndex,
    /// Functions and procedures.
    Routine,
    Tablespace,
}

impl DdlKind {
    pub fn is_index(&self) -> bool {
        matches!(self, Self::CreateIndex | Self::DropIndex)
    }
}

/// Index name in a DDL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRef {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DalKind {
    Use,
    Set,
    ShowDatabases,
    /// `SHOW COLUMNS`, `DESCRIBE` and the like.
    ShowTable,
    Optimize,
    Analyze,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Ddl {
        kind: DdlKind,
        indexes: Vec<IndexRef>,
    },
    Dal(DalKind),
    Dcl {
        /// Privileges granted on `*` or `db.*`.
        wildcard: bool,
    },
    Tcl,
    /// Recognized by the binder but not routable.
    Unsupported(String),
}

/// Statement bound to table and column metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    /// Every table reference, including those in subqueries.
    pub tables: Vec<TableRef>,
    pub kind: StatementKind,
}

impl BoundStatement {
    pub fn new(sql: impl ToString, kind: StatementKind) -> Self {
        Self {
            sql: sql.to_string(),
            tables: vec![],
            kind,
        }
    }

    pub fn with_table(mut self, table: TableRef) -> Self {
        self.tables.push(table);
        self
    }

    /// Distinct logical table names, in order of appearance.
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = vec![];
        for table in &self.tables {
            if !names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&table.name))
            {
                names.push(&table.name);
            }
        }
        names
    }

    pub fn filter(&self) -> Option<&Filter> {
        match &self.kind {
            StatementKind::Select(select) => Some(&select.filter),
            StatementKind::Update(update) => Some(&update.filter),
            StatementKind::Delete(delete) => Some(&delete.filter),
            _ => None,
        }
    }

    pub fn insert(&self) -> Option<&Insert> {
        match &self.kind {
            StatementKind::Insert(insert) => Some(insert),
            _ => None,
        }
    }

    pub fn has_subquery(&self) -> bool {
        self.filter()
            .map(|filter| !filter.subqueries.is_empty())
            .unwrap_or(false)
    }

    pub fn is_read(&self) -> bool {
        matches!(self.kind, StatementKind::Select(_))
    }

    pub fn is_dml(&self) -> bool {
        matches!(
            self.kind,
            StatementKind::Select(_)
                | StatementKind::Insert(_)
                | StatementKind::Update(_)
                | StatementKind::Delete(_)
        )
    }

    pub fn is_index_ddl(&self) -> bool {
        matches!(&self.kind, StatementKind::Ddl { kind, .. } if kind.is_index())
    }

    /// Source text of a span.
    pub fn text(&self, span: Span) -> &str {
        self.sql.get(span.start..span.stop).unwrap_or_default()
    }
}
