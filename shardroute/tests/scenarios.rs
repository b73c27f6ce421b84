use std::str::FromStr;
use std::sync::Arc;

use shardroute::config::Config;
use shardroute::statement::{
    ColumnRef, DdlKind, Expr, Filter, Insert, InsertColumn, Predicate, Select, Span, TableRef,
};
use shardroute::{
    BoundStatement, EncryptorRegistry, Error, Hints, LiveMetadata, RuleSet, Scalar,
    ShardingEngine, StatementKind,
};

fn span(sql: &str, needle: &str) -> Span {
    nth(sql, needle, 0)
}

fn nth(sql: &str, needle: &str, n: usize) -> Span {
    let (start, _) = sql.match_indices(needle).nth(n).unwrap();
    Span::new(start, start + needle.len())
}

fn engine(config: &str) -> ShardingEngine {
    let config = Config::from_str(config).unwrap();
    let rules = RuleSet::new(&config, &EncryptorRegistry::new()).unwrap();
    ShardingEngine::new(Arc::new(rules), Arc::new(LiveMetadata::new()))
}

const SINGLE_SOURCE: &str = r#"
[[data_sources]]
name = "ds_0"

[[sharded_tables]]
name = "t_order"
actual_data_nodes = "ds_0.t_order_${0..1}"
table_strategy = { type = "standard", column = "user_id", algorithm = { type = "mod", sharding_count = 2 } }
"#;

#[test]
fn test_multi_row_insert_splits_rows() {
    let sql = "INSERT INTO t_order (id,user_id) VALUES (?,?),(?,?)";
    let insert = Insert {
        columns: vec![
            InsertColumn::new("id", span(sql, "id")),
            InsertColumn::new("user_id", span(sql, "user_id")),
        ],
        columns_span: Some(span(sql, "(id,user_id)")),
        rows: vec![
            vec![
                Expr::param(0, nth(sql, "?", 0)),
                Expr::param(1, nth(sql, "?", 1)),
            ],
            vec![
                Expr::param(2, nth(sql, "?", 2)),
                Expr::param(3, nth(sql, "?", 3)),
            ],
        ],
        values_span: span(sql, "(?,?),(?,?)"),
    };
    let statement = BoundStatement::new(sql, StatementKind::Insert(insert))
        .with_table(TableRef::new("t_order", span(sql, "t_order")));
    let params: Vec<Scalar> = vec![1.into(), 10.into(), 2.into(), 11.into()];

    let plan = engine(SINGLE_SOURCE)
        .plan(&statement, &params, &Hints::new())
        .unwrap();

    assert_eq!(plan.len(), 2);

    let first = &plan.units[0];
    assert_eq!(first.unit.actual_table("t_order"), Some("t_order_0"));
    assert_eq!(first.sql, "INSERT INTO t_order_0 (id, user_id) VALUES (?, ?)");
    assert_eq!(first.parameters, vec![Scalar::from(1), Scalar::from(10)]);

    let second = &plan.units[1];
    assert_eq!(second.sql, "INSERT INTO t_order_1 (id, user_id) VALUES (?, ?)");
    assert_eq!(second.parameters, vec![Scalar::from(2), Scalar::from(11)]);
}

#[test]
fn test_point_select_single_unit() {
    let config = r#"
[[data_sources]]
name = "ds_0"

[[sharded_tables]]
name = "t_order"
actual_data_nodes = "ds_0.t_order_${0..1}"
table_strategy = { type = "standard", column = "order_id", algorithm = { type = "mod", sharding_count = 2 } }
"#;
    let sql = "SELECT * FROM t_order WHERE order_id = 1";
    let statement = BoundStatement::new(
        sql,
        StatementKind::Select(Select {
            filter: Filter::and(vec![Predicate::eq(
                ColumnRef::new("t_order", "order_id", span(sql, "order_id")),
                Expr::literal(1, span(sql, "1")),
            )]),
            ..Default::default()
        }),
    )
    .with_table(TableRef::new("t_order", span(sql, "t_order")));

    let plan = engine(config).plan(&statement, &[], &Hints::new()).unwrap();

    assert!(plan.result.is_single());
    assert_eq!(plan.units[0].sql, "SELECT * FROM t_order_1 WHERE order_id = 1");
}

#[test]
fn test_broadcast_ddl() {
    let config = r#"
broadcast_tables = ["t_config"]

[[data_sources]]
name = "ds_0"

[[data_sources]]
name = "ds_1"
"#;
    let sql = "CREATE TABLE t_config (id BIGINT, value TEXT)";
    let statement = BoundStatement::new(
        sql,
        StatementKind::Ddl {
            kind: DdlKind::CreateTable,
            indexes: vec![],
        },
    )
    .with_table(TableRef::new("t_config", span(sql, "t_config")));

    let plan = engine(config).plan(&statement, &[], &Hints::new()).unwrap();

    assert_eq!(plan.result.data_sources(), vec!["ds_0", "ds_1"]);
    for unit in &plan.units {
        assert_eq!(unit.unit.actual_table("t_config"), Some("t_config"));
        assert_eq!(unit.sql, sql);
    }
}

#[test]
fn test_subquery_mismatch_is_ambiguous() {
    let config = r#"
[[data_sources]]
name = "ds_0"

[[data_sources]]
name = "ds_1"

[[sharded_tables]]
name = "t_order"
actual_data_nodes = "ds_${0..1}.t_order"
database_strategy = { type = "standard", column = "user_id", algorithm = { type = "mod", sharding_count = 2 } }
"#;
    let sql = "SELECT * FROM t_order WHERE user_id=1 AND id IN (SELECT id FROM t_order WHERE user_id=2)";
    let user_id = |n| ColumnRef::new("t_order", "user_id", nth(sql, "user_id", n));
    let filter = Filter::and(vec![Predicate::eq(user_id(0), Expr::literal(1, span(sql, "1")))])
        .with_subquery(Filter::and(vec![Predicate::eq(
            user_id(1),
            Expr::literal(2, span(sql, "2")),
        )]));
    let statement = BoundStatement::new(
        sql,
        StatementKind::Select(Select {
            filter,
            ..Default::default()
        }),
    )
    .with_table(TableRef::new("t_order", nth(sql, "t_order", 0)))
    .with_table(TableRef::new("t_order", nth(sql, "t_order", 1)));

    let err = engine(config)
        .plan(&statement, &[], &Hints::new())
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousShardingValue(_)));
    assert!(!err.is_internal());
}

#[test]
fn test_absent_data_node() {
    let config = r#"
[[data_sources]]
name = "ds_0"

[[sharded_tables]]
name = "t_order"
actual_data_nodes = "ds_0.t_order_${0..1}"
table_strategy = { type = "standard", column = "order_id", algorithm = { type = "mod", sharding_count = 8 } }
"#;
    let sql = "SELECT * FROM t_order WHERE order_id = 5";
    let statement = BoundStatement::new(
        sql,
        StatementKind::Select(Select {
            filter: Filter::and(vec![Predicate::eq(
                ColumnRef::new("t_order", "order_id", span(sql, "order_id")),
                Expr::literal(5, span(sql, "5")),
            )]),
            ..Default::default()
        }),
    )
    .with_table(TableRef::new("t_order", span(sql, "t_order")));

    let err = engine(config)
        .plan(&statement, &[], &Hints::new())
        .unwrap_err();

    let Error::AbsentDataNodes(absent) = &err else {
        panic!("unexpected error: {}", err);
    };
    assert_eq!(absent.nodes(), vec!["ds_0.t_order_5"]);
    let table = &absent.tables[0];
    assert_eq!(table.logical_table, "t_order");
    assert_eq!(table.database_strategy, "none");
    assert_eq!(
        table.table_strategy,
        "standard(column=order_id, algorithm=mod(8))"
    );
    assert!(err.to_string().contains("t_order_5"));
}

#[test]
fn test_live_metadata_confirms_node() {
    let config = r#"
[general]
check_table_metadata = true

[[data_sources]]
name = "ds_0"

[[sharded_tables]]
name = "t_order"
actual_data_nodes = "ds_0.t_order_${0..1}"
table_strategy = { type = "standard", column = "order_id", algorithm = { type = "mod", sharding_count = 8 } }
"#;
    let config = Config::from_str(config).unwrap();
    let rules = RuleSet::new(&config, &EncryptorRegistry::new()).unwrap();
    let mut metadata = LiveMetadata::new();
    metadata.add_table("ds_0", "t_order_5");
    let engine = ShardingEngine::new(Arc::new(rules), Arc::new(metadata));

    let sql = "DELETE FROM t_order WHERE order_id = 5";
    let statement = BoundStatement::new(
        sql,
        StatementKind::Delete(shardroute::statement::Delete {
            filter: Filter::and(vec![Predicate::eq(
                ColumnRef::new("t_order", "order_id", span(sql, "order_id")),
                Expr::literal(5, span(sql, "5")),
            )]),
        }),
    )
    .with_table(TableRef::new("t_order", span(sql, "t_order")));

    let plan = engine.plan(&statement, &[], &Hints::new()).unwrap();
    assert_eq!(plan.units[0].sql, "DELETE FROM t_order_5 WHERE order_id = 5");
}

const TWO_SOURCES: &str = r#"
[[data_sources]]
name = "ds_0"

[[data_sources]]
name = "ds_1"

[[sharded_tables]]
name = "t_order"
actual_data_nodes = "ds_${0..1}.t_order_${0..1}"
database_strategy = { type = "standard", column = "user_id", algorithm = { type = "mod", sharding_count = 2 } }
table_strategy = { type = "standard", column = "order_id", algorithm = { type = "mod", sharding_count = 2 } }
"#;

fn eq(sql: &str, column: &str, value: impl Into<Scalar>) -> Predicate {
    Predicate::eq(
        ColumnRef::new("t_order", column, span(sql, column)),
        Expr::literal(value, Span::default()),
    )
}

fn subquery_select(sql: &str, outer: Vec<Predicate>, inner: Vec<Predicate>) -> BoundStatement {
    let filter = Filter::and(outer).with_subquery(Filter::and(inner));
    BoundStatement::new(
        sql,
        StatementKind::Select(Select {
            filter,
            ..Default::default()
        }),
    )
    .with_table(TableRef::new("t_order", nth(sql, "t_order", 0)))
    .with_table(TableRef::new("t_order", nth(sql, "t_order", 1)))
}

#[test]
fn test_subquery_outer_values_only() {
    let sql = "SELECT * FROM t_order WHERE user_id = 1 AND order_id = 1 AND order_id IN (SELECT order_id FROM t_order WHERE status = 'x')";
    let statement = subquery_select(
        sql,
        vec![eq(sql, "user_id", 1), eq(sql, "order_id", 1)],
        vec![eq(sql, "status", "x")],
    );

    let plan = engine(TWO_SOURCES)
        .plan(&statement, &[], &Hints::new())
        .unwrap();

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.units[0].unit.data_source, "ds_1");
    assert_eq!(plan.units[0].sql, sql.replace("t_order", "t_order_1"));
}

#[test]
fn test_subquery_values_only() {
    let sql = "SELECT * FROM t_order WHERE status = 'x' AND order_id IN (SELECT order_id FROM t_order WHERE user_id = 1 AND order_id = 1)";
    let statement = subquery_select(
        sql,
        vec![eq(sql, "status", "x")],
        vec![eq(sql, "user_id", 1), eq(sql, "order_id", 1)],
    );

    let plan = engine(TWO_SOURCES)
        .plan(&statement, &[], &Hints::new())
        .unwrap();

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.units[0].unit.data_source, "ds_1");
    assert_eq!(plan.units[0].sql, sql.replace("t_order", "t_order_1"));
}

#[test]
fn test_subquery_equal_values_collapse() {
    let sql = "SELECT * FROM t_order WHERE user_id = 0 AND order_id = 1 AND order_id IN (SELECT order_id FROM t_order WHERE order_id = 1 AND user_id = 0)";
    let statement = subquery_select(
        sql,
        vec![eq(sql, "user_id", 0), eq(sql, "order_id", 1)],
        vec![eq(sql, "order_id", 1), eq(sql, "user_id", 0)],
    );

    let plan = engine(TWO_SOURCES)
        .plan(&statement, &[], &Hints::new())
        .unwrap();

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.units[0].unit.data_source, "ds_0");
    assert_eq!(plan.units[0].sql, sql.replace("t_order", "t_order_1"));
}

#[test]
fn test_subquery_unequal_values_are_ambiguous() {
    let sql = "SELECT * FROM t_order WHERE user_id = 1 AND order_id = 1 AND order_id IN (SELECT order_id FROM t_order WHERE user_id = 1)";
    let statement = subquery_select(
        sql,
        vec![eq(sql, "user_id", 1), eq(sql, "order_id", 1)],
        vec![eq(sql, "user_id", 1)],
    );

    let err = engine(TWO_SOURCES)
        .plan(&statement, &[], &Hints::new())
        .unwrap_err();
    assert!(matches!(err, Error::AmbiguousShardingValue(_)));
}
