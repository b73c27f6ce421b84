//! Broadcast routing.

use tracing::trace;

use super::{RoutingResult, RoutingUnit};
use crate::rule::RuleSet;

/// Every data source, no tables.
pub fn database(rules: &RuleSet) -> RoutingResult {
    trace!("routing using database broadcast");
    RoutingResult::from_units(rules.data_source_names().into_iter().map(RoutingUnit::new))
}

/// One data source per server instance.
pub fn instance(rules: &RuleSet) -> RoutingResult {
    trace!("routing using instance broadcast");
    RoutingResult::from_units(
        rules
            .instance_representatives()
            .into_iter()
            .map(RoutingUnit::new),
    )
}

/// Every data node of every table with a sharding or broadcast rule.
///
/// Each data node gets its own unit.
pub fn tables(rules: &RuleSet, tables: &[&str]) -> RoutingResult {
    trace!("routing using table broadcast");

    let mut result = RoutingResult::default();

    for table in tables {
        if let Some(rule) = rules.table_rule(table) {
            for node in rule.data_nodes() {
                result.add(RoutingUnit::new(&node.data_source).with_table(table, &node.table));
            }
        } else if rules.is_broadcast_table(table) {
            for data_source in rules.data_source_names() {
                result.add(RoutingUnit::new(data_source).with_table(table, table));
            }
        }
    }

    result
}

/// Single data source, logical table names unchanged.
pub fn single(data_source: &str, tables: &[&str]) -> RoutingResult {
    let mut unit = RoutingUnit::new(data_source);
    for table in tables {
        unit = unit.with_table(table, table);
    }
    RoutingResult::from_units([unit])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rule_set;

    #[test]
    fn test_database_broadcast() {
        let result = database(&rule_set());
        assert_eq!(result.data_sources(), vec!["ds_0", "ds_1"]);
        assert!(result.units.iter().all(|unit| unit.table_units.is_empty()));
    }

    #[test]
    fn test_table_broadcast() {
        let result = tables(&rule_set(), &["t_order", "t_config", "t_unknown"]);
        // 4 t_order nodes, 2 t_config replicas.
        assert_eq!(result.len(), 6);
        assert_eq!(result.units[4].actual_table("t_config"), Some("t_config"));
    }

    #[test]
    fn test_single() {
        let result = single("ds_0", &["t_misc"]);
        assert_eq!(result.units[0].actual_table("t_misc"), Some("t_misc"));
    }
}
