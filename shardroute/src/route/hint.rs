//! Caller-supplied shard selectors.

use std::collections::HashMap;

use tracing::debug;

use super::{RoutingResult, RoutingUnit};
use crate::rule::{algorithm, RuleSet};
use crate::value::Scalar;
use crate::Error;

/// Hint values, consumed by `hint` strategies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hints {
    /// Database hint values, by lowercase logical table.
    database: HashMap<String, Vec<Scalar>>,
    /// Table hint values, by lowercase logical table.
    table: HashMap<String, Vec<Scalar>>,
    /// Route on the default database strategy alone, skipping
    /// condition extraction.
    database_only: Option<Vec<Scalar>>,
}

impl Hints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database_value(mut self, table: &str, value: impl Into<Scalar>) -> Self {
        self.database
            .entry(table.to_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_table_value(mut self, table: &str, value: impl Into<Scalar>) -> Self {
        self.table
            .entry(table.to_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    /// Hint-only routing: the statement goes where the default database
    /// strategy sends `value`.
    pub fn database_only(value: impl Into<Scalar>) -> Self {
        Self {
            database_only: Some(vec![value.into()]),
            ..Default::default()
        }
    }

    pub fn database_values(&self, table: &str) -> Option<&[Scalar]> {
        self.database.get(&table.to_lowercase()).map(|v| v.as_slice())
    }

    pub fn table_values(&self, table: &str) -> Option<&[Scalar]> {
        self.table.get(&table.to_lowercase()).map(|v| v.as_slice())
    }

    pub fn is_database_only(&self) -> bool {
        self.database_only.is_some()
    }

    /// Route in hint-only mode.
    ///
    /// Logical table names stay unchanged; every unit addresses the data
    /// source only.
    pub fn route_database_only(&self, rules: &RuleSet) -> Result<Option<RoutingResult>, Error> {
        let Some(values) = &self.database_only else {
            return Ok(None);
        };

        if !rules.default_database_strategy.is_hint() {
            return Err(Error::UnroutableStatement(
                "hint-only routing requires a hint default database strategy".into(),
            ));
        }

        let available = rules.data_source_names();
        let data_sources = algorithm::route(
            &rules.default_database_strategy,
            &available,
            &[],
            Some(values),
        )?;

        // No table units here, so the validator can't catch these.
        if let Some(missing) = data_sources.iter().find(|ds| !available.contains(ds)) {
            return Err(Error::UnknownDataSource(missing.clone()));
        }

        debug!("hint-only routing to {:?}", data_sources);

        Ok(Some(RoutingResult::from_units(
            data_sources.into_iter().map(RoutingUnit::new),
        )))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rule_set_with;
    use shardroute_config::{ShardingAlgorithm, ShardingStrategy};

    #[test]
    fn test_database_only() {
        let rules = rule_set_with(|config| {
            config.default_database_strategy = ShardingStrategy::Hint {
                algorithm: ShardingAlgorithm::Mod { sharding_count: 2 },
            };
        });

        let result = Hints::database_only(3)
            .route_database_only(&rules)
            .unwrap()
            .unwrap();
        assert_eq!(result.data_sources(), vec!["ds_1"]);
        assert!(result.units[0].table_units.is_empty());
    }

    #[test]
    fn test_database_only_unknown_data_source() {
        let rules = rule_set_with(|config| {
            config.default_database_strategy = ShardingStrategy::Hint {
                algorithm: ShardingAlgorithm::Mod { sharding_count: 4 },
            };
        });

        let err = Hints::database_only(3)
            .route_database_only(&rules)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownDataSource(ref name) if name == "ds_3"));
    }

    #[test]
    fn test_database_only_needs_hint_strategy() {
        let rules = rule_set_with(|_| ());
        assert!(matches!(
            Hints::database_only(1).route_database_only(&rules),
            Err(Error::UnroutableStatement(_))
        ));
        assert!(Hints::new().route_database_only(&rules).unwrap().is_none());
    }

    #[test]
    fn test_values_are_case_insensitive() {
        let hints = Hints::new()
            .with_database_value("T_ORDER", 1)
            .with_table_value("t_order", 2);
        assert_eq!(hints.database_values("t_order"), Some(&[Scalar::from(1)][..]));
        assert_eq!(hints.table_values("T_ORDER"), Some(&[Scalar::from(2)][..]));
        assert_eq!(hints.table_values("t_user"), None);
    }
}
