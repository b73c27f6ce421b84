use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// General routing settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct General {
    /// Validate computed data nodes against declared rules and live metadata.
    ///
    /// _Default:_ `true`
    #[serde(default = "General::check_table_metadata")]
    pub check_table_metadata: bool,

    /// Maximum number of routing units a cross-table (cartesian) route may produce.
    ///
    /// _Default:_ `4096`
    #[serde(default = "General::max_cartesian_units")]
    pub max_cartesian_units: usize,

    /// Worker identifier embedded in snowflake keys. Must be unique per process, at most 1023.
    ///
    /// _Default:_ `0`
    #[serde(default)]
    pub worker_id: u64,

    /// Log logical and actual SQL for every planned statement.
    ///
    /// _Default:_ `false`
    #[serde(default)]
    pub sql_show: bool,
}

impl Default for General {
    fn default() -> Self {
        Self {
            check_table_metadata: Self::check_table_metadata(),
            max_cartesian_units: Self::max_cartesian_units(),
            worker_id: 0,
            sql_show: false,
        }
    }
}

impl General {
    fn check_table_metadata() -> bool {
        true
    }

    fn max_cartesian_units() -> usize {
        4096
    }
}
