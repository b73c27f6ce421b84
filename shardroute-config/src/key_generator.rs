use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Column filled in by the middleware on `INSERT`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct KeyGeneratorConfig {
    /// Column name.
    pub column: String,
    /// Generator producing the values. Falls back to `default_key_generator`, then `snowflake`.
    #[serde(default)]
    pub generator: Option<KeyGeneratorKind>,
}

/// Key generation algorithm.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyGeneratorKind {
    /// 64-bit time-ordered IDs: 41 bits of milliseconds, 10 bits of worker ID, 12 bits of sequence.
    #[default]
    Snowflake,
    /// Process-local atomic counter.
    Increment {
        #[serde(default = "KeyGeneratorKind::default_start")]
        start: i64,
    },
    /// Random UUIDv4, as text.
    Uuid,
}

impl KeyGeneratorKind {
    fn default_start() -> i64 {
        1
    }
}
