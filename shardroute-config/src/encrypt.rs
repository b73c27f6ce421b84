use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Table with encrypted columns.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct EncryptTable {
    /// Logical table name.
    pub name: String,
    #[serde(default)]
    pub columns: Vec<EncryptColumn>,
}

/// Logical column stored encrypted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct EncryptColumn {
    /// Column name used by the application.
    pub name: String,
    /// Physical column holding the cipher text.
    pub cipher_column: String,
    /// Physical column holding a deterministic digest used for equality lookups.
    #[serde(default)]
    pub assisted_query_column: Option<String>,
    /// Name of the registered encryptor, e.g. `md5`.
    pub encryptor: String,
}
