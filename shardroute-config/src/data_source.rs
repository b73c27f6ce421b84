use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Physical database the router can send statements to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct DataSource {
    /// Name referenced by data nodes, e.g. `ds_0`.
    pub name: String,
    /// Database host.
    #[serde(default = "DataSource::host")]
    pub host: String,
    /// Database port.
    #[serde(default = "DataSource::port")]
    pub port: u16,
    /// Database name on the server, if different from `name`.
    #[serde(default)]
    pub database: Option<String>,
}

impl DataSource {
    pub fn new(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            host: Self::host(),
            port: Self::port(),
            database: None,
        }
    }

    /// Server instance identity. Data sources on the same instance share it.
    pub fn instance(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn host() -> String {
        "127.0.0.1".into()
    }

    fn port() -> u16 {
        5432
    }
}
