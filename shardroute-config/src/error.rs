//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid inline expression: \"{0}\"")]
    InlineExpression(String),

    #[error("invalid data node \"{0}\", expected <data_source>.<table>")]
    DataNode(String),

    #[error("{0}")]
    Invalid(String),
}

impl Error {
    pub(crate) fn invalid(message: impl ToString) -> Self {
        Self::Invalid(message.to_string())
    }
}
