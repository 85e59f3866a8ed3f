use thiserror::Error;

use crate::calc::ParseError;
use crate::core::{ExpressionId, TaskId};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Expression not found: {0}")]
    ExpressionNotFound(ExpressionId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Expression {id} rejected: {source}")]
    ExpressionRejected {
        id: ExpressionId,
        #[source]
        source: ParseError,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("No home directory")]
    NoHomeDir,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),
}

impl Error {
    /// Lookup failures that a transport reports as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ExpressionNotFound(_) | Error::TaskNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
