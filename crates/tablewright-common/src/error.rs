use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid default value {value:?} for {field_type} field: {reason}")]
    InvalidDefaultValue {
        field_type: String,
        value: String,
        reason: &'static str,
    },

    #[error("{context}: {message}")]
    SqlExecution { context: String, message: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("log write error: {0}")]
    LogWrite(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("plan error: {0}")]
    Plan(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a statement failure carrying the operator-facing context message.
    pub fn sql(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::SqlExecution {
            context: context.into(),
            message: message.to_string(),
        }
    }
}
