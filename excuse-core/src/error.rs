use thiserror::Error;

/// Startup failures: loading configuration and opening the store.
#[derive(Error, Debug)]
pub enum ExcuseError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

/// A wire tag that does not name any variant of a closed enumeration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownTag {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownTag {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
