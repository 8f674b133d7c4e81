use thiserror::Error;

/// Top-level error type for the Converse core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConverseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for ConverseError {
    fn from(err: toml::de::Error) -> Self {
        ConverseError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ConverseError {
    fn from(err: toml::ser::Error) -> Self {
        ConverseError::Config(err.to_string())
    }
}

/// A specialized `Result` type for core operations.
pub type Result<T> = std::result::Result<T, ConverseError>;
