use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    /// The file parsed but describes an impossible run or search.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}
