use thiserror::Error;

/// Errors raised while loading configuration or parsing core types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
