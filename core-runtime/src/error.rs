use thiserror::Error;

/// Errors raised while assembling the runtime (configuration, logging setup).
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable {name} is not set")]
    MissingEnv { name: &'static str },

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
