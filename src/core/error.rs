use crate::schema::Rejection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArmError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Unusable model output: {0}")]
    ModelOutput(String),

    #[error("Plan rejected: {0}")]
    Rejected(Rejection),

    #[error("Gave up after {attempts} attempt(s): {last_reason}")]
    RetriesExhausted { attempts: usize, last_reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ArmError>;
