use thiserror::Error;

/// Top-level error type for the consultation system.
///
/// Collaborator crates (providers, storage, speech adapters) report their
/// failures through these variants so that the `?` operator works across
/// crate boundaries. The session controller never lets one of these escape;
/// it converts them into fallback values instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConsultError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Diagnosis error: {0}")]
    Diagnosis(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ConsultError {
    fn from(err: toml::de::Error) -> Self {
        ConsultError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ConsultError {
    fn from(err: toml::ser::Error) -> Self {
        ConsultError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ConsultError {
    fn from(err: serde_json::Error) -> Self {
        ConsultError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for consultation operations.
pub type Result<T> = std::result::Result<T, ConsultError>;
