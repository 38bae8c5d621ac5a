use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharkError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Live session error: {0}")]
    Live(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Location error: {0}")]
    Location(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SharkError>;
