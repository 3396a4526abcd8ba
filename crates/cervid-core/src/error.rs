use thiserror::Error;

#[derive(Error, Debug)]
pub enum CervidError {
    #[error("Bone not found: {0}")]
    BoneNotFound(String),

    #[error("No bone chain from '{start}' to '{end}'")]
    ChainNotFound { start: String, end: String },

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CervidError>;
