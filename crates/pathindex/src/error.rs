use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Path is outside the served directory: {0}")]
    OutsideBase(PathBuf),

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),

    #[error("Path traversal rejected: {0}")]
    Traversal(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
