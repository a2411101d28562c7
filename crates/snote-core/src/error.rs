use thiserror::Error;

pub type SnoteResult<T> = Result<T, SnoteError>;

#[derive(Debug, Error)]
pub enum SnoteError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
