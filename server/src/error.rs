use thiserror::Error;

/// Infrastructure failures. Game-rule refusals are `shared::Rejection`.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
