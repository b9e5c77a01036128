use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Content root unusable: {0}")]
    InvalidRoot(String),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
