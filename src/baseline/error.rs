use thiserror::Error;

#[derive(Error, Debug)]
pub enum BaselineError {
    /// The TCP connection could not be established at all.
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

pub type BaselineResult<T> = Result<T, BaselineError>;
