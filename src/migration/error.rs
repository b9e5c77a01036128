use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Path migration failed: {0}")]
    Failed(String),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),
}

pub type MigrationResult<T> = Result<T, MigrationError>;
