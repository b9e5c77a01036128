use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("Baseline error: {0}")]
    Baseline(#[from] crate::baseline::BaselineError),

    #[error("No requests in batch")]
    EmptyBatch,
}

pub type DispatchResult<T> = Result<T, DispatchError>;
