use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Fault injection error: {0}")]
    Fault(#[from] crate::fault::FaultError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] crate::dispatcher::DispatchError),

    #[error("Invalid benchmark configuration: {0}")]
    InvalidConfig(String),
}

pub type BenchResult<T> = Result<T, BenchError>;
