use crate::transport::StreamId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelatorError {
    #[error("Stream {0} is already registered")]
    DuplicateStream(StreamId),

    #[error("Stream {0} was never registered")]
    UnknownStream(StreamId),
}

pub type CorrelatorResult<T> = Result<T, CorrelatorError>;
