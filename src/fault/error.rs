use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FaultError {
    /// The emulation rule could not be installed (missing `tc`, no privilege, ...).
    #[error("Fault injection unavailable: {0}")]
    FaultInjectionUnavailable(String),

    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Invalid network condition: {0}")]
    InvalidCondition(String),
}

pub type FaultResult<T> = Result<T, FaultError>;
