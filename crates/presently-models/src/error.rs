//! Model error types.

use thiserror::Error;

use crate::job::JobStatus;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Cannot {action} a job in status '{from}'")]
    InvalidTransition { from: JobStatus, action: &'static str },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ModelError {
    pub fn invalid_transition(from: JobStatus, action: &'static str) -> Self {
        Self::InvalidTransition { from, action }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
