//! Book Context - Errors

use thiserror::Error;

use crate::domain::generation::TransitionError;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("Invalid title: {0}")]
    InvalidTitle(String),

    #[error("Invalid context: {0}")]
    InvalidContext(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
