//! Gesture error types.

use crate::control::ControlId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GestureError {
    #[error("Unknown control: {0}")]
    UnknownControl(ControlId),

    #[error("Invalid control {id}: {reason}")]
    InvalidControl { id: ControlId, reason: String },
}

pub type GestureResult<T> = Result<T, GestureError>;
