//! Buffer access error types.

use thiserror::Error;

/// Errors raised by view accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("requested area out of bounds (offset {offset}, len {len}, view size {size})")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("string not NUL-terminated within bounds (offset {offset}, view size {size})")]
    NotNulTerminated { offset: usize, size: usize },

    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },
}
