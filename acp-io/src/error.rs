//! Transport error types.

use acp_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by the framed transport.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("no connection")]
    NotConnected,

    #[error("read buffer too small: {capacity} bytes, message declares {message_length}")]
    ReadBufferTooSmall {
        capacity: usize,
        message_length: usize,
    },

    #[error("invalid message length: {0}")]
    InvalidMessageLength(usize),
}
