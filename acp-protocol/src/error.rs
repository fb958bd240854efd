//! Protocol error types.

use acp_buffer::BufferError;
use thiserror::Error;

/// Errors raised while encoding or decoding messages.
///
/// Codec errors are programmer or data errors and surface immediately;
/// there is no internal recovery. A caller decoding untrusted input can
/// only resynchronize by discarding the whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error("buffer too small: {actual} bytes (need at least {required})")]
    TooShort { required: usize, actual: usize },

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("mismatched TLV type: expected 0x{expected:04x}, found 0x{found:04x}")]
    TlvTypeMismatch { expected: u16, found: u16 },

    #[error("mismatched TLV length: declared {declared}, decoded {decoded}")]
    TlvLengthMismatch { declared: usize, decoded: usize },

    #[error("TLV too large: {size} bytes (max {max})")]
    TlvTooLarge { size: usize, max: usize },

    #[error("invalid message class")]
    InvalidMessageClass,

    #[error("TLV requires {required} bytes, available space is {available}")]
    InsufficientSpace { required: usize, available: usize },

    #[error("key-value payload ends after a key with no value (offset {offset})")]
    DanglingKey { offset: usize },
}
