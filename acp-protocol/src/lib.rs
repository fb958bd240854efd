//! # acp-protocol
//!
//! Wire protocol implementation for ACP (Agent Control Protocol), the
//! request/response protocol spoken between a network-element agent and
//! its controller.
//!
//! This crate provides:
//! - The common message header codec (preamble + addressing fields)
//! - The TLV catalog with per-type encode/decode
//! - Message encoding/decoding over [`acp_buffer`] views
//! - Protocol constants and error types
//!
//! The codec performs no I/O: it transforms bytes already held in a
//! buffer view. Framing over a byte stream lives in `acp-io`.

pub mod error;
pub mod header;
pub mod message;
pub mod tlv;

pub use error::ProtocolError;
pub use header::{EntityClass, HeaderDecoder, HeaderEncoder, MessageClass};
pub use message::{MessageDecoder, MessageEncoder};
pub use tlv::{BinaryData, Tlv, TlvType};

use acp_buffer::{BufferWritableView, PacketBuffer};

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: u8 = 2;

/// Default TCP port for agent/controller connections.
pub const DEFAULT_PORT: u16 = 2210;

/// Size in bytes of the preamble at the start of every message.
pub const PREAMBLE_LEN: usize = 8;

/// Size in bytes of the common header (preamble included).
pub const COMMON_HEADER_LEN: usize = 28;

/// Size in bytes of a TLV header (type + length).
pub const TLV_HEADER_LEN: usize = 4;

/// Standard capacity of a message buffer.
///
/// A single encoded message can never exceed this: slightly less than the
/// 64 KiB framing ceiling, to play nice with memory allocators.
pub const MESSAGE_BUFFER_SIZE: usize = 65500;

/// Allocates a fresh buffer suitable for holding one whole message.
///
/// The backing allocation is reference-counted and freed when the last
/// view derived from the returned one is dropped.
pub fn message_buffer() -> BufferWritableView<'static> {
    BufferWritableView::from_shared(PacketBuffer::with_capacity(MESSAGE_BUFFER_SIZE))
}
