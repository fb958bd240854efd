//! # acp-buffer
//!
//! Zero-copy buffer views for the ACP wire codec.
//!
//! This crate provides:
//! - [`PacketBuffer`]: a fixed-capacity, reference-counted byte buffer
//!   allocated once per message
//! - [`BufferView`]: a read-only window over a shared or borrowed buffer,
//!   with bounds-checked network-order accessors
//! - [`BufferWritableView`]: the writable counterpart, usable anywhere a
//!   [`BufferView`] is expected
//!
//! Views never copy the underlying bytes: sub-views share the same backing
//! buffer, which lives until the last view referring to it is dropped. The
//! whole crate is single-threaded by construction (`Rc` + `Cell`), matching
//! the one-connection-per-thread model of the transport layer.

pub mod addr;
pub mod error;
pub mod packet;
pub mod view;

pub use addr::MacAddr;
pub use error::BufferError;
pub use packet::PacketBuffer;
pub use view::{BufferView, BufferWritableView};
