//! # acp
//!
//! Agent Control Protocol: the binary request/response protocol spoken
//! between an agent running on a network element and its controller.
//!
//! This is the umbrella crate; the pieces live in their own crates and
//! are re-exported here:
//! - [`buffer`]: zero-copy, bounds-checked views over shared byte buffers
//! - [`protocol`]: the common header and TLV codec
//! - [`io`]: framed message transport over blocking TCP
//!
//! ## Encoding a message
//!
//! ```
//! use acp::protocol::{
//!     message_buffer, BinaryData, EntityClass, MessageClass, MessageDecoder,
//!     MessageEncoder, Tlv,
//! };
//!
//! let buffer = message_buffer();
//! let mut encoder = MessageEncoder::new(buffer).unwrap();
//! encoder
//!     .header()
//!     .message_class(MessageClass::RequestGet)
//!     .unwrap()
//!     .entity_class(EntityClass::ECHO);
//! encoder
//!     .add(&Tlv::BinaryData(BinaryData::from_text("ping")))
//!     .unwrap();
//! encoder.end();
//!
//! let message = encoder.data().unwrap();
//! assert_eq!(message.len(), 37);
//!
//! let decoder = MessageDecoder::new(message.as_view()).unwrap();
//! assert!(decoder.is_request());
//! ```

pub use acp_buffer as buffer;
pub use acp_io as io;
pub use acp_protocol as protocol;
