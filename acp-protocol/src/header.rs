//! Common message header codec.
//!
//! Every message starts with a fixed 28-byte common header:
//!
//! ```text
//! +---------+---------+---------+------------+
//! | version | flags   | ts_rc   | length     |
//! | 1 byte  | 1 byte  | 2 bytes | 4 bytes    |
//! +---------+---------+---------+------------+
//! | element_id                               |
//! | 8 bytes                                  |
//! +---------------------+--------------------+
//! | sequence            | transaction_id     |
//! | 4 bytes             | 4 bytes            |
//! +---------------------+--------------------+
//! | reserved (4 bytes, zero)                 |
//! +------------------------------------------+
//! ```
//!
//! `flags` bit 7 distinguishes requests (0) from responses (1). `ts_rc`
//! packs the entity class into bits 0-13; bits 14-15 carry the request
//! operation (SET/ADD/DEL/GET) or, for responses, bit 15 carries the
//! SUCCESS/FAILURE result with bit 14 reserved. `length` is the whole
//! message size in bytes, header included.

use acp_buffer::{BufferView, BufferWritableView};
use std::fmt;

use crate::error::ProtocolError;
use crate::{COMMON_HEADER_LEN, PROTOCOL_VERSION};

/// Offset of the version byte within the preamble.
pub const VERSION_OFFSET: usize = 0;
/// Offset of the flags byte within the preamble.
pub const FLAGS_OFFSET: usize = 1;
/// Offset of the ts_rc field within the preamble.
pub const TSRC_OFFSET: usize = 2;
/// Offset of the total-length field within the preamble.
pub const LENGTH_OFFSET: usize = 4;

const ELEMENT_ID_OFFSET: usize = 8;
const SEQUENCE_OFFSET: usize = 16;
const TRANSACTION_ID_OFFSET: usize = 20;

/// Response bit in the flags byte.
const FLAG_RESPONSE: u8 = 1 << 7;
/// Entity class occupies the low 14 bits of ts_rc.
const ENTITY_MASK: u16 = 0x3FFF;
/// Request operation / response result lives in ts_rc bits 14-15.
const OP_SHIFT: u16 = 14;

/// Whether a message is a request (with its operation sub-kind) or a
/// response (with its result).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageClass {
    Invalid,
    RequestSet,
    RequestAdd,
    RequestDel,
    RequestGet,
    ResponseSuccess,
    ResponseFailure,
}

impl MessageClass {
    /// Returns true for the four request kinds.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            MessageClass::RequestSet
                | MessageClass::RequestAdd
                | MessageClass::RequestDel
                | MessageClass::RequestGet
        )
    }
}

/// The logical entity (service) a message is about, encoded in the low
/// 14 bits of ts_rc.
///
/// The catalog below names the services this implementation knows about;
/// any 14-bit value is representable on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityClass(u16);

impl EntityClass {
    /// Periodic liveness announcements toward the controller.
    pub const HELLO: EntityClass = EntityClass(0x0000);
    /// Element capability reporting.
    pub const CAPABILITIES: EntityClass = EntityClass(0x0001);
    /// Simple echo service.
    pub const ECHO: EntityClass = EntityClass(0x00FF);

    /// Creates an entity class from a raw value, keeping the low 14 bits.
    pub const fn new(raw: u16) -> Self {
        Self(raw & ENTITY_MASK)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Decodes the common header from the start of a message view.
///
/// Construction validates the view eagerly: it must hold at least the
/// 28 header bytes and carry the supported protocol version. All field
/// accessors after that are infallible.
pub struct HeaderDecoder<'a> {
    view: BufferView<'a>,
}

impl<'a> HeaderDecoder<'a> {
    pub fn new(view: BufferView<'a>) -> Result<Self, ProtocolError> {
        if view.len() < COMMON_HEADER_LEN {
            return Err(ProtocolError::TooShort {
                required: COMMON_HEADER_LEN,
                actual: view.len(),
            });
        }
        let decoder = Self { view };
        let version = decoder.version();
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        Ok(decoder)
    }

    fn version(&self) -> u8 {
        self.view.u8_at(VERSION_OFFSET)
    }

    fn flags(&self) -> u8 {
        self.view.u8_at(FLAGS_OFFSET)
    }

    /// Raw ts_rc field (entity class + operation/result bits).
    pub fn ts_rc(&self) -> u16 {
        self.view.u16_at(TSRC_OFFSET)
    }

    /// Whole message length in bytes, header included.
    pub fn total_length_bytes(&self) -> usize {
        self.view.u32_at(LENGTH_OFFSET) as usize
    }

    pub fn element_id(&self) -> u64 {
        self.view.u64_at(ELEMENT_ID_OFFSET)
    }

    pub fn sequence(&self) -> u32 {
        self.view.u32_at(SEQUENCE_OFFSET)
    }

    pub fn transaction_id(&self) -> u32 {
        self.view.u32_at(TRANSACTION_ID_OFFSET)
    }

    /// Message class derived from the flags and ts_rc bit-fields.
    pub fn message_class(&self) -> MessageClass {
        if self.flags() & FLAG_RESPONSE == 0 {
            match (self.ts_rc() >> OP_SHIFT) & 0x3 {
                0 => MessageClass::RequestSet,
                1 => MessageClass::RequestAdd,
                2 => MessageClass::RequestDel,
                _ => MessageClass::RequestGet,
            }
        } else if self.ts_rc() >> 15 == 0 {
            MessageClass::ResponseSuccess
        } else {
            MessageClass::ResponseFailure
        }
    }

    /// Entity class from the low 14 bits of ts_rc.
    pub fn entity_class(&self) -> EntityClass {
        EntityClass::new(self.ts_rc())
    }

    /// Returns the payload view after the common header, sized to the
    /// declared total length.
    pub fn data(&self) -> Result<BufferView<'a>, ProtocolError> {
        let total = self.total_length_bytes();
        let payload = total
            .checked_sub(COMMON_HEADER_LEN)
            .ok_or(ProtocolError::TooShort {
                required: COMMON_HEADER_LEN,
                actual: total,
            })?;
        Ok(self.view.sub(COMMON_HEADER_LEN, payload)?)
    }
}

/// Encodes the common header into the start of a message view.
///
/// Construction writes the defaults (version, everything else zero);
/// setters then patch individual fields in place, preserving the bits
/// they do not own. The total length is written last, once the caller
/// knows the final message size.
pub struct HeaderEncoder<'a> {
    view: BufferWritableView<'a>,
}

impl<'a> HeaderEncoder<'a> {
    pub fn new(view: BufferWritableView<'a>) -> Result<Self, ProtocolError> {
        if view.len() < COMMON_HEADER_LEN {
            return Err(ProtocolError::TooShort {
                required: COMMON_HEADER_LEN,
                actual: view.len(),
            });
        }
        let encoder = Self { view };
        encoder.write_defaults();
        Ok(encoder)
    }

    fn write_defaults(&self) {
        self.view.put_slice_at(0, &[0u8; COMMON_HEADER_LEN]);
        self.view.put_u8_at(VERSION_OFFSET, PROTOCOL_VERSION);
    }

    /// Encodes the request/response bit and the operation/result bits,
    /// leaving the entity class untouched.
    pub fn message_class(&mut self, class: MessageClass) -> Result<&mut Self, ProtocolError> {
        let (is_request, high_bits) = match class {
            MessageClass::Invalid => return Err(ProtocolError::InvalidMessageClass),
            MessageClass::RequestSet => (true, 0),
            MessageClass::RequestAdd => (true, 1),
            MessageClass::RequestDel => (true, 2),
            MessageClass::RequestGet => (true, 3),
            MessageClass::ResponseSuccess => (false, 0),
            MessageClass::ResponseFailure => (false, 2),
        };

        let flags = self.view.u8_at(FLAGS_OFFSET) & !FLAG_RESPONSE;
        self.view.put_u8_at(
            FLAGS_OFFSET,
            if is_request {
                flags
            } else {
                flags | FLAG_RESPONSE
            },
        );

        let entity_bits = self.view.u16_at(TSRC_OFFSET) & ENTITY_MASK;
        self.view
            .put_u16_at(TSRC_OFFSET, entity_bits | (high_bits << OP_SHIFT));

        Ok(self)
    }

    /// Encodes the entity class into the low 14 bits of ts_rc, leaving
    /// the operation bits untouched.
    pub fn entity_class(&mut self, class: EntityClass) -> &mut Self {
        let op_bits = self.view.u16_at(TSRC_OFFSET) & !ENTITY_MASK;
        self.view.put_u16_at(TSRC_OFFSET, op_bits | class.raw());
        self
    }

    pub fn element_id(&mut self, value: u64) -> &mut Self {
        self.view.put_u64_at(ELEMENT_ID_OFFSET, value);
        self
    }

    pub fn sequence(&mut self, value: u32) -> &mut Self {
        self.view.put_u32_at(SEQUENCE_OFFSET, value);
        self
    }

    pub fn transaction_id(&mut self, value: u32) -> &mut Self {
        self.view.put_u32_at(TRANSACTION_ID_OFFSET, value);
        self
    }

    /// Writes the whole-message length field. Called once by
    /// [`MessageEncoder::end`](crate::MessageEncoder::end) after the last
    /// TLV has been appended.
    pub fn total_length_bytes(&mut self, value: usize) -> &mut Self {
        self.view.put_u32_at(LENGTH_OFFSET, value as u32);
        self
    }
}
