//! Message encoding and decoding: a common header followed by a run of
//! TLVs in one contiguous buffer.

use acp_buffer::{BufferView, BufferWritableView};

use crate::error::ProtocolError;
use crate::header::{HeaderDecoder, HeaderEncoder, MessageClass};
use crate::tlv::{Tlv, TlvType};
use crate::{COMMON_HEADER_LEN, TLV_HEADER_LEN};

const TLV_TYPE_OFFSET: usize = 0;
const TLV_LENGTH_OFFSET: usize = 2;

/// Encodes one message into a writable view.
///
/// Construction writes the header defaults and places the write cursor
/// right after the common header. TLVs are appended with [`add`]
/// (chainable); [`end`] finalizes the total length once the last TLV is
/// in. The order is a usage convention, not enforced by the type.
///
/// [`add`]: MessageEncoder::add
/// [`end`]: MessageEncoder::end
pub struct MessageEncoder<'a> {
    buffer: BufferWritableView<'a>,
    header: HeaderEncoder<'a>,
    cursor: usize,
}

impl<'a> MessageEncoder<'a> {
    pub fn new(buffer: BufferWritableView<'a>) -> Result<Self, ProtocolError> {
        let header = HeaderEncoder::new(buffer.clone())?;
        Ok(Self {
            buffer,
            header,
            cursor: COMMON_HEADER_LEN,
        })
    }

    /// Access to the header encoder, for setting the addressing fields.
    pub fn header(&mut self) -> &mut HeaderEncoder<'a> {
        &mut self.header
    }

    /// Appends a TLV at the current cursor.
    ///
    /// The record encodes its payload into the free space after a
    /// reserved 4-byte TLV header, which is then backfilled with the type
    /// tag and the total TLV length.
    pub fn add(&mut self, tlv: &Tlv) -> Result<&mut Self, ProtocolError> {
        let record = self.buffer.sub_from(self.cursor)?;
        let value = record.sub_from(TLV_HEADER_LEN)?;

        let written = tlv.encode(&value)?;
        let total = TLV_HEADER_LEN + written;
        if total > usize::from(u16::MAX) {
            return Err(ProtocolError::TlvTooLarge {
                size: total,
                max: usize::from(u16::MAX),
            });
        }

        record.set_u16_at(TLV_TYPE_OFFSET, tlv.type_tag().raw())?;
        record.set_u16_at(TLV_LENGTH_OFFSET, total as u16)?;

        self.cursor += total;
        Ok(self)
    }

    /// Finalizes the message by writing the accumulated length into the
    /// header. Call exactly once, after the last [`add`](Self::add).
    pub fn end(&mut self) {
        self.header.total_length_bytes(self.cursor);
    }

    /// Returns the encoded message bytes `[0, cursor)`.
    pub fn data(&self) -> Result<BufferWritableView<'a>, ProtocolError> {
        Ok(self.buffer.sub(0, self.cursor)?)
    }
}

/// Decodes one message from a view.
///
/// The header is validated and parsed eagerly; TLVs are then yielded one
/// at a time, with the caller naming the type it expects next (usually
/// after peeking with [`next_tlv_type`](Self::next_tlv_type)).
pub struct MessageDecoder<'a> {
    buffer: BufferView<'a>,
    header: HeaderDecoder<'a>,
    cursor: usize,
}

impl<'a> MessageDecoder<'a> {
    pub fn new(buffer: BufferView<'a>) -> Result<Self, ProtocolError> {
        let header = HeaderDecoder::new(buffer.clone())?;
        Ok(Self {
            buffer,
            header,
            cursor: COMMON_HEADER_LEN,
        })
    }

    /// Access to the decoded header fields.
    pub fn header(&self) -> &HeaderDecoder<'a> {
        &self.header
    }

    pub fn is_request(&self) -> bool {
        self.header.message_class().is_request()
    }

    pub fn is_success(&self) -> bool {
        self.header.message_class() == MessageClass::ResponseSuccess
    }

    pub fn is_failure(&self) -> bool {
        self.header.message_class() == MessageClass::ResponseFailure
    }

    /// Decodes the next TLV into `tlv`.
    ///
    /// Fails with [`ProtocolError::TlvTypeMismatch`] when the tag on the
    /// wire differs from `tlv.type_tag()`; in that case the supplied
    /// record is left untouched. Fails with
    /// [`ProtocolError::TlvLengthMismatch`] when the record consumes a
    /// different byte count than the wire declared.
    pub fn get(&mut self, tlv: &mut Tlv) -> Result<&mut Self, ProtocolError> {
        let record = self.buffer.sub(self.cursor, TLV_HEADER_LEN)?;
        let found = record.u16_at(TLV_TYPE_OFFSET);
        let declared = usize::from(record.u16_at(TLV_LENGTH_OFFSET));

        let expected = tlv.type_tag().raw();
        if found != expected {
            return Err(ProtocolError::TlvTypeMismatch { expected, found });
        }

        let payload_len = declared
            .checked_sub(TLV_HEADER_LEN)
            .ok_or(ProtocolError::TooShort {
                required: TLV_HEADER_LEN,
                actual: declared,
            })?;
        let payload = self.buffer.sub(self.cursor + TLV_HEADER_LEN, payload_len)?;

        let consumed = TLV_HEADER_LEN + tlv.decode(&payload)?;
        if consumed != declared {
            return Err(ProtocolError::TlvLengthMismatch {
                declared,
                decoded: consumed,
            });
        }

        self.cursor += declared;
        Ok(self)
    }

    /// Peeks the type of the next TLV without consuming it.
    ///
    /// Returns [`TlvType::NONE`] when fewer than 4 bytes remain, when the
    /// declared length could not even hold a TLV header, or when the
    /// declared TLV would overrun the buffer. Truncation means "no more
    /// TLVs", never an error.
    pub fn next_tlv_type(&self) -> TlvType {
        let record = match self.buffer.sub(self.cursor, TLV_HEADER_LEN) {
            Ok(record) => record,
            Err(_) => return TlvType::NONE,
        };
        let declared = usize::from(record.u16_at(TLV_LENGTH_OFFSET));
        if declared < TLV_HEADER_LEN || self.cursor + declared > self.buffer.len() {
            return TlvType::NONE;
        }

        TlvType::from_raw(record.u16_at(TLV_TYPE_OFFSET))
    }
}
