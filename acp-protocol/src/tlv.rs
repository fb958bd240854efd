//! The TLV catalog.
//!
//! Every record travels as a Type-Length-Value triple: a 16-bit type tag,
//! a 16-bit total length (TLV header included, any byte alignment), and
//! the payload. The catalog is a fixed enumeration extended by hand, so
//! TLVs are a closed sum type dispatched with `match` rather than an open
//! trait hierarchy.
//!
//! A [`Tlv`] value encodes its payload at offset 0 of the view it is
//! handed (the message encoder reserves the 4-byte TLV header separately)
//! and decodes from the payload view the message decoder carves out for
//! it. Decoding must consume exactly the byte count declared on the wire;
//! the message decoder enforces that.

use acp_buffer::{BufferView, BufferWritableView};
use std::fmt;

use crate::error::ProtocolError;

/// A TLV type tag as carried on the wire.
///
/// Known tags are named below; unknown 16-bit values remain representable
/// so a decoder can report a foreign tag instead of erasing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TlvType(u16);

impl TlvType {
    /// Sentinel: no TLV (also "no more TLVs in this message").
    pub const NONE: TlvType = TlvType(0x0);
    pub const ERROR: TlvType = TlvType(0x1);
    pub const KEY_VALUE_STRING_PAIRS: TlvType = TlvType(0x2);
    pub const LIST_OF_TLV: TlvType = TlvType(0x3);
    pub const BINARY_DATA: TlvType = TlvType(0x4);
    pub const PERIODICITY: TlvType = TlvType(0x5);
    pub const CELL: TlvType = TlvType(0x6);
    pub const UE_REPORT: TlvType = TlvType(0x7);
    pub const UE_MEASUREMENT_CONFIG: TlvType = TlvType(0x8);
    pub const UE_MEASUREMENT_REPORT: TlvType = TlvType(0x9);
    pub const MAC_PRB_UTILIZATION_REPORT: TlvType = TlvType(0xA);
    pub const UE_MEASUREMENT_ID: TlvType = TlvType(0xB);

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for TlvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Opaque binary payload owned by a [`Tlv::BinaryData`] record.
///
/// Decoding copies the wire bytes into a fresh allocation, so the record
/// stays valid after the message buffer it was decoded from is gone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryData {
    bytes: Vec<u8>,
}

impl BinaryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Convenience constructor storing `text` as a NUL-terminated string.
    pub fn from_text(text: &str) -> Self {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        Self { bytes }
    }

    /// Convenience accessor reading the payload back as a NUL-terminated
    /// string.
    pub fn as_text(&self) -> Result<String, ProtocolError> {
        Ok(BufferView::from_slice(&self.bytes).get_cstring_at(0)?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A single TLV record with its decoded fields.
///
/// Fixed-layout variants pack their fields big-endian at fixed offsets;
/// the byte counts in the per-variant notes are the payload sizes (the
/// 4-byte TLV header comes on top on the wire).
#[derive(Debug, Clone, PartialEq)]
pub enum Tlv {
    /// An error report: 16-bit code plus NUL-terminated free text.
    /// The meaning of the code depends entirely on the context the TLV
    /// appears in.
    Error { code: u16, message: String },

    /// Opaque bytes, copied verbatim.
    BinaryData(BinaryData),

    /// Ordered key-value string pairs, each string NUL-terminated.
    KeyValueStringPairs(Vec<(String, String)>),

    /// Marker announcing `count` TLVs of `element_type`; the referenced
    /// TLVs travel as siblings, not nested inside this record. 4 bytes.
    List { element_type: TlvType, count: u16 },

    /// A periodicity in milliseconds. 4 bytes.
    PeriodicityMs(u32),

    /// Cell configuration. 11 bytes: pci@0, dl_earfcn@2, ul_earfcn@6,
    /// n_prb@10.
    Cell {
        pci: u16,
        dl_earfcn: u32,
        ul_earfcn: u32,
        n_prb: u8,
    },

    /// Per-UE status report. 17 bytes: imsi@0, tmsi@8, rnti@12,
    /// status@14, pci@15.
    UeReport {
        imsi: u64,
        tmsi: u32,
        rnti: u16,
        status: u8,
        pci: u16,
    },

    /// UE measurement configuration. 5 bytes: rnti@0, meas_id@2,
    /// interval@3, amount@4.
    UeMeasurementConfig {
        rnti: u16,
        meas_id: u8,
        interval: u8,
        amount: u8,
    },

    /// UE measurement identifier. 3 bytes: rnti@0, meas_id@2.
    UeMeasurementId { rnti: u16, meas_id: u8 },

    /// UE measurement report. 5 bytes: rnti@0, meas_id@2, rsrp@3,
    /// rsrq@4.
    UeMeasurementReport {
        rnti: u16,
        meas_id: u8,
        rsrp: u8,
        rsrq: u8,
    },

    /// MAC PRB utilization report. 12 bytes: n_prb@0,
    /// dl_prb_counters@2, ul_prb_counters@6, pci@10.
    MacPrbReport {
        n_prb: u16,
        dl_prb_counters: u32,
        ul_prb_counters: u32,
        pci: u16,
    },
}

impl Tlv {
    /// The wire tag for this record's type.
    pub fn type_tag(&self) -> TlvType {
        match self {
            Tlv::Error { .. } => TlvType::ERROR,
            Tlv::BinaryData(_) => TlvType::BINARY_DATA,
            Tlv::KeyValueStringPairs(_) => TlvType::KEY_VALUE_STRING_PAIRS,
            Tlv::List { .. } => TlvType::LIST_OF_TLV,
            Tlv::PeriodicityMs(_) => TlvType::PERIODICITY,
            Tlv::Cell { .. } => TlvType::CELL,
            Tlv::UeReport { .. } => TlvType::UE_REPORT,
            Tlv::UeMeasurementConfig { .. } => TlvType::UE_MEASUREMENT_CONFIG,
            Tlv::UeMeasurementId { .. } => TlvType::UE_MEASUREMENT_ID,
            Tlv::UeMeasurementReport { .. } => TlvType::UE_MEASUREMENT_REPORT,
            Tlv::MacPrbReport { .. } => TlvType::MAC_PRB_UTILIZATION_REPORT,
        }
    }

    /// Encodes the payload at offset 0 of `dest` and returns the number
    /// of bytes written.
    ///
    /// Variable-length variants validate the required space up front, so
    /// either nothing is written or the whole payload is.
    pub fn encode(&self, dest: &BufferWritableView<'_>) -> Result<usize, ProtocolError> {
        match self {
            Tlv::Error { code, message } => {
                dest.set_u16_at(0, *code)?;
                dest.set_cstring_at(2, message)?;
                Ok(2 + message.len() + 1)
            }

            Tlv::BinaryData(data) => {
                dest.set_slice_at(0, data.bytes())?;
                Ok(data.len())
            }

            Tlv::KeyValueStringPairs(pairs) => {
                let required: usize = pairs
                    .iter()
                    .map(|(key, value)| key.len() + 1 + value.len() + 1)
                    .sum();
                if required > dest.len() {
                    return Err(ProtocolError::InsufficientSpace {
                        required,
                        available: dest.len(),
                    });
                }
                let mut offset = 0;
                for (key, value) in pairs {
                    dest.set_cstring_at(offset, key)?;
                    offset += key.len() + 1;
                    dest.set_cstring_at(offset, value)?;
                    offset += value.len() + 1;
                }
                Ok(required)
            }

            Tlv::List {
                element_type,
                count,
            } => {
                dest.set_u16_at(0, element_type.raw())?;
                dest.set_u16_at(2, *count)?;
                Ok(4)
            }

            Tlv::PeriodicityMs(milliseconds) => {
                dest.set_u32_at(0, *milliseconds)?;
                Ok(4)
            }

            Tlv::Cell {
                pci,
                dl_earfcn,
                ul_earfcn,
                n_prb,
            } => {
                dest.set_u16_at(0, *pci)?;
                dest.set_u32_at(2, *dl_earfcn)?;
                dest.set_u32_at(6, *ul_earfcn)?;
                dest.set_u8_at(10, *n_prb)?;
                Ok(11)
            }

            Tlv::UeReport {
                imsi,
                tmsi,
                rnti,
                status,
                pci,
            } => {
                dest.set_u64_at(0, *imsi)?;
                dest.set_u32_at(8, *tmsi)?;
                dest.set_u16_at(12, *rnti)?;
                dest.set_u8_at(14, *status)?;
                dest.set_u16_at(15, *pci)?;
                Ok(17)
            }

            Tlv::UeMeasurementConfig {
                rnti,
                meas_id,
                interval,
                amount,
            } => {
                dest.set_u16_at(0, *rnti)?;
                dest.set_u8_at(2, *meas_id)?;
                dest.set_u8_at(3, *interval)?;
                dest.set_u8_at(4, *amount)?;
                Ok(5)
            }

            Tlv::UeMeasurementId { rnti, meas_id } => {
                dest.set_u16_at(0, *rnti)?;
                dest.set_u8_at(2, *meas_id)?;
                Ok(3)
            }

            Tlv::UeMeasurementReport {
                rnti,
                meas_id,
                rsrp,
                rsrq,
            } => {
                dest.set_u16_at(0, *rnti)?;
                dest.set_u8_at(2, *meas_id)?;
                dest.set_u8_at(3, *rsrp)?;
                dest.set_u8_at(4, *rsrq)?;
                Ok(5)
            }

            Tlv::MacPrbReport {
                n_prb,
                dl_prb_counters,
                ul_prb_counters,
                pci,
            } => {
                dest.set_u16_at(0, *n_prb)?;
                dest.set_u32_at(2, *dl_prb_counters)?;
                dest.set_u32_at(6, *ul_prb_counters)?;
                dest.set_u16_at(10, *pci)?;
                Ok(12)
            }
        }
    }

    /// Decodes the payload in `src` into this record's fields and
    /// returns the number of bytes consumed.
    pub fn decode(&mut self, src: &BufferView<'_>) -> Result<usize, ProtocolError> {
        match self {
            Tlv::Error { code, message } => {
                *code = src.get_u16_at(0)?;
                *message = src.get_cstring_at(2)?;
                Ok(2 + message.len() + 1)
            }

            Tlv::BinaryData(data) => {
                *data = BinaryData::from_bytes(src.to_vec());
                Ok(data.len())
            }

            Tlv::KeyValueStringPairs(pairs) => {
                pairs.clear();
                let mut offset = 0;
                while offset < src.len() {
                    let key = src.get_cstring_at(offset)?;
                    offset += key.len() + 1;
                    if offset == src.len() {
                        return Err(ProtocolError::DanglingKey { offset });
                    }
                    let value = src.get_cstring_at(offset)?;
                    offset += value.len() + 1;
                    pairs.push((key, value));
                }
                Ok(offset)
            }

            Tlv::List {
                element_type,
                count,
            } => {
                *element_type = TlvType::from_raw(src.get_u16_at(0)?);
                *count = src.get_u16_at(2)?;
                Ok(4)
            }

            Tlv::PeriodicityMs(milliseconds) => {
                *milliseconds = src.get_u32_at(0)?;
                Ok(4)
            }

            Tlv::Cell {
                pci,
                dl_earfcn,
                ul_earfcn,
                n_prb,
            } => {
                *pci = src.get_u16_at(0)?;
                *dl_earfcn = src.get_u32_at(2)?;
                *ul_earfcn = src.get_u32_at(6)?;
                *n_prb = src.get_u8_at(10)?;
                Ok(11)
            }

            Tlv::UeReport {
                imsi,
                tmsi,
                rnti,
                status,
                pci,
            } => {
                *imsi = src.get_u64_at(0)?;
                *tmsi = src.get_u32_at(8)?;
                *rnti = src.get_u16_at(12)?;
                *status = src.get_u8_at(14)?;
                *pci = src.get_u16_at(15)?;
                Ok(17)
            }

            Tlv::UeMeasurementConfig {
                rnti,
                meas_id,
                interval,
                amount,
            } => {
                *rnti = src.get_u16_at(0)?;
                *meas_id = src.get_u8_at(2)?;
                *interval = src.get_u8_at(3)?;
                *amount = src.get_u8_at(4)?;
                Ok(5)
            }

            Tlv::UeMeasurementId { rnti, meas_id } => {
                *rnti = src.get_u16_at(0)?;
                *meas_id = src.get_u8_at(2)?;
                Ok(3)
            }

            Tlv::UeMeasurementReport {
                rnti,
                meas_id,
                rsrp,
                rsrq,
            } => {
                *rnti = src.get_u16_at(0)?;
                *meas_id = src.get_u8_at(2)?;
                *rsrp = src.get_u8_at(3)?;
                *rsrq = src.get_u8_at(4)?;
                Ok(5)
            }

            Tlv::MacPrbReport {
                n_prb,
                dl_prb_counters,
                ul_prb_counters,
                pci,
            } => {
                *n_prb = src.get_u16_at(0)?;
                *dl_prb_counters = src.get_u32_at(2)?;
                *ul_prb_counters = src.get_u32_at(6)?;
                *pci = src.get_u16_at(10)?;
                Ok(12)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_buffer;

    /// Encodes `tlv` into a scratch buffer, then decodes it back into a
    /// fresh record of the same variant.
    fn roundtrip(tlv: &Tlv, blank: Tlv) -> Tlv {
        let buffer = message_buffer();
        let written = tlv.encode(&buffer).unwrap();
        let payload = buffer.sub(0, written).unwrap();

        let mut decoded = blank;
        let consumed = decoded.decode(&payload.as_view()).unwrap();
        assert_eq!(consumed, written);
        decoded
    }

    #[test]
    fn test_error_roundtrip() {
        let tlv = Tlv::Error {
            code: 42,
            message: "bad".to_string(),
        };
        let decoded = roundtrip(
            &tlv,
            Tlv::Error {
                code: 0,
                message: String::new(),
            },
        );
        assert_eq!(decoded, tlv);
    }

    #[test]
    fn test_error_payload_size() {
        let tlv = Tlv::Error {
            code: 42,
            message: "bad".to_string(),
        };
        let buffer = message_buffer();
        // u16 code + "bad" + NUL
        assert_eq!(tlv.encode(&buffer).unwrap(), 6);
    }

    #[test]
    fn test_error_empty_message() {
        let tlv = Tlv::Error {
            code: 0xFFFF,
            message: String::new(),
        };
        let decoded = roundtrip(
            &tlv,
            Tlv::Error {
                code: 0,
                message: "x".to_string(),
            },
        );
        assert_eq!(decoded, tlv);
    }

    #[test]
    fn test_error_near_buffer_capacity() {
        // A message string filling most of a message buffer still fits.
        let message = "x".repeat(crate::MESSAGE_BUFFER_SIZE - 3);
        let tlv = Tlv::Error { code: 1, message };
        let buffer = message_buffer();
        let written = tlv.encode(&buffer).unwrap();
        assert_eq!(written, crate::MESSAGE_BUFFER_SIZE);

        let mut decoded = Tlv::Error {
            code: 0,
            message: String::new(),
        };
        let consumed = decoded
            .decode(&buffer.sub(0, written).unwrap().as_view())
            .unwrap();
        assert_eq!(consumed, written);
        assert_eq!(decoded, tlv);
    }

    #[test]
    fn test_binary_data_roundtrip() {
        let tlv = Tlv::BinaryData(BinaryData::from_bytes(vec![0u8, 1, 2, 255]));
        let decoded = roundtrip(&tlv, Tlv::BinaryData(BinaryData::new()));
        assert_eq!(decoded, tlv);
    }

    #[test]
    fn test_binary_data_owns_its_copy() {
        let buffer = message_buffer();
        buffer.put_slice_at(0, b"abc");
        let source = buffer.sub(0, 3).unwrap();

        let mut tlv = Tlv::BinaryData(BinaryData::new());
        tlv.decode(&source.as_view()).unwrap();

        // Scribbling over the source buffer must not affect the record.
        buffer.put_slice_at(0, b"xyz");
        match &tlv {
            Tlv::BinaryData(data) => assert_eq!(data.bytes(), b"abc"),
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn test_binary_data_text() {
        let data = BinaryData::from_text("ping");
        assert_eq!(data.len(), 5);
        assert_eq!(data.as_text().unwrap(), "ping");
    }

    #[test]
    fn test_key_value_roundtrip() {
        let tlv = Tlv::KeyValueStringPairs(vec![
            ("vendor".to_string(), "acme".to_string()),
            ("".to_string(), "".to_string()),
            ("model".to_string(), "mk-2".to_string()),
        ]);
        let decoded = roundtrip(&tlv, Tlv::KeyValueStringPairs(Vec::new()));
        assert_eq!(decoded, tlv);
    }

    #[test]
    fn test_key_value_empty_map() {
        let tlv = Tlv::KeyValueStringPairs(Vec::new());
        let buffer = message_buffer();
        assert_eq!(tlv.encode(&buffer).unwrap(), 0);
    }

    #[test]
    fn test_key_value_insufficient_space_writes_nothing() {
        let mut bytes = [0xEEu8; 8];
        {
            let dest = BufferWritableView::from_mut_slice(&mut bytes);
            let tlv = Tlv::KeyValueStringPairs(vec![(
                "a-long-key".to_string(),
                "a-long-value".to_string(),
            )]);
            assert!(matches!(
                tlv.encode(&dest),
                Err(ProtocolError::InsufficientSpace {
                    required: 24,
                    available: 8
                })
            ));
        }
        // Nothing was written before the failure was detected.
        assert_eq!(bytes, [0xEE; 8]);
    }

    #[test]
    fn test_key_value_dangling_key_is_an_error() {
        // A key with its NUL but no value at all.
        let payload = b"orphan\0";
        let mut tlv = Tlv::KeyValueStringPairs(Vec::new());
        assert!(matches!(
            tlv.decode(&BufferView::from_slice(payload)),
            Err(ProtocolError::DanglingKey { offset: 7 })
        ));
    }

    #[test]
    fn test_key_value_unterminated_value_is_an_error() {
        let payload = b"key\0val";
        let mut tlv = Tlv::KeyValueStringPairs(Vec::new());
        assert!(tlv.decode(&BufferView::from_slice(payload)).is_err());
    }

    #[test]
    fn test_list_roundtrip() {
        let tlv = Tlv::List {
            element_type: TlvType::CELL,
            count: 12,
        };
        let decoded = roundtrip(
            &tlv,
            Tlv::List {
                element_type: TlvType::NONE,
                count: 0,
            },
        );
        assert_eq!(decoded, tlv);
    }

    #[test]
    fn test_periodicity_roundtrip() {
        let tlv = Tlv::PeriodicityMs(5000);
        let decoded = roundtrip(&tlv, Tlv::PeriodicityMs(0));
        assert_eq!(decoded, tlv);
    }

    #[test]
    fn test_cell_roundtrip() {
        let tlv = Tlv::Cell {
            pci: 0x01FF,
            dl_earfcn: 6400,
            ul_earfcn: 24_400,
            n_prb: 100,
        };
        let decoded = roundtrip(
            &tlv,
            Tlv::Cell {
                pci: 0,
                dl_earfcn: 0,
                ul_earfcn: 0,
                n_prb: 0,
            },
        );
        assert_eq!(decoded, tlv);
    }

    #[test]
    fn test_ue_report_roundtrip_boundary_rnti() {
        for rnti in [0x0000u16, 0xFFFF] {
            let tlv = Tlv::UeReport {
                imsi: 222_01_0123456789,
                tmsi: 0xC0FFEE,
                rnti,
                status: 1,
                pci: 0x0102,
            };
            let decoded = roundtrip(
                &tlv,
                Tlv::UeReport {
                    imsi: 0,
                    tmsi: 0,
                    rnti: 0,
                    status: 0,
                    pci: 0,
                },
            );
            assert_eq!(decoded, tlv);
        }
    }

    #[test]
    fn test_measurement_tlvs_roundtrip() {
        let config = Tlv::UeMeasurementConfig {
            rnti: 0x4601,
            meas_id: 3,
            interval: 10,
            amount: 8,
        };
        let id = Tlv::UeMeasurementId {
            rnti: 0x4601,
            meas_id: 3,
        };
        let report = Tlv::UeMeasurementReport {
            rnti: 0x4601,
            meas_id: 3,
            rsrp: 97,
            rsrq: 30,
        };

        assert_eq!(
            roundtrip(
                &config,
                Tlv::UeMeasurementConfig {
                    rnti: 0,
                    meas_id: 0,
                    interval: 0,
                    amount: 0
                }
            ),
            config
        );
        assert_eq!(
            roundtrip(&id, Tlv::UeMeasurementId { rnti: 0, meas_id: 0 }),
            id
        );
        assert_eq!(
            roundtrip(
                &report,
                Tlv::UeMeasurementReport {
                    rnti: 0,
                    meas_id: 0,
                    rsrp: 0,
                    rsrq: 0
                }
            ),
            report
        );
    }

    #[test]
    fn test_mac_prb_report_roundtrip() {
        let tlv = Tlv::MacPrbReport {
            n_prb: 100,
            dl_prb_counters: 1_000_000,
            ul_prb_counters: 500_000,
            pci: 0x0033,
        };
        let decoded = roundtrip(
            &tlv,
            Tlv::MacPrbReport {
                n_prb: 0,
                dl_prb_counters: 0,
                ul_prb_counters: 0,
                pci: 0,
            },
        );
        assert_eq!(decoded, tlv);
    }

    #[test]
    fn test_fixed_layout_offsets() {
        // The wire layout is part of the protocol contract.
        let buffer = message_buffer();
        let tlv = Tlv::Cell {
            pci: 0x0102,
            dl_earfcn: 0x03040506,
            ul_earfcn: 0x0708090A,
            n_prb: 0x0B,
        };
        let written = tlv.encode(&buffer).unwrap();
        assert_eq!(
            buffer.sub(0, written).unwrap().to_vec(),
            vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B]
        );
    }

    #[test]
    fn test_encode_into_too_small_view_fails() {
        let mut bytes = [0u8; 2];
        let dest = BufferWritableView::from_mut_slice(&mut bytes);
        let tlv = Tlv::PeriodicityMs(1);
        assert!(tlv.encode(&dest).is_err());
    }
}
