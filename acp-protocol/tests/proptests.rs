//! Property tests: encode/decode round-trips over arbitrary field values.

use acp_protocol::{
    message_buffer, BinaryData, EntityClass, HeaderDecoder, HeaderEncoder, MessageClass,
    MessageDecoder, MessageEncoder, Tlv, COMMON_HEADER_LEN,
};
use proptest::prelude::*;

fn message_class_strategy() -> impl Strategy<Value = MessageClass> {
    prop_oneof![
        Just(MessageClass::RequestSet),
        Just(MessageClass::RequestAdd),
        Just(MessageClass::RequestDel),
        Just(MessageClass::RequestGet),
        Just(MessageClass::ResponseSuccess),
        Just(MessageClass::ResponseFailure),
    ]
}

proptest! {
    #[test]
    fn header_roundtrip(
        class in message_class_strategy(),
        entity in 0u16..0x4000,
        element_id in any::<u64>(),
        sequence in any::<u32>(),
        transaction_id in any::<u32>(),
    ) {
        let buffer = message_buffer();
        let mut encoder = HeaderEncoder::new(buffer.clone()).unwrap();
        encoder
            .message_class(class)
            .unwrap()
            .entity_class(EntityClass::new(entity))
            .element_id(element_id)
            .sequence(sequence)
            .transaction_id(transaction_id)
            .total_length_bytes(COMMON_HEADER_LEN);

        let decoder = HeaderDecoder::new(buffer.as_view()).unwrap();
        prop_assert_eq!(decoder.message_class(), class);
        prop_assert_eq!(decoder.entity_class().raw(), entity);
        prop_assert_eq!(decoder.element_id(), element_id);
        prop_assert_eq!(decoder.sequence(), sequence);
        prop_assert_eq!(decoder.transaction_id(), transaction_id);
    }

    #[test]
    fn key_value_pairs_roundtrip(
        pairs in proptest::collection::vec(
            ("[a-zA-Z0-9_-]{0,12}", "[a-zA-Z0-9 .:/-]{0,24}"),
            0..8,
        )
    ) {
        let buffer = message_buffer();
        let tlv = Tlv::KeyValueStringPairs(pairs);
        let written = tlv.encode(&buffer).unwrap();

        let mut decoded = Tlv::KeyValueStringPairs(Vec::new());
        let consumed = decoded
            .decode(&buffer.sub(0, written).unwrap().as_view())
            .unwrap();
        prop_assert_eq!(consumed, written);
        prop_assert_eq!(decoded, tlv);
    }

    #[test]
    fn ue_report_message_roundtrip(
        imsi in any::<u64>(),
        tmsi in any::<u32>(),
        rnti in any::<u16>(),
        status in any::<u8>(),
        pci in any::<u16>(),
    ) {
        let tlv = Tlv::UeReport { imsi, tmsi, rnti, status, pci };

        let buffer = message_buffer();
        let mut encoder = MessageEncoder::new(buffer).unwrap();
        encoder
            .header()
            .message_class(MessageClass::ResponseSuccess)
            .unwrap();
        encoder.add(&tlv).unwrap();
        encoder.end();

        let mut decoder = MessageDecoder::new(encoder.data().unwrap().as_view()).unwrap();
        let mut decoded = Tlv::UeReport { imsi: 0, tmsi: 0, rnti: 0, status: 0, pci: 0 };
        decoder.get(&mut decoded).unwrap();
        prop_assert_eq!(decoded, tlv);
    }

    #[test]
    fn binary_data_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let buffer = message_buffer();
        let tlv = Tlv::BinaryData(BinaryData::from_bytes(bytes));
        let written = tlv.encode(&buffer).unwrap();

        let mut decoded = Tlv::BinaryData(BinaryData::new());
        let consumed = decoded
            .decode(&buffer.sub(0, written).unwrap().as_view())
            .unwrap();
        prop_assert_eq!(consumed, written);
        prop_assert_eq!(decoded, tlv);
    }
}
