//! Demonstration agent: connects to a controller and issues echo
//! requests, printing whatever comes back.

use acp_io::{Connection, ConnectionConfig, IoError};
use acp_protocol::{
    message_buffer, BinaryData, EntityClass, MessageClass, MessageDecoder, MessageEncoder, Tlv,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ConnectionConfig::from_env();
    tracing::info!(port = config.port, "starting echo agent");
    let mut connection = Connection::new(config);

    let mut sequence = 0u32;
    loop {
        if connection.is_closed() {
            if !connection.connect()? {
                tracing::info!("controller not reachable, retrying");
                connection.sleep();
                continue;
            }
        }

        match exchange(&mut connection, sequence) {
            Ok(Some(reply)) => tracing::info!(reply = %reply, "echo reply"),
            Ok(None) => {
                tracing::info!("connection closed by peer");
                connection.close();
            }
            Err(e) => {
                tracing::warn!(error = %e, "exchange failed");
                connection.close();
            }
        }

        sequence = sequence.wrapping_add(1);
        connection.sleep();
    }
}

/// Sends one echo request and waits for the reply. Returns the echoed
/// text, or `None` when the peer went away.
fn exchange(connection: &mut Connection, sequence: u32) -> Result<Option<String>, IoError> {
    let buffer = message_buffer();
    let mut encoder = MessageEncoder::new(buffer.clone())?;
    encoder
        .header()
        .message_class(MessageClass::RequestGet)?
        .entity_class(EntityClass::ECHO)
        .sequence(sequence);
    encoder.add(&Tlv::BinaryData(BinaryData::from_text(
        "Is there anybody out there?",
    )))?;
    encoder.end();

    connection.write_message(&encoder.data()?.as_view())?;

    let reply = connection.read_message(&buffer)?;
    if reply.is_empty() {
        return Ok(None);
    }

    let mut decoder = MessageDecoder::new(reply)?;
    if decoder.is_success() && decoder.header().entity_class() == EntityClass::ECHO {
        let mut tlv = Tlv::BinaryData(BinaryData::new());
        decoder.get(&mut tlv)?;
        if let Tlv::BinaryData(data) = tlv {
            return Ok(Some(data.as_text()?));
        }
    } else if decoder.is_failure() {
        let mut tlv = Tlv::Error {
            code: 0,
            message: String::new(),
        };
        decoder.get(&mut tlv)?;
        if let Tlv::Error { code, message } = tlv {
            tracing::warn!(code, message = %message, "controller reported an error");
        }
    }
    Ok(Some(String::new()))
}
