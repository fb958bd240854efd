//! Demonstration controller: listens for an agent and answers echo
//! requests by sending the payload back, decorated.

use acp_buffer::{BufferView, BufferWritableView};
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
    tracing::info!(port = config.port, "starting echo controller");
    let mut connection = Connection::new(config);
    connection.open_listener()?;

    let read_buffer = message_buffer();
    let write_buffer = message_buffer();

    loop {
        if !connection.is_data_available()? {
            tracing::info!(
                connected = !connection.is_closed(),
                "still waiting for messages"
            );
            continue;
        }

        let message = connection.read_message(&read_buffer)?;
        if message.is_empty() {
            tracing::info!("agent went away, listening again");
            connection.open_listener()?;
            continue;
        }

        if let Err(e) = answer(&mut connection, &message, &write_buffer) {
            tracing::warn!(error = %e, "failed to answer, dropping connection");
            connection.open_listener()?;
        }
    }
}

fn answer(
    connection: &mut Connection,
    message: &BufferView<'_>,
    write_buffer: &BufferWritableView<'static>,
) -> Result<(), IoError> {
    let mut decoder = MessageDecoder::new(message.clone())?;
    if !decoder.is_request() {
        return Ok(());
    }

    let entity = decoder.header().entity_class();
    let sequence = decoder.header().sequence();
    let mut encoder = MessageEncoder::new(write_buffer.clone())?;

    if entity == EntityClass::ECHO {
        let mut tlv = Tlv::BinaryData(BinaryData::new());
        decoder.get(&mut tlv)?;
        let text = match &tlv {
            Tlv::BinaryData(data) => data.as_text()?,
            _ => String::new(),
        };
        tracing::info!(text = %text, sequence, "echo request");

        encoder
            .header()
            .message_class(MessageClass::ResponseSuccess)?
            .entity_class(EntityClass::ECHO)
            .sequence(sequence);
        encoder.add(&Tlv::BinaryData(BinaryData::from_text(&format!(
            "{text} Here I am!"
        ))))?;
    } else {
        tracing::info!(%entity, "unmanaged entity class");
        encoder
            .header()
            .message_class(MessageClass::ResponseFailure)?
            .entity_class(entity)
            .sequence(sequence);
        encoder.add(&Tlv::Error {
            code: 1,
            message: "entity not supported".to_string(),
        })?;
    }
    encoder.end();

    let written = connection.write_message(&encoder.data()?.as_view())?;
    tracing::debug!(written, "reply sent");
    Ok(())
}
