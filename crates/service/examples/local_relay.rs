//! Drive a control service over the in-memory transport: two users join a
//! channel, one sends a message, and the delivery comes back out.
//!
//! Run with `RUST_LOG=debug` to watch the dispatch decisions.

use {
    shoal_client::ChatMessage,
    shoal_protocol::{Envelope, codes, decode, encode, keys},
    shoal_service::{ControlService, ServiceConfig},
    shoal_transport::{OutboundHandle, Transport, TransportEvent, memory},
    tracing::info,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (svc, mut wire) = memory::pair();
    let mut service = ControlService::new(
        OutboundHandle::new(svc.transport),
        ServiceConfig::new("ControlService"),
    )
    .await;
    let events = svc.events;
    tokio::spawn(async move { service.run(events).await });

    for user in ["alice", "bob"] {
        let joined = Envelope::new(codes::COMMAND_TO_SERVICE)
            .with(keys::TYPE_CODE, codes::NOTICE_USER_JOINED)
            .with(keys::CHANNEL_ID, "lobby")
            .with(keys::USER_ID, user);
        wire.transport.send(encode(&joined)?).await?;
    }

    let message = Envelope::new(codes::MESSAGE_TO_SERVICE)
        .with(keys::TYPE_CODE, codes::MESSAGE_UP_TEXT)
        .with(keys::CHANNEL_ID, "lobby")
        .with(keys::FROM_USER_ID, "alice")
        .with(keys::PROVISIONAL_ID, "temp_0_0")
        .with(keys::MSG_BODY, "hello, lobby");
    wire.transport.send(encode(&message)?).await?;

    while let Some(event) = wire.events.recv().await {
        let TransportEvent::Frame(raw) = event else {
            continue;
        };
        let envelope = decode(&raw)?;
        if envelope.code == codes::MESSAGE_FROM_SERVICE {
            let delivered = ChatMessage::from_delivery(&envelope)?;
            info!(
                channel = %delivered.channel_id,
                from = %delivered.sender,
                body = %delivered.body,
                recipients = delivered.recipient_count,
                "delivery"
            );
            break;
        }
        info!(code = envelope.code, "service emitted");
    }
    Ok(())
}
