//! Display helpers features use to talk to channel members.
//!
//! These emit display commands (not relayed messages): nothing here touches
//! the recipient ledger.

use {
    shoal_protocol::{Envelope, codes, keys},
    shoal_transport::{OutboundHandle, Result},
};

fn display_text(channel_id: &str, to_user_ids: Vec<String>, text: &str) -> Envelope {
    Envelope::new(codes::COMMAND_FROM_SERVICE)
        .with(keys::TYPE_CODE, codes::COMMAND_DOWN_DISPLAY_TEXT)
        .with(keys::CHANNEL_ID, channel_id)
        .with(keys::MSG_BODY, text)
        .with(keys::TO_USER_IDS, to_user_ids)
}

fn display_image(channel_id: &str, to_user_ids: Vec<String>, uri: &str) -> Envelope {
    Envelope::new(codes::COMMAND_FROM_SERVICE)
        .with(keys::TYPE_CODE, codes::COMMAND_DOWN_DISPLAY_IMAGE)
        .with(keys::CHANNEL_ID, channel_id)
        .with(keys::URI, uri)
        .with(keys::TO_USER_IDS, to_user_ids)
}

/// Show `text` to every listed member.
pub async fn broadcast_text(
    outbound: &OutboundHandle,
    channel_id: &str,
    members: Vec<String>,
    text: &str,
) -> Result<()> {
    outbound.send(&display_text(channel_id, members, text)).await
}

/// Show `text` to a single user.
pub async fn reply_text(
    outbound: &OutboundHandle,
    channel_id: &str,
    user_id: &str,
    text: &str,
) -> Result<()> {
    outbound
        .send(&display_text(channel_id, vec![user_id.to_owned()], text))
        .await
}

/// Show an image to every listed member.
pub async fn broadcast_image(
    outbound: &OutboundHandle,
    channel_id: &str,
    members: Vec<String>,
    uri: &str,
) -> Result<()> {
    outbound.send(&display_image(channel_id, members, uri)).await
}

/// Show an image to a single user.
pub async fn reply_image(
    outbound: &OutboundHandle,
    channel_id: &str,
    user_id: &str,
    uri: &str,
) -> Result<()> {
    outbound
        .send(&display_image(channel_id, vec![user_id.to_owned()], uri))
        .await
}

/// One text for the acting user, another for everyone else in the channel.
pub async fn split_text(
    outbound: &OutboundHandle,
    channel_id: &str,
    user_id: &str,
    members: Vec<String>,
    user_text: &str,
    others_text: &str,
) -> Result<()> {
    let others: Vec<String> = members.into_iter().filter(|m| m != user_id).collect();
    reply_text(outbound, channel_id, user_id, user_text).await?;
    if !others.is_empty() {
        broadcast_text(outbound, channel_id, others, others_text).await?;
    }
    Ok(())
}
