use shoal_protocol::{Envelope, ProtocolError, codes, keys};

/// What kind of payload a delivery carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    File,
}

impl MessageKind {
    fn of_type_code(envelope: &Envelope) -> Result<Self, ProtocolError> {
        match envelope.type_code()? {
            codes::MESSAGE_DOWN_TEXT => Ok(Self::Text),
            codes::MESSAGE_DOWN_IMAGE => Ok(Self::Image),
            codes::MESSAGE_DOWN_FILE => Ok(Self::File),
            _ => Err(ProtocolError::InvalidField {
                code: envelope.code,
                field: keys::TYPE_CODE,
                expected: "a delivery message type code",
            }),
        }
    }
}

/// A delivery envelope pre-analyzed for the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub id: String,
    pub channel_id: String,
    pub sender: String,
    /// Text body for [`MessageKind::Text`], a URI otherwise.
    pub body: String,
    pub origin: String,
    pub recipient_count: u32,
}

impl ChatMessage {
    /// Parse a delivery envelope (the outbound message band). A delivery
    /// missing required fields, or carrying a type code outside the band, is
    /// a protocol error; the caller decides whether that drops or kills.
    pub fn from_delivery(envelope: &Envelope) -> Result<Self, ProtocolError> {
        let kind = MessageKind::of_type_code(envelope)?;
        let body_key = match kind {
            MessageKind::Text => keys::MSG_BODY,
            MessageKind::Image | MessageKind::File => keys::URI,
        };
        Ok(Self {
            kind,
            id: envelope.str_field(keys::MSG_ID)?.to_owned(),
            channel_id: envelope.channel_id()?.to_owned(),
            sender: envelope.str_field(keys::FROM_USER_ID)?.to_owned(),
            body: envelope.str_field(body_key)?.to_owned(),
            origin: envelope.str_field(keys::ORIGIN)?.to_owned(),
            recipient_count: envelope.u32_field(keys::N_RECIPIENTS)?,
        })
    }
}
