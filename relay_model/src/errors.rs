#[derive(thiserror::Error, Debug)]
pub enum ModelErrors {
    #[error("Empty packet")]
    EmptyPacket,
    #[error("Unknown packet type: {0}")]
    UnknownPacketType(char),
    #[error("Unsupported packet type: {0}")]
    UnsupportedPacketType(char),
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),
    #[error("Event {0} arrived without payload")]
    MissingPayload(&'static str),
    #[error("Failed to (de)serialize payload")]
    SerdeError(#[from] serde_json::Error),
}
