use serde::{Deserialize, Serialize};

use crate::errors::ModelErrors;

/// Body of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self, ModelErrors> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(ModelErrors::EmptyPacket)?;
        let body = chars.as_str();

        let packet = match kind {
            '0' => EnginePacket::Open(serde_json::from_str(body)?),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping(body.to_owned()),
            '3' => EnginePacket::Pong(body.to_owned()),
            '4' => EnginePacket::Message(body.to_owned()),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            other => return Err(ModelErrors::UnknownPacketType(other)),
        };
        Ok(packet)
    }

    pub fn encode(&self) -> Result<String, ModelErrors> {
        let text = match self {
            EnginePacket::Open(handshake) => format!("0{}", serde_json::to_string(handshake)?),
            EnginePacket::Close => "1".to_owned(),
            EnginePacket::Ping(data) => format!("2{data}"),
            EnginePacket::Pong(data) => format!("3{data}"),
            EnginePacket::Message(data) => format!("4{data}"),
            EnginePacket::Upgrade => "5".to_owned(),
            EnginePacket::Noop => "6".to_owned(),
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_open_handshake() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();

        match packet {
            EnginePacket::Open(handshake) => {
                assert_eq!(handshake.sid, "lv_VI97HAXpY6yYWAAAC");
                assert_eq!(handshake.ping_interval, 25000);
                assert_eq!(handshake.ping_timeout, 20000);
                assert_eq!(handshake.max_payload, Some(1_000_000));
            }
            other => panic!("Expected open packet, got {other:?}"),
        }
    }

    #[test]
    fn test_ping_is_answered_with_matching_pong() {
        let ping = EnginePacket::decode("2").unwrap();
        assert_eq!(ping, EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::Pong(String::new()).encode().unwrap(), "3");
        assert_eq!(EnginePacket::Pong("echo".into()).encode().unwrap(), "3echo");
    }

    #[test]
    fn test_message_keeps_socket_io_body() {
        let packet = EnginePacket::decode(r#"42["save_status",{"message":"ok"}]"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(r#"2["save_status",{"message":"ok"}]"#.to_owned())
        );
    }

    #[test]
    fn test_rejects_empty_and_unknown() {
        assert!(matches!(EnginePacket::decode(""), Err(ModelErrors::EmptyPacket)));
        assert!(matches!(
            EnginePacket::decode("9"),
            Err(ModelErrors::UnknownPacketType('9'))
        ));
    }
}
