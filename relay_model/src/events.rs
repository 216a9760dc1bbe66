use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ModelErrors;
use crate::names;
use crate::socket_io::SocketPacket;

/// Base64 JPEG body without the `data:` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message: String,
}

/// Application events pushed by the relay server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    CanvasFrame(ImagePayload),
    SaveStatus(MessagePayload),
    Error(MessagePayload),
}

impl ServerEvent {
    /// Builds a typed event from a Socket.IO event.
    ///
    /// Returns `Ok(None)` for event names the client does not handle.
    pub fn from_event(name: &str, args: &[Value]) -> Result<Option<Self>, ModelErrors> {
        let event = match name {
            names::CANVAS_FRAME => ServerEvent::CanvasFrame(first_arg(names::CANVAS_FRAME, args)?),
            names::SAVE_STATUS => ServerEvent::SaveStatus(first_arg(names::SAVE_STATUS, args)?),
            names::ERROR => ServerEvent::Error(first_arg(names::ERROR, args)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::CanvasFrame(_) => names::CANVAS_FRAME,
            ServerEvent::SaveStatus(_) => names::SAVE_STATUS,
            ServerEvent::Error(_) => names::ERROR,
        }
    }
}

fn first_arg<T: for<'de> Deserialize<'de>>(
    name: &'static str,
    args: &[Value],
) -> Result<T, ModelErrors> {
    let value = args.first().ok_or(ModelErrors::MissingPayload(name))?;
    Ok(T::deserialize(value)?)
}

/// Application events emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    WebcamFrame(ImagePayload),
    SaveCanvas,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::WebcamFrame(_) => names::WEBCAM_FRAME,
            ClientEvent::SaveCanvas => names::SAVE_CANVAS,
        }
    }

    pub fn to_packet(&self) -> Result<SocketPacket, ModelErrors> {
        let args = match self {
            ClientEvent::WebcamFrame(payload) => vec![serde_json::to_value(payload)?],
            ClientEvent::SaveCanvas => Vec::new(),
        };
        Ok(SocketPacket::event(self.name(), args))
    }
}
