//! Wire model shared between the frame relay client and its tests.
//!
//! The server speaks Socket.IO v4 over a plain WebSocket, so every frame on the
//! socket is an Engine.IO text packet, and application events travel inside
//! Engine.IO `message` packets as Socket.IO packets.

mod engine_io;
mod errors;
mod events;
mod socket_io;

pub use engine_io::{EnginePacket, Handshake};
pub use errors::ModelErrors;
pub use events::{ClientEvent, ImagePayload, MessagePayload, ServerEvent};
pub use socket_io::{SocketPacket, DEFAULT_NAMESPACE};

/// Event names exchanged with the relay server.
pub mod names {
    pub const CANVAS_FRAME: &str = "canvas_frame";
    pub const SAVE_STATUS: &str = "save_status";
    pub const ERROR: &str = "error";
    pub const WEBCAM_FRAME: &str = "webcam_frame";
    pub const SAVE_CANVAS: &str = "save_canvas";
}
