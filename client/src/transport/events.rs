use std::fmt::Display;

use relay_model::ServerEvent;

/// Lifecycle and application events produced by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Server(ServerEvent),
}

impl Display for ChannelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelEvent::Connected => f.write_str("Connected"),
            ChannelEvent::Disconnected => f.write_str("Disconnected"),
            ChannelEvent::Server(event) => write!(f, "Server({})", event.name()),
        }
    }
}
