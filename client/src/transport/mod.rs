mod endpoint;
mod errors;
mod events;
mod socket_io;

pub use endpoint::{socket_url, DEFAULT_BACKEND_URL};
pub use errors::TransportErrors;
pub use events::ChannelEvent;
pub use socket_io::SocketIoChannel;

use async_trait::async_trait;
use relay_model::ClientEvent;

/// Outbound half of the duplex channel.
///
/// `emit` resolves once the event has been written to the socket, so a caller
/// that awaits it never has more than one event in flight.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn emit(&self, event: ClientEvent) -> Result<(), TransportErrors>;
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// In-memory channel that records every emitted event.
    pub struct RecordingChannel {
        connected: AtomicBool,
        emitted: Mutex<Vec<ClientEvent>>,
    }

    impl RecordingChannel {
        pub fn new() -> Self {
            Self {
                connected: AtomicBool::new(true),
                emitted: Mutex::new(Vec::new()),
            }
        }

        pub fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }

        pub fn count(&self, name: &str) -> usize {
            self.emitted
                .lock()
                .unwrap()
                .iter()
                .filter(|event| event.name() == name)
                .count()
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        async fn emit(&self, event: ClientEvent) -> Result<(), TransportErrors> {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(TransportErrors::ConnectionIsNotOpened);
            }
            self.emitted.lock().unwrap().push(event);
            Ok(())
        }
    }
}
