use tokio::sync::watch;

use crate::codecs::with_descriptor;

/// An inbound canvas frame ready to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFrame {
    /// Displayable data URI.
    pub uri: String,
    /// Local arrival counter; frames carry no ordering of their own.
    pub sequence: u64,
}

impl RenderedFrame {
    pub fn payload(&self) -> &str {
        self.uri.split_once(',').map_or("", |(_, payload)| payload)
    }
}

/// Holds the most recently received canvas frame. No history is kept.
pub struct FrameRenderer {
    tx: watch::Sender<Option<RenderedFrame>>,
    received: u64,
}

impl FrameRenderer {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx, received: 0 }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<RenderedFrame>> {
        self.tx.subscribe()
    }

    pub fn apply(&mut self, payload: &str) {
        self.received += 1;
        tracing::debug!(
            "Canvas frame {} received ({} bytes)",
            self.received,
            payload.len()
        );
        self.tx.send_replace(Some(RenderedFrame {
            uri: with_descriptor(payload),
            sequence: self.received,
        }));
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<RenderedFrame> {
        self.tx.borrow().clone()
    }
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new()
    }
}
