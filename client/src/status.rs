use std::fmt::Display;

use tokio::sync::watch;

/// Snapshot of the status line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusView {
    pub message: String,
    pub generation: u64,
}

/// The single user-visible status line.
///
/// Every write bumps the generation. A pending clear carries the generation
/// it was scheduled for and is ignored once a newer message has been shown.
pub struct StatusBoard {
    tx: watch::Sender<StatusView>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(StatusView::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    pub fn current(&self) -> StatusView {
        self.tx.borrow().clone()
    }

    /// Replaces the message and returns its generation.
    pub fn show(&self, message: impl Into<String>) -> u64 {
        let message = message.into();
        tracing::info!("Status: {message}");

        let mut generation = 0;
        self.tx.send_modify(|view| {
            view.generation += 1;
            view.message = message;
            generation = view.generation;
        });
        generation
    }

    /// Blanks the line if `generation` is still the latest write.
    pub fn clear_if_current(&self, generation: u64) -> bool {
        self.tx.send_if_modified(|view| {
            if view.generation != generation || view.message.is_empty() {
                return false;
            }
            view.message.clear();
            true
        })
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocking notifications the user has to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// The local camera could not be opened.
    DeviceAccess,
    /// The server reported a problem with the webcam stream.
    CaptureGuidance,
    Generic(String),
}

impl Alert {
    /// Picks the alert for a server-reported error message.
    pub fn for_server_error(message: &str) -> Self {
        if message.to_lowercase().contains("webcam") {
            Alert::CaptureGuidance
        } else {
            Alert::Generic(message.to_owned())
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Alert::DeviceAccess => "Camera unavailable",
            Alert::CaptureGuidance => "Webcam problem",
            Alert::Generic(_) => "Server error",
        }
    }
}

impl Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Alert::DeviceAccess => f.write_str(
                "Unable to access the webcam. Please allow camera access and make sure a camera is connected.",
            ),
            Alert::CaptureGuidance => f.write_str(
                "Please ensure your webcam is connected and permissions are granted.",
            ),
            Alert::Generic(message) => write!(f, "Error: {message}"),
        }
    }
}
