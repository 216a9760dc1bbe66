mod dispatcher;
mod event_loop;

pub use dispatcher::{
    dispatch, Command, Inbound, CONNECTED_MESSAGE, DISCONNECTED_MESSAGE, SAVE_STATUS_TTL,
    SAVING_MESSAGE,
};
pub use event_loop::{AppHandles, EventLoop};

use crate::capture::{CaptureErrors, VideoStream};
use crate::transport::ChannelEvent;

/// Which client is running: the capture client streams the local webcam,
/// the viewer only displays the canvas and offers saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientVariant {
    Capture,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    Save,
}

/// Everything the event loop reacts to, including completions it scheduled
/// for itself.
pub enum AppEvent {
    Channel(ChannelEvent),
    Ui(UiAction),
    CaptureAcquired {
        attempt: u64,
        result: Result<Box<dyn VideoStream>, CaptureErrors>,
    },
    /// The camera of `attempt` died while streaming.
    CaptureFailed {
        attempt: u64,
        error: CaptureErrors,
    },
    StatusExpired(u64),
}
