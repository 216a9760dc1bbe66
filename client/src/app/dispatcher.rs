use std::time::Duration;

use relay_model::{ClientEvent, ServerEvent};

use super::{ClientVariant, UiAction};
use crate::status::Alert;
use crate::transport::ChannelEvent;

pub const CONNECTED_MESSAGE: &str = "Connected to painting server";
pub const DISCONNECTED_MESSAGE: &str = "Disconnected from server";
pub const SAVING_MESSAGE: &str = "Saving canvas...";
/// How long a save outcome stays on the status line.
pub const SAVE_STATUS_TTL: Duration = Duration::from_secs(5);

/// Inputs the dispatcher turns into commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Channel(ChannelEvent),
    Ui(UiAction),
}

/// State transitions requested by the dispatcher, applied by the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ShowStatus(String),
    /// Shown for `SAVE_STATUS_TTL`, then cleared unless superseded.
    ShowTransientStatus(String),
    Alert(Alert),
    Render(String),
    StartCapture,
    StopCapture,
    Emit(ClientEvent),
}

pub fn dispatch(variant: ClientVariant, inbound: Inbound) -> Vec<Command> {
    let capture = variant == ClientVariant::Capture;
    match inbound {
        Inbound::Channel(ChannelEvent::Connected) => {
            let mut commands = vec![Command::ShowStatus(CONNECTED_MESSAGE.to_owned())];
            if capture {
                commands.push(Command::StartCapture);
            }
            commands
        }
        Inbound::Channel(ChannelEvent::Disconnected) => {
            let mut commands = vec![Command::ShowStatus(DISCONNECTED_MESSAGE.to_owned())];
            if capture {
                commands.push(Command::StopCapture);
            }
            commands
        }
        Inbound::Channel(ChannelEvent::Server(event)) => match event {
            ServerEvent::CanvasFrame(payload) => vec![Command::Render(payload.image)],
            ServerEvent::SaveStatus(payload) => {
                vec![Command::ShowTransientStatus(payload.message)]
            }
            ServerEvent::Error(payload) => {
                let alert = Alert::for_server_error(&payload.message);
                vec![Command::ShowStatus(payload.message), Command::Alert(alert)]
            }
        },
        Inbound::Ui(UiAction::Save) => vec![
            Command::ShowStatus(SAVING_MESSAGE.to_owned()),
            Command::Emit(ClientEvent::SaveCanvas),
        ],
    }
}

#[cfg(test)]
mod tests {
    use relay_model::{ImagePayload, MessagePayload};

    use super::*;

    fn server(event: ServerEvent) -> Inbound {
        Inbound::Channel(ChannelEvent::Server(event))
    }

    #[test]
    fn test_lifecycle_drives_capture_only_in_capture_variant() {
        assert_eq!(
            dispatch(ClientVariant::Capture, Inbound::Channel(ChannelEvent::Connected)),
            vec![
                Command::ShowStatus(CONNECTED_MESSAGE.to_owned()),
                Command::StartCapture
            ]
        );
        assert_eq!(
            dispatch(ClientVariant::Capture, Inbound::Channel(ChannelEvent::Disconnected)),
            vec![
                Command::ShowStatus(DISCONNECTED_MESSAGE.to_owned()),
                Command::StopCapture
            ]
        );
        assert_eq!(
            dispatch(ClientVariant::Viewer, Inbound::Channel(ChannelEvent::Connected)),
            vec![Command::ShowStatus(CONNECTED_MESSAGE.to_owned())]
        );
        assert_eq!(
            dispatch(ClientVariant::Viewer, Inbound::Channel(ChannelEvent::Disconnected)),
            vec![Command::ShowStatus(DISCONNECTED_MESSAGE.to_owned())]
        );
    }

    #[test]
    fn test_server_events() {
        let frame = server(ServerEvent::CanvasFrame(ImagePayload {
            image: "/9j/4AAQ".to_owned(),
        }));
        assert_eq!(
            dispatch(ClientVariant::Viewer, frame),
            vec![Command::Render("/9j/4AAQ".to_owned())]
        );

        let saved = server(ServerEvent::SaveStatus(MessagePayload {
            message: "Canvas saved as canvas_1.png".to_owned(),
        }));
        assert_eq!(
            dispatch(ClientVariant::Capture, saved),
            vec![Command::ShowTransientStatus(
                "Canvas saved as canvas_1.png".to_owned()
            )]
        );
    }

    #[test]
    fn test_server_error_alerts() {
        let webcam = server(ServerEvent::Error(MessagePayload {
            message: "Webcam not found".to_owned(),
        }));
        assert_eq!(
            dispatch(ClientVariant::Capture, webcam),
            vec![
                Command::ShowStatus("Webcam not found".to_owned()),
                Command::Alert(Alert::CaptureGuidance)
            ]
        );

        let generic = server(ServerEvent::Error(MessagePayload {
            message: "Invalid request".to_owned(),
        }));
        assert_eq!(
            dispatch(ClientVariant::Capture, generic),
            vec![
                Command::ShowStatus("Invalid request".to_owned()),
                Command::Alert(Alert::Generic("Invalid request".to_owned()))
            ]
        );
    }

    #[test]
    fn test_save_emits_once_without_payload() {
        let commands = dispatch(ClientVariant::Viewer, Inbound::Ui(UiAction::Save));
        assert_eq!(
            commands,
            vec![
                Command::ShowStatus(SAVING_MESSAGE.to_owned()),
                Command::Emit(ClientEvent::SaveCanvas)
            ]
        );
    }
}
