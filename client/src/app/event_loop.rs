use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::{dispatch, AppEvent, ClientVariant, Command, Inbound, SAVE_STATUS_TTL};
use crate::capture::{AcquireOutcome, CaptureSession};
use crate::render::{FrameRenderer, RenderedFrame};
use crate::status::{Alert, StatusBoard, StatusView};
use crate::transport::{Channel, ChannelEvent};

/// What the UI side needs to talk to a running event loop.
pub struct AppHandles {
    pub events: mpsc::UnboundedSender<AppEvent>,
    pub status: watch::Receiver<StatusView>,
    pub canvas: watch::Receiver<Option<RenderedFrame>>,
    pub alerts: mpsc::UnboundedReceiver<Alert>,
}

/// Single owner of the status line, the canvas and the capture session.
///
/// Channel events, UI actions, finished camera requests and status timers all
/// arrive as `AppEvent`s and are handled one at a time in arrival order.
pub struct EventLoop {
    variant: ClientVariant,
    channel: Arc<dyn Channel>,
    capture: Option<CaptureSession>,
    status: StatusBoard,
    renderer: FrameRenderer,
    alerts_tx: mpsc::UnboundedSender<Alert>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventLoop {
    pub fn new(
        variant: ClientVariant,
        channel: Arc<dyn Channel>,
        mut capture: Option<CaptureSession>,
    ) -> (Self, AppHandles) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        if let Some(session) = capture.as_mut() {
            let faults_tx = events_tx.clone();
            session.on_fault(Arc::new(move |attempt, error| {
                let _ = faults_tx.send(AppEvent::CaptureFailed { attempt, error });
            }));
        }
        let (alerts_tx, alerts_rx) = mpsc::unbounded_channel();
        let status = StatusBoard::new();
        let renderer = FrameRenderer::new();

        let handles = AppHandles {
            events: events_tx.clone(),
            status: status.subscribe(),
            canvas: renderer.subscribe(),
            alerts: alerts_rx,
        };
        let event_loop = Self {
            variant,
            channel,
            capture,
            status,
            renderer,
            alerts_tx,
            events_tx,
            events_rx,
        };
        (event_loop, handles)
    }

    pub async fn run(
        mut self,
        mut channel_rx: mpsc::UnboundedReceiver<ChannelEvent>,
        shutdown: CancellationToken,
    ) {
        tracing::info!("Event loop started as {:?} client", self.variant);
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(event) = channel_rx.recv() => {
                    tracing::info!("Got event from channel: {event}");
                    AppEvent::Channel(event)
                }
                Some(event) = self.events_rx.recv() => event,
                else => break,
            };
            self.handle(event).await;
        }

        if let Some(session) = self.capture.as_mut() {
            session.stop().await;
        }
        tracing::warn!("Event loop stopped");
    }

    async fn handle(&mut self, event: AppEvent) {
        match event {
            AppEvent::Channel(event) => self.apply_all(Inbound::Channel(event)).await,
            AppEvent::Ui(action) => self.apply_all(Inbound::Ui(action)).await,
            AppEvent::CaptureAcquired { attempt, result } => {
                let Some(session) = self.capture.as_mut() else {
                    return;
                };
                match session.finish_acquire(attempt, result) {
                    AcquireOutcome::Streaming => {
                        tracing::info!("Streaming webcam, attempt {attempt}");
                    }
                    AcquireOutcome::Failed(err) => {
                        self.status.show(format!("Failed to access webcam: {err}"));
                        self.raise(Alert::DeviceAccess);
                    }
                    AcquireOutcome::Discarded => {
                        tracing::debug!("Ignored camera result for attempt {attempt}");
                    }
                }
            }
            AppEvent::CaptureFailed { attempt, error } => {
                let Some(session) = self.capture.as_mut() else {
                    return;
                };
                if session.abandon(attempt).await {
                    self.status.show(format!("Webcam stopped: {error}"));
                    self.raise(Alert::DeviceAccess);
                }
            }
            AppEvent::StatusExpired(generation) => {
                if !self.status.clear_if_current(generation) {
                    tracing::debug!("Status {generation} was already replaced");
                }
            }
        }
    }

    async fn apply_all(&mut self, inbound: Inbound) {
        for command in dispatch(self.variant, inbound) {
            self.apply(command).await;
        }
    }

    async fn apply(&mut self, command: Command) {
        match command {
            Command::ShowStatus(message) => {
                self.status.show(message);
            }
            Command::ShowTransientStatus(message) => {
                let generation = self.status.show(message);
                let events_tx = self.events_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(SAVE_STATUS_TTL).await;
                    let _ = events_tx.send(AppEvent::StatusExpired(generation));
                });
            }
            Command::Alert(alert) => self.raise(alert),
            Command::Render(payload) => self.renderer.apply(&payload),
            Command::StartCapture => {
                let Some(acquisition) = self.capture.as_mut().and_then(|s| s.begin_acquire())
                else {
                    return;
                };
                let events_tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let (attempt, result) = acquisition.run().await;
                    let _ = events_tx.send(AppEvent::CaptureAcquired { attempt, result });
                });
            }
            Command::StopCapture => {
                if let Some(session) = self.capture.as_mut() {
                    session.stop().await;
                }
            }
            Command::Emit(event) => {
                let name = event.name();
                if let Err(err) = self.channel.emit(event).await {
                    tracing::error!("Could not emit {name}: {err}");
                    self.status.show(format!("Failed to send {name}: {err}"));
                }
            }
        }
    }

    fn raise(&self, alert: Alert) {
        tracing::warn!("Alert: {alert}");
        if self.alerts_tx.send(alert).is_err() {
            tracing::debug!("Nobody is listening for alerts");
        }
    }
}
