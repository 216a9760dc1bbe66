use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::FmtSubscriber;

mod app;
mod capture;
mod cli;
mod codecs;
mod errors;
#[cfg(feature = "gui")]
mod gui;
mod render;
mod status;
mod transport;

use app::{AppEvent, AppHandles, ClientVariant, EventLoop, UiAction};
use capture::{CaptureDevice, CaptureSession, SyntheticCamera};
use cli::{Args, CameraKind};
use errors::StartupErrors;
use transport::SocketIoChannel;

fn main() -> ExitCode {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_line_number(true)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Could not install logger: {err}");
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), StartupErrors> {
    let url = transport::socket_url(&args.backend_url)?;
    let variant = args.variant();
    let settings = args.capture_settings()?;

    let async_rt = Arc::new(
        tokio::runtime::Builder::new_multi_thread()
            .enable_io()
            .enable_time()
            .build()?,
    );

    let channel = SocketIoChannel::new_shared(url);
    let (preview_tx, preview_rx) = watch::channel(None);
    let capture = match variant {
        ClientVariant::Capture => Some(CaptureSession::new(
            open_device(&args)?,
            channel.clone(),
            settings,
            Arc::new(preview_tx),
        )),
        ClientVariant::Viewer => None,
    };
    let (event_loop, handles) = EventLoop::new(variant, channel.clone(), capture);

    let shutdown = CancellationToken::new();
    let (channel_tx, channel_rx) = mpsc::unbounded_channel();
    async_rt.spawn(Arc::clone(&channel).run(channel_tx, shutdown.clone()));
    let event_loop = async_rt.spawn(event_loop.run(channel_rx, shutdown.clone()));
    async_rt.spawn(cancel_on_ctrl_c(shutdown.clone()));

    let result = if args.headless || !cfg!(feature = "gui") {
        async_rt.block_on(run_headless(handles, shutdown.clone()));
        Ok(())
    } else {
        run_window(variant, handles, preview_rx, shutdown.clone())
    };

    shutdown.cancel();
    if let Err(err) = async_rt.block_on(event_loop) {
        tracing::error!("Event loop task failed: {err}");
    }
    result
}

fn open_device(args: &Args) -> Result<Arc<dyn CaptureDevice>, StartupErrors> {
    match args.camera {
        CameraKind::Synthetic => Ok(Arc::new(SyntheticCamera::new())),
        #[cfg(feature = "camera")]
        CameraKind::Native => Ok(Arc::new(capture::NativeCamera::new(args.camera_index))),
        #[cfg(not(feature = "camera"))]
        CameraKind::Native => Err(StartupErrors::CameraUnavailable),
    }
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Interrupted, shutting down"),
                Err(err) => tracing::error!("Could not listen for Ctrl-C: {err}"),
            }
            shutdown.cancel();
        }
    }
}

async fn run_headless(mut handles: AppHandles, shutdown: CancellationToken) {
    tracing::info!("Running headless, type `save` to save the canvas");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(alert) = handles.alerts.recv() => {
                tracing::warn!("[{}] {alert}", alert.title());
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().eq_ignore_ascii_case("save") => {
                    if handles.events.send(AppEvent::Ui(UiAction::Save)).is_err() {
                        break;
                    }
                }
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => tracing::warn!("Unknown command: {}", line.trim()),
                Ok(None) => {
                    tracing::info!("Stdin closed, saving is no longer available");
                    stdin_open = false;
                }
                Err(err) => {
                    tracing::error!("Could not read stdin: {err}");
                    stdin_open = false;
                }
            },
        }
    }
}

#[cfg(feature = "gui")]
fn run_window(
    variant: ClientVariant,
    handles: AppHandles,
    preview: watch::Receiver<Option<capture::Frame>>,
    shutdown: CancellationToken,
) -> Result<(), StartupErrors> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1320.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Frame Relay",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(gui::RelayApp::new(
                variant, handles, preview, shutdown,
            )))
        }),
    )
    .map_err(|err| StartupErrors::Gui(err.to_string()))
}

#[cfg(not(feature = "gui"))]
fn run_window(
    _variant: ClientVariant,
    _handles: AppHandles,
    _preview: watch::Receiver<Option<capture::Frame>>,
    _shutdown: CancellationToken,
) -> Result<(), StartupErrors> {
    Err(StartupErrors::Gui("built without the `gui` feature".to_owned()))
}
