use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbImage;
use relay_model::{ClientEvent, ImagePayload};
use tokio_util::sync::CancellationToken;

use super::{
    Cadence, CaptureErrors, CaptureSettings, Frame, PreviewSink, SendErrors, VideoConstraints,
    VideoStream,
};
use crate::codecs::{strip_descriptor, to_data_url, JpegEncoder};
use crate::transport::Channel;

/// Samples, encodes and emits one frame per cadence tick until cancelled.
pub(super) struct SendCycle {
    stream: Box<dyn VideoStream>,
    channel: Arc<dyn Channel>,
    encoder: JpegEncoder,
    constraints: VideoConstraints,
    cadence: Cadence,
    preview: PreviewSink,
    cancel: CancellationToken,
}

impl SendCycle {
    pub(super) fn new(
        stream: Box<dyn VideoStream>,
        channel: Arc<dyn Channel>,
        settings: &CaptureSettings,
        preview: PreviewSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream,
            channel,
            encoder: settings.encoder,
            constraints: settings.constraints,
            cadence: Cadence::new(settings.frame_interval),
            preview,
            cancel,
        }
    }

    /// Runs until cancelled or until the camera dies, and hands the stream
    /// back so the owner can stop it.
    pub(super) async fn run(mut self) -> (Box<dyn VideoStream>, Option<CaptureErrors>) {
        let mut sent: u64 = 0;
        let mut fault = None;
        tracing::info!(
            "Send cycle started, one frame every {:?}",
            self.cadence.period()
        );

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.cadence.tick() => {}
            }

            match self.step().await {
                Ok(true) => sent += 1,
                Ok(false) => break,
                Err(SendErrors::Capture(err)) if err.is_fatal() => {
                    tracing::error!("Camera failed, stopping send cycle: {err}");
                    fault = Some(err);
                    break;
                }
                Err(err) => tracing::warn!("Skipping frame: {err}"),
            }
        }

        tracing::info!("Send cycle stopped after {sent} frames");
        (self.stream, fault)
    }

    /// Returns `Ok(false)` when cancellation arrived before the emit.
    async fn step(&mut self) -> Result<bool, SendErrors> {
        let frame = draw_onto_surface(self.stream.grab()?, self.constraints)?;
        self.preview.send_replace(Some(frame.clone()));

        let encoder = self.encoder;
        let data_url =
            tokio::task::spawn_blocking(move || encoder.encode(&frame).map(|jpeg| to_data_url(&jpeg)))
                .await??;
        let payload = strip_descriptor(&data_url)?.to_owned();

        if self.cancel.is_cancelled() {
            return Ok(false);
        }
        tracing::debug!("Sending frame ({} bytes)", payload.len());
        self.channel
            .emit(ClientEvent::WebcamFrame(ImagePayload { image: payload }))
            .await?;
        Ok(true)
    }
}

/// Scales a sample onto the fixed-size drawing surface.
pub(super) fn draw_onto_surface(
    frame: Frame,
    surface: VideoConstraints,
) -> Result<Frame, CaptureErrors> {
    if frame.width == surface.width && frame.height == surface.height {
        return Ok(frame);
    }

    let (width, height) = (frame.width, frame.height);
    let image = RgbImage::from_raw(width, height, frame.data).ok_or_else(|| {
        CaptureErrors::FrameFailed(format!("buffer does not match {width}x{height}"))
    })?;
    let scaled = imageops::resize(&image, surface.width, surface.height, FilterType::Triangle);
    Ok(Frame {
        width: surface.width,
        height: surface.height,
        data: scaled.into_raw(),
    })
}
