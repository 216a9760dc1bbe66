use async_trait::async_trait;

use super::{CaptureDevice, CaptureErrors, Frame, VideoConstraints, VideoStream};

// Eight vertical bars, classic test card colours.
const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

/// Deterministic test-pattern camera for CI and machines without a webcam.
#[derive(Debug, Default, Clone)]
pub struct SyntheticCamera;

impl SyntheticCamera {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CaptureDevice for SyntheticCamera {
    async fn acquire(
        &self,
        constraints: VideoConstraints,
    ) -> Result<Box<dyn VideoStream>, CaptureErrors> {
        if constraints.width == 0 || constraints.height == 0 {
            return Err(CaptureErrors::AcquisitionFailed(format!(
                "unsupported resolution {}x{}",
                constraints.width, constraints.height
            )));
        }
        tracing::info!(
            "Synthetic camera opened at {}x{}",
            constraints.width,
            constraints.height
        );
        Ok(Box::new(SyntheticStream {
            width: constraints.width,
            height: constraints.height,
            sequence: 0,
            live: true,
        }))
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    sequence: u64,
    live: bool,
}

impl VideoStream for SyntheticStream {
    fn grab(&mut self) -> Result<Frame, CaptureErrors> {
        if !self.live {
            return Err(CaptureErrors::StreamStopped);
        }
        self.sequence += 1;

        let width = self.width as usize;
        let bar_width = (width / BARS.len()).max(1);
        // Bars scroll by a few pixels per frame so the preview visibly moves.
        let offset = (self.sequence as usize * 4) % width;

        let mut data = Vec::with_capacity(width * self.height as usize * 3);
        for _ in 0..self.height {
            for x in 0..width {
                let bar = ((x + offset) / bar_width) % BARS.len();
                data.extend_from_slice(&BARS[bar]);
            }
        }

        Ok(Frame {
            width: self.width,
            height: self.height,
            data,
        })
    }

    fn live_tracks(&self) -> usize {
        usize::from(self.live)
    }

    fn stop_tracks(&mut self) -> usize {
        let stopped = self.live_tracks();
        self.live = false;
        stopped
    }
}
