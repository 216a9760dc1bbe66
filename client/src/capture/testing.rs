use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{CaptureDevice, CaptureErrors, Frame, VideoConstraints, VideoStream};

#[derive(Default)]
pub struct Counters {
    pub acquired: AtomicUsize,
    pub stopped: AtomicUsize,
}

impl Counters {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Streams handed out and not yet stopped.
    pub fn live(&self) -> usize {
        self.acquired() - self.stopped()
    }
}

#[derive(Clone, Copy)]
enum Behaviour {
    Working,
    Denied,
    LostAfter(usize),
}

/// Camera producing flat grey frames of the requested size and counting
/// every track it opens and stops.
pub struct FakeCamera {
    behaviour: Behaviour,
    counters: Arc<Counters>,
}

impl FakeCamera {
    pub fn working() -> (Self, Arc<Counters>) {
        Self::build(Behaviour::Working)
    }

    pub fn denied() -> (Self, Arc<Counters>) {
        Self::build(Behaviour::Denied)
    }

    /// Streams `frames` samples, then behaves like an unplugged device.
    pub fn lost_after(frames: usize) -> (Self, Arc<Counters>) {
        Self::build(Behaviour::LostAfter(frames))
    }

    fn build(behaviour: Behaviour) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let camera = Self {
            behaviour,
            counters: Arc::clone(&counters),
        };
        (camera, counters)
    }
}

struct FakeStream {
    constraints: VideoConstraints,
    live: bool,
    remaining: Option<usize>,
    counters: Arc<Counters>,
}

#[async_trait]
impl CaptureDevice for FakeCamera {
    async fn acquire(
        &self,
        constraints: VideoConstraints,
    ) -> Result<Box<dyn VideoStream>, CaptureErrors> {
        let remaining = match self.behaviour {
            Behaviour::Denied => {
                return Err(CaptureErrors::PermissionDenied("blocked".to_owned()));
            }
            Behaviour::Working => None,
            Behaviour::LostAfter(frames) => Some(frames),
        };
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            constraints,
            live: true,
            remaining,
            counters: Arc::clone(&self.counters),
        }))
    }
}

impl VideoStream for FakeStream {
    fn grab(&mut self) -> Result<Frame, CaptureErrors> {
        if !self.live {
            return Err(CaptureErrors::StreamStopped);
        }
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(CaptureErrors::DeviceLost("unplugged".to_owned()));
            }
            *remaining -= 1;
        }
        let VideoConstraints { width, height } = self.constraints;
        Ok(Frame {
            width,
            height,
            data: vec![90; (width * height * 3) as usize],
        })
    }

    fn live_tracks(&self) -> usize {
        usize::from(self.live)
    }

    fn stop_tracks(&mut self) -> usize {
        if !self.live {
            return 0;
        }
        self.live = false;
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        1
    }
}
