//! Bounded polling of a render session

use super::{AudioRenderer, Provided, RenderSession};
use crate::config::SpectroConfig;
use crate::track::TrackDescriptor;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wall-clock budget and retry cadence for one render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderBudget {
    /// Measured from the start of the render, not per frame
    pub timeout: Duration,
    /// Sleep between polls while the renderer is buffering
    pub poll_interval: Duration,
}

impl RenderBudget {
    pub fn from_config(config: &SpectroConfig) -> Self {
        Self {
            timeout: config.render_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

impl Default for RenderBudget {
    fn default() -> Self {
        Self::from_config(&SpectroConfig::default())
    }
}

/// How a render loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The renderer reported end of stream
    Completed,
    /// The budget expired first
    TimedOut,
    /// The wait was interrupted
    Cancelled,
}

/// Destroys the session on drop, so every exit path releases it
struct SessionGuard(Box<dyn RenderSession>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        log::debug!("Destroying render session");
        self.0.destroy();
    }
}

/// Produces raw PCM frames for one track from a fresh render session
pub struct PcmFrameSource<'a> {
    renderer: &'a dyn AudioRenderer,
    budget: RenderBudget,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> PcmFrameSource<'a> {
    pub fn new(renderer: &'a dyn AudioRenderer, budget: RenderBudget) -> Self {
        Self {
            renderer,
            budget,
            cancel: None,
        }
    }

    /// Abort the loop as soon as `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Play `track` and hand every frame to `on_frame` until the stream ends,
    /// the budget runs out, or the wait is interrupted
    pub fn render<F>(&self, track: &TrackDescriptor, mut on_frame: F) -> Result<RenderOutcome>
    where
        F: FnMut(&[u8]),
    {
        let started = Instant::now();
        let mut session = SessionGuard(self.renderer.create_session()?);
        session.0.start(track)?;

        loop {
            if started.elapsed() > self.budget.timeout {
                log::warn!("Spectrogram calculation timed out for {}", track.info.title);
                return Ok(RenderOutcome::TimedOut);
            }
            if self.is_cancelled() {
                log::warn!("Spectrogram calculation interrupted for {}", track.info.title);
                return Ok(RenderOutcome::Cancelled);
            }

            match session.0.provide()? {
                Provided::Frame(data) => on_frame(&data),
                Provided::Pending => std::thread::sleep(self.budget.poll_interval),
                Provided::Ended => return Ok(RenderOutcome::Completed),
            }
        }
    }
}
