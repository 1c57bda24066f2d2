//! Spectrogram lookup facade
//!
//! Checks the cache, resolves the identifier, excludes live streams and runs
//! the blocking render/transform pipeline on tokio's blocking pool. Every
//! failure degrades to [`SpectrogramOutcome::Unavailable`]; nothing is raised
//! to the caller.

use crate::audio::{AudioRenderer, PcmFrameSource, RenderBudget, RenderOutcome};
use crate::cache::SpectrogramCache;
use crate::config::SpectroConfig;
use crate::track::{ResolveError, TrackCodec, TrackDescriptor, TrackResolver};
use crate::transform::{SpectralEngine, Spectrogram};
use anyhow::Result;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;


/// Why no spectrogram could be produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The identifier is not valid base64
    InvalidIdentifier,
    /// The decoder yielded no playable track
    NotFound,
    /// Live streams have no bounded length
    LiveStream,
    /// Decoding, rendering or transforming failed
    Failed(String),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::InvalidIdentifier => write!(f, "invalid identifier"),
            UnavailableReason::NotFound => write!(f, "track not found"),
            UnavailableReason::LiveStream => write!(f, "track is a live stream"),
            UnavailableReason::Failed(msg) => write!(f, "computation failed: {}", msg),
        }
    }
}

/// Result of a spectrogram request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpectrogramOutcome {
    /// Served from the cache without computation
    Cached(Arc<Spectrogram>),
    /// Computed by this request and now cached
    Computed(Arc<Spectrogram>),
    Unavailable(UnavailableReason),
}

impl SpectrogramOutcome {
    pub fn spectrogram(&self) -> Option<Arc<Spectrogram>> {
        match self {
            SpectrogramOutcome::Cached(s) | SpectrogramOutcome::Computed(s) => Some(s.clone()),
            SpectrogramOutcome::Unavailable(_) => None,
        }
    }

    pub fn into_spectrogram(self) -> Option<Arc<Spectrogram>> {
        match self {
            SpectrogramOutcome::Cached(s) | SpectrogramOutcome::Computed(s) => Some(s),
            SpectrogramOutcome::Unavailable(_) => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            SpectrogramOutcome::Cached(_) => "cached",
            SpectrogramOutcome::Computed(_) => "computed",
            SpectrogramOutcome::Unavailable(_) => "unavailable",
        }
    }
}

/// Single entry point for spectrogram requests
///
/// Cheap to clone; clones share the cache and any in-flight computations.
#[derive(Clone)]
pub struct SpectrogramService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    resolver: TrackResolver,
    renderer: Arc<dyn AudioRenderer>,
    cache: SpectrogramCache,
    config: SpectroConfig,
    shutdown: Arc<AtomicBool>,
}

impl SpectrogramService {
    pub fn new(codec: Arc<dyn TrackCodec>, renderer: Arc<dyn AudioRenderer>, config: SpectroConfig) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                resolver: TrackResolver::new(codec),
                renderer,
                cache: SpectrogramCache::new(),
                config,
                shutdown: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    pub fn cache(&self) -> &SpectrogramCache {
        &self.inner.cache
    }

    pub fn resolver(&self) -> &TrackResolver {
        &self.inner.resolver
    }

    /// Interrupt in-flight renders and refuse new computations
    ///
    /// Interrupted renders keep the frames produced so far, like a timeout.
    pub fn shutdown(&self) {
        log::info!("Shutting down spectrogram service");
        self.inner.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Cached or freshly computed spectrogram, or `None`
    pub async fn get_spectrogram(&self, id: &str) -> Option<Arc<Spectrogram>> {
        self.spectrogram(id).await.into_spectrogram()
    }

    pub async fn spectrogram(&self, id: &str) -> SpectrogramOutcome {
        if let Some(hit) = self.inner.cache.get(id) {
            log::debug!("Spectrogram cache hit for {}", id);
            return SpectrogramOutcome::Cached(hit);
        }

        // The lookup owns the computation; it finishes and fills the cache
        // even if this caller is dropped.
        let inner = self.inner.clone();
        let key = id.to_string();
        let lookup = tokio::spawn(async move {
            inner.cache.get_or_compute(&key, || inner.compute(&key)).await
        });

        match lookup.await {
            Ok(Ok(lookup)) if lookup.computed => SpectrogramOutcome::Computed(lookup.spectrogram),
            Ok(Ok(lookup)) => SpectrogramOutcome::Cached(lookup.spectrogram),
            Ok(Err(reason)) => SpectrogramOutcome::Unavailable(reason),
            Err(e) => {
                log::error!("Spectrogram lookup for {} did not finish: {}", id, e);
                SpectrogramOutcome::Unavailable(UnavailableReason::Failed(e.to_string()))
            }
        }
    }
}

impl ServiceInner {
    async fn compute(&self, id: &str) -> Result<Spectrogram, UnavailableReason> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(UnavailableReason::Failed("service is shut down".to_string()));
        }

        let track = match self.resolver.resolve(id) {
            Ok(Some(track)) => track,
            Ok(None) => {
                log::debug!("No track found for {}", id);
                return Err(UnavailableReason::NotFound);
            }
            Err(ResolveError::InvalidIdentifier(e)) => {
                log::debug!("Identifier {} is not decodable: {}", id, e);
                return Err(UnavailableReason::InvalidIdentifier);
            }
            Err(e) => {
                log::error!("Failed to calculate spectrogram for {}: {}", id, e);
                return Err(UnavailableReason::Failed(e.to_string()));
            }
        };

        if track.is_stream() {
            log::debug!("Skipping live stream {}", track.info.title);
            return Err(UnavailableReason::LiveStream);
        }

        let renderer = self.renderer.clone();
        let config = self.config.clone();
        let cancel = self.shutdown.clone();
        let title = track.info.title.clone();

        let joined = tokio::task::spawn_blocking(move || {
            compute_spectrogram(renderer.as_ref(), &track, &config, Some(cancel))
        })
        .await;

        match joined {
            Ok(Ok(spectrogram)) => Ok(spectrogram),
            Ok(Err(e)) => {
                log::error!("Failed to calculate spectrogram for {} ({}): {:#}", id, title, e);
                Err(UnavailableReason::Failed(format!("{:#}", e)))
            }
            Err(e) => {
                log::error!("Spectrogram task for {} ({}) did not finish: {}", id, title, e);
                Err(UnavailableReason::Failed(e.to_string()))
            }
        }
    }
}

/// Render `track` and transform its PCM into a spectrogram (blocking)
///
/// The budget covers the whole render, including whatever work the
/// renderer does in `start`. A render cut short before a single full
/// window is an error, so an empty partial result is never cached.
pub fn compute_spectrogram(
    renderer: &dyn AudioRenderer,
    track: &TrackDescriptor,
    config: &SpectroConfig,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<Spectrogram> {
    let mut engine = SpectralEngine::new(renderer.output_format(), config.analysis.channel_mode);

    let mut source = PcmFrameSource::new(renderer, RenderBudget::from_config(config));
    if let Some(flag) = cancel {
        source = source.with_cancel_flag(flag);
    }
    let outcome = source.render(track, |data| engine.push_bytes(data))?;

    let frames = engine.finish();
    match outcome {
        RenderOutcome::TimedOut if frames.is_empty() => {
            anyhow::bail!("timed out before a full window was rendered for {}", track.info.title)
        }
        RenderOutcome::Cancelled if frames.is_empty() => {
            anyhow::bail!("interrupted before a full window was rendered for {}", track.info.title)
        }
        _ => {}
    }

    log::info!(
        "Calculated spectrogram: {} frames for track {}",
        frames.len(),
        track.info.title
    );

    Ok(Spectrogram::new(frames, outcome != RenderOutcome::Completed))
}
