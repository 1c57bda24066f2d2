//! Turning local files into track descriptors

use anyhow::{Context, Result};
use spectro_core::audio::decode_audio;
use spectro_core::{TrackDescriptor, TrackInfo, TrackResolver};
use std::path::{Path, PathBuf};

/// Source name used for local files
pub const LOCAL_SOURCE: &str = "local";

/// Optional metadata overrides for a local track
#[derive(Debug, Clone, Default)]
pub struct TrackOverrides {
    pub title: Option<String>,
    pub author: Option<String>,
    pub stream: bool,
}

/// Describe a local audio file, measuring its length by decoding it
pub fn describe_file(path: &Path, overrides: &TrackOverrides) -> Result<TrackDescriptor> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Input file not found: {}", path.display()))?;

    let length_ms = if overrides.stream {
        i64::MAX
    } else {
        i64::from(decode_audio(&path)?.duration_ms)
    };

    let title = overrides.title.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    Ok(TrackDescriptor::new(
        TrackInfo {
            title,
            author: overrides.author.clone().unwrap_or_else(|| "Unknown".to_string()),
            length_ms,
            identifier: path.display().to_string(),
            is_stream: overrides.stream,
            uri: None,
            artwork_url: None,
            isrc: None,
        },
        LOCAL_SOURCE,
    ))
}

/// One input of a spectrogram run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Track identifier ready to be looked up
    Identifier(String),
    /// Local file that could not be turned into an identifier
    Unreadable { path: String, reason: String },
}

/// Build requests for local files (in order) followed by explicit identifiers
///
/// A file that cannot be described becomes [`Request::Unreadable`] so the
/// remaining inputs still run.
pub fn collect_requests(paths: &[PathBuf], ids: &[String], resolver: &TrackResolver) -> Vec<Request> {
    let mut requests = Vec::with_capacity(paths.len() + ids.len());

    for path in paths {
        let encoded = describe_file(path, &TrackOverrides::default())
            .and_then(|track| resolver.encode_identifier(&track));
        match encoded {
            Ok(identifier) => requests.push(Request::Identifier(identifier)),
            Err(e) => {
                log::warn!("Cannot read {}: {:#}", path.display(), e);
                requests.push(Request::Unreadable {
                    path: path.display().to_string(),
                    reason: format!("{:#}", e),
                });
            }
        }
    }

    requests.extend(ids.iter().cloned().map(Request::Identifier));
    requests
}
