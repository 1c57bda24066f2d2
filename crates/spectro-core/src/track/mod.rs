//! Track identifiers and their resolution into playable descriptors

mod message;

pub use message::{CodecError, MessageTrackCodec, MESSAGE_VERSION};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Metadata carried by a decoded track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub author: String,
    pub length_ms: i64,
    /// Source-specific identifier (a file path for local tracks)
    pub identifier: String,
    pub is_stream: bool,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
}

impl TrackInfo {
    /// Location a renderer should open
    pub fn location(&self) -> &str {
        self.uri.as_deref().unwrap_or(&self.identifier)
    }
}

/// A decoded, playable track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub info: TrackInfo,
    pub source_name: String,
    pub position_ms: i64,
}

impl TrackDescriptor {
    pub fn new(info: TrackInfo, source_name: impl Into<String>) -> Self {
        Self {
            info,
            source_name: source_name.into(),
            position_ms: 0,
        }
    }

    pub fn is_stream(&self) -> bool {
        self.info.is_stream
    }
}

/// Track decoding collaborator
pub trait TrackCodec: Send + Sync {
    /// Decode raw identifier bytes; `Ok(None)` means no playable track
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<Option<TrackDescriptor>>;

    fn encode(&self, track: &TrackDescriptor) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("identifier is not valid base64: {0}")]
    InvalidIdentifier(#[from] base64::DecodeError),
    #[error("track decode failed: {0:#}")]
    Decode(anyhow::Error),
}

/// Turns opaque base64 identifiers into track descriptors
#[derive(Clone)]
pub struct TrackResolver {
    codec: Arc<dyn TrackCodec>,
}

impl TrackResolver {
    pub fn new(codec: Arc<dyn TrackCodec>) -> Self {
        Self { codec }
    }

    pub fn resolve(&self, identifier: &str) -> Result<Option<TrackDescriptor>, ResolveError> {
        let bytes = BASE64.decode(identifier.trim())?;
        self.codec.decode(&bytes).map_err(ResolveError::Decode)
    }

    pub fn encode_identifier(&self, track: &TrackDescriptor) -> anyhow::Result<String> {
        let bytes = self.codec.encode(track)?;
        Ok(BASE64.encode(bytes))
    }
}
