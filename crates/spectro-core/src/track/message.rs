//! Versioned binary track message
//!
//! Layout (big-endian):
//! ```text
//! u32  header      bits 0-29: body size, bit 30: versioned
//! u8   version     only when versioned (1..=3)
//! str  title
//! str  author
//! i64  length_ms
//! str  identifier
//! u8   is_stream
//! opt  uri                      (v2+)
//! opt  artwork_url, opt isrc    (v3+)
//! str  source_name
//! i64  position_ms
//! ```
//! `str` is a u16 byte length followed by UTF-8, `opt` is a u8 presence flag
//! followed by a `str`.

use super::{TrackCodec, TrackDescriptor, TrackInfo};
use crate::config::CodecConfig;
use thiserror::Error;

/// Version written by the encoder
pub const MESSAGE_VERSION: u8 = 3;

const SIZE_MASK: u32 = 0x3FFF_FFFF;
const FLAG_VERSIONED: u32 = 1 << 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("message truncated: {needed} more bytes needed at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("unsupported message version {0}")]
    UnsupportedVersion(u8),
    #[error("invalid UTF-8 in string field at offset {0}")]
    InvalidUtf8(usize),
    #[error("declared body size {declared} does not match the {actual} bytes present")]
    SizeMismatch { declared: usize, actual: usize },
    #[error("string field of {0} bytes exceeds the 65535 byte limit")]
    StringTooLong(usize),
    #[error("message body of {0} bytes does not fit the header size field")]
    MessageTooLarge(usize),
}

/// [`TrackCodec`] for the binary message format
#[derive(Debug, Clone)]
pub struct MessageTrackCodec {
    sources: Vec<String>,
}

impl Default for MessageTrackCodec {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}

impl MessageTrackCodec {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            sources: config.sources.clone(),
        }
    }

    pub fn accepts(&self, source_name: &str) -> bool {
        self.sources.iter().any(|s| s == source_name)
    }

    /// Parse a message without any source filtering
    pub fn decode_message(bytes: &[u8]) -> Result<TrackDescriptor, CodecError> {
        let mut header_reader = MessageReader::new(bytes);
        let header = header_reader.read_u32()?;

        let declared = (header & SIZE_MASK) as usize;
        let available = bytes.len() - 4;
        if declared > available {
            return Err(CodecError::Truncated {
                offset: 4 + available,
                needed: declared - available,
            });
        }
        if declared < available {
            return Err(CodecError::SizeMismatch {
                declared,
                actual: available,
            });
        }

        let mut reader = MessageReader::new(&bytes[4..]);
        let version = if header & FLAG_VERSIONED != 0 {
            reader.read_u8()?
        } else {
            1
        };
        if !(1..=MESSAGE_VERSION).contains(&version) {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let title = reader.read_utf()?;
        let author = reader.read_utf()?;
        let length_ms = reader.read_i64()?;
        let identifier = reader.read_utf()?;
        let is_stream = reader.read_u8()? != 0;
        let uri = if version >= 2 { reader.read_optional_utf()? } else { None };
        let (artwork_url, isrc) = if version >= 3 {
            (reader.read_optional_utf()?, reader.read_optional_utf()?)
        } else {
            (None, None)
        };
        let source_name = reader.read_utf()?;
        let position_ms = reader.read_i64()?;

        if reader.remaining() != 0 {
            return Err(CodecError::SizeMismatch {
                declared,
                actual: declared - reader.remaining(),
            });
        }

        Ok(TrackDescriptor {
            info: TrackInfo {
                title,
                author,
                length_ms,
                identifier,
                is_stream,
                uri,
                artwork_url,
                isrc,
            },
            source_name,
            position_ms,
        })
    }

    /// Serialize a descriptor as a version 3 message
    pub fn encode_message(track: &TrackDescriptor) -> Result<Vec<u8>, CodecError> {
        let mut body = MessageWriter::default();
        body.write_u8(MESSAGE_VERSION);
        body.write_utf(&track.info.title)?;
        body.write_utf(&track.info.author)?;
        body.write_i64(track.info.length_ms);
        body.write_utf(&track.info.identifier)?;
        body.write_u8(u8::from(track.info.is_stream));
        body.write_optional_utf(track.info.uri.as_deref())?;
        body.write_optional_utf(track.info.artwork_url.as_deref())?;
        body.write_optional_utf(track.info.isrc.as_deref())?;
        body.write_utf(&track.source_name)?;
        body.write_i64(track.position_ms);

        let body = body.into_inner();
        if body.len() > SIZE_MASK as usize {
            return Err(CodecError::MessageTooLarge(body.len()));
        }

        let mut message = Vec::with_capacity(body.len() + 4);
        message.extend_from_slice(&(FLAG_VERSIONED | body.len() as u32).to_be_bytes());
        message.extend_from_slice(&body);
        Ok(message)
    }
}

impl TrackCodec for MessageTrackCodec {
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<Option<TrackDescriptor>> {
        let track = Self::decode_message(bytes)?;
        if !self.accepts(&track.source_name) {
            log::debug!(
                "No source accepts track {:?} from source '{}'",
                track.info.title,
                track.source_name
            );
            return Ok(None);
        }
        Ok(Some(track))
    }

    fn encode(&self, track: &TrackDescriptor) -> anyhow::Result<Vec<u8>> {
        Ok(Self::encode_message(track)?)
    }
}

struct MessageReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    fn read_utf(&mut self) -> Result<String, CodecError> {
        let len = usize::from(self.read_u16()?);
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8(offset))
    }

    fn read_optional_utf(&mut self) -> Result<Option<String>, CodecError> {
        if self.read_u8()? != 0 {
            self.read_utf().map(Some)
        } else {
            Ok(None)
        }
    }
}

#[derive(Default)]
struct MessageWriter {
    buf: Vec<u8>,
}

impl MessageWriter {
    fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_utf(&mut self, value: &str) -> Result<(), CodecError> {
        let len = u16::try_from(value.len()).map_err(|_| CodecError::StringTooLong(value.len()))?;
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn write_optional_utf(&mut self, value: Option<&str>) -> Result<(), CodecError> {
        match value {
            Some(v) => {
                self.write_u8(1);
                self.write_utf(v)
            }
            None => {
                self.write_u8(0);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track(source: &str) -> TrackDescriptor {
        TrackDescriptor {
            info: TrackInfo {
                title: "Nocturne".to_string(),
                author: "Chopin".to_string(),
                length_ms: 272_000,
                identifier: "/music/nocturne.flac".to_string(),
                is_stream: false,
                uri: Some("/music/nocturne.flac".to_string()),
                artwork_url: None,
                isrc: Some("USRC17607839".to_string()),
            },
            source_name: source.to_string(),
            position_ms: 0,
        }
    }

    /// Hand-built version 1 message (no version byte, no optional fields)
    fn legacy_message() -> Vec<u8> {
        let mut body = MessageWriter::default();
        body.write_utf("Radio").unwrap();
        body.write_utf("Station").unwrap();
        body.write_i64(i64::MAX);
        body.write_utf("http://radio.example/live").unwrap();
        body.write_u8(1);
        body.write_utf("http").unwrap();
        body.write_i64(0);
        let body = body.into_inner();

        let mut msg = (body.len() as u32).to_be_bytes().to_vec();
        msg.extend_from_slice(&body);
        msg
    }

    #[test]
    fn test_header_layout() {
        let bytes = MessageTrackCodec::encode_message(&sample_track("local")).unwrap();
        let header = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_ne!(header & FLAG_VERSIONED, 0);
        assert_eq!((header & SIZE_MASK) as usize, bytes.len() - 4);
        assert_eq!(bytes[4], MESSAGE_VERSION);
    }

    #[test]
    fn test_decode_legacy_version() {
        let track = MessageTrackCodec::decode_message(&legacy_message()).unwrap();
        assert_eq!(track.info.title, "Radio");
        assert!(track.info.is_stream);
        assert_eq!(track.info.uri, None);
        assert_eq!(track.source_name, "http");
    }

    #[test]
    fn test_unknown_source_is_a_miss() {
        let codec = MessageTrackCodec::default();
        let bytes = MessageTrackCodec::encode_message(&sample_track("soundcloud")).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), None);

        let bytes = MessageTrackCodec::encode_message(&sample_track("local")).unwrap();
        assert!(codec.decode(&bytes).unwrap().is_some());
    }

    #[test]
    fn test_truncated_message() {
        let bytes = MessageTrackCodec::encode_message(&sample_track("local")).unwrap();
        let err = MessageTrackCodec::decode_message(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { needed: 3, .. }));

        let err = MessageTrackCodec::decode_message(&[0x40, 0x00]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = MessageTrackCodec::encode_message(&sample_track("local")).unwrap();
        bytes.push(0);
        let err = MessageTrackCodec::decode_message(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::SizeMismatch { .. }));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = MessageTrackCodec::encode_message(&sample_track("local")).unwrap();
        bytes[4] = 9;
        assert_eq!(
            MessageTrackCodec::decode_message(&bytes).unwrap_err(),
            CodecError::UnsupportedVersion(9)
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let mut bytes = MessageTrackCodec::encode_message(&sample_track("local")).unwrap();
        // First title byte sits after header, version and length prefix
        bytes[7] = 0xFF;
        assert_eq!(
            MessageTrackCodec::decode_message(&bytes).unwrap_err(),
            CodecError::InvalidUtf8(3)
        );
    }

    #[test]
    fn test_string_too_long() {
        let mut track = sample_track("local");
        track.info.title = "x".repeat(70_000);
        assert_eq!(
            MessageTrackCodec::encode_message(&track).unwrap_err(),
            CodecError::StringTooLong(70_000)
        );
    }
}
