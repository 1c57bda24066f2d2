//! JSON output formatting

use serde::Serialize;
use spectro_core::{Spectrogram, SpectrogramOutcome, BAND_COUNT};
use std::sync::Arc;

/// One request as reported on stdout
#[derive(Debug, Serialize)]
pub struct SpectrogramEntry {
    pub identifier: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub frames: usize,
    pub band_count: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectrogram: Option<Arc<Spectrogram>>,
}

impl SpectrogramEntry {
    pub fn from_outcome(identifier: String, outcome: &SpectrogramOutcome, include_frames: bool) -> Self {
        let reason = match outcome {
            SpectrogramOutcome::Unavailable(reason) => Some(reason.to_string()),
            _ => None,
        };
        let spectrogram = outcome.spectrogram();

        Self {
            identifier,
            status: outcome.status(),
            reason,
            frames: spectrogram.as_ref().map_or(0, |s| s.len()),
            band_count: BAND_COUNT,
            truncated: spectrogram.as_ref().is_some_and(|s| s.truncated),
            spectrogram: spectrogram.filter(|_| include_frames),
        }
    }

    /// Entry for an input that never reached the service
    pub fn unreadable(path: String, reason: &str) -> Self {
        Self {
            identifier: path,
            status: "unavailable",
            reason: Some(format!("unreadable input: {}", reason)),
            frames: 0,
            band_count: BAND_COUNT,
            truncated: false,
            spectrogram: None,
        }
    }
}

#[derive(Serialize)]
struct SpectrogramReport<'a> {
    requests: usize,
    available: usize,
    results: &'a [SpectrogramEntry],
}

/// Render entries as a JSON report
pub fn render_json(entries: &[SpectrogramEntry], pretty: bool) -> serde_json::Result<String> {
    let report = SpectrogramReport {
        requests: entries.len(),
        available: entries.iter().filter(|e| e.status != "unavailable").count(),
        results: entries,
    };

    if pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
}

/// Print entries as a JSON report
pub fn print_json_results(entries: &[SpectrogramEntry], pretty: bool) {
    match render_json(entries, pretty) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results: {}", e),
    }
}
