//! trackenc - Encode a local audio file as a track identifier
//!
//! Usage: trackenc <input_audio_path> [--title T] [--author A] [--stream]

use anyhow::Result;
use clap::Parser;
use spectro_cli::input::{describe_file, TrackOverrides};
use spectro_core::{MessageTrackCodec, TrackResolver};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "trackenc")]
#[command(about = "Encode a local audio file as a base64 track identifier", long_about = None)]
struct Args {
    /// Input audio file path
    input_audio_path: PathBuf,

    /// Track title (defaults to the file name)
    #[arg(long)]
    title: Option<String>,

    /// Track author
    #[arg(long)]
    author: Option<String>,

    /// Mark the track as a live stream
    #[arg(long)]
    stream: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    spectro_cli::init_logging(args.verbose);

    let overrides = TrackOverrides {
        title: args.title,
        author: args.author,
        stream: args.stream,
    };
    let track = describe_file(&args.input_audio_path, &overrides)?;
    log::info!(
        "Encoding {} ({} ms, stream: {})",
        track.info.title,
        track.info.length_ms,
        track.info.is_stream
    );

    let resolver = TrackResolver::new(Arc::new(MessageTrackCodec::default()));
    println!("{}", resolver.encode_identifier(&track)?);

    Ok(())
}
