//! spectrogen - Compute spectrograms for local files or track identifiers
//!
//! Usage: spectrogen [--config FILE] [--id ID]... [PATH]...

use anyhow::Result;
use clap::Parser;
use spectro_cli::input::{collect_requests, Request};
use spectro_cli::output::{print_json_results, SpectrogramEntry};
use spectro_core::SpectroConfig;
use std::path::PathBuf;
use tokio::task::JoinSet;

#[derive(Parser, Debug)]
#[command(name = "spectrogen")]
#[command(about = "Compute log-band spectrograms for audio tracks", long_about = None)]
struct Args {
    /// Local audio files
    paths: Vec<PathBuf>,

    /// Base64 track identifiers
    #[arg(long = "id")]
    ids: Vec<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only report frame counts, not frame data
    #[arg(long)]
    summary: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    spectro_cli::init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => {
            let config = SpectroConfig::load(path)?;
            log::info!("Loaded config from {}", path.display());
            config
        }
        None => SpectroConfig::default(),
    };

    let service = spectro_core::local_service(config)?;

    if args.paths.is_empty() && args.ids.is_empty() {
        anyhow::bail!("No input given: pass audio paths or --id values");
    }

    let requests = collect_requests(&args.paths, &args.ids, service.resolver());
    log::info!("Requesting {} spectrograms", requests.len());
    let start = std::time::Instant::now();

    let mut entries = Vec::with_capacity(requests.len());
    let mut tasks = JoinSet::new();
    for (index, request) in requests.into_iter().enumerate() {
        match request {
            Request::Identifier(identifier) => {
                let service = service.clone();
                tasks.spawn(async move {
                    let outcome = service.spectrogram(&identifier).await;
                    (index, identifier, outcome)
                });
            }
            Request::Unreadable { path, reason } => {
                entries.push((index, SpectrogramEntry::unreadable(path, &reason)));
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        let (index, identifier, outcome) = joined?;
        entries.push((index, SpectrogramEntry::from_outcome(identifier, &outcome, !args.summary)));
    }
    entries.sort_by_key(|(index, _)| *index);
    let entries: Vec<_> = entries.into_iter().map(|(_, entry)| entry).collect();

    log::info!(
        "Finished {} requests in {:.2}s ({} cached spectrograms)",
        entries.len(),
        start.elapsed().as_secs_f64(),
        service.cache().len()
    );

    print_json_results(&entries, args.pretty);

    Ok(())
}
