//! Shared helpers for the spectro command-line tools

pub mod input;
pub mod output;

/// Initialize logging; quiet by default so stdout stays parseable JSON
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env().filter_level(level).init();
}
