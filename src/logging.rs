use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Where log lines go when no log file is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    Stdout,
    /// Drop everything; used by the TUI so the screen stays clean
    Discard,
}

/// `RUST_LOG` wins over the configured filter
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install the global tracing subscriber
pub fn init_logging(default_filter: &str, log_file: Option<&Path>, fallback: LogSink) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(default_filter));

    match (log_file, fallback) {
        (Some(path), _) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        (None, LogSink::Stdout) => builder.init(),
        (None, LogSink::Discard) => builder.with_writer(std::io::sink).init(),
    }

    Ok(())
}
