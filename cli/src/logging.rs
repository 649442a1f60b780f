use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
};

use fakeblok_config::FakeblokConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Servers log to stderr.
pub fn init_stderr_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter())
        .init();
}

/// The terminal client logs to `~/.fakeblok/logs/fakeblok.log`, or
/// `./.fakeblok/logs/fakeblok.log` when the home directory is not writable.
pub fn init_file_tracing() {
    let env_filter = env_filter();
    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: drop logs rather than draw over the arena.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = FakeblokConfig::dir() {
        candidates.push(dir.join("logs").join("fakeblok.log"));
    }
    candidates.push(PathBuf::from(".fakeblok").join("logs").join("fakeblok.log"));
    candidates
}
