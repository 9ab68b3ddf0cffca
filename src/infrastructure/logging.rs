use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber, writing to a log file.
///
/// `RUST_LOG` wins over `default_filter`. When no log file can be opened
/// nothing is written at all, since stdout and stderr belong to the terminal UI.
pub fn init_tracing(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (log_file, warnings) = open_log_file(log_file_candidates());

    match log_file {
        Some((path, file)) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            tracing::info!(path = %path.display(), "logging initialized");
            for warning in warnings {
                tracing::warn!("{warning}");
            }
        }
        None => tracing_subscriber::registry().with(env_filter).init(),
    }
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("formstage").join("logs").join("formstage.log"));
    }
    candidates.push(PathBuf::from(".formstage").join("logs").join("formstage.log"));
    candidates
}

fn open_log_file(candidates: Vec<PathBuf>) -> (Option<(PathBuf, File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in candidates {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!("failed to create log dir {}: {e}", parent.display()));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => warnings.push(format!(
                "failed to open log file {}: {e}",
                candidate.display()
            )),
        }
    }

    (None, warnings)
}
