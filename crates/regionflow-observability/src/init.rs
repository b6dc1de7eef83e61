// Copyright 2025 Regionflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for regionflow binaries
//!
//! Console output always; with the `file-logging` feature a JSON run log is written as well.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps file writers alive; dropping it flushes pending log lines
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    run_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder receiving the JSON log, if file logging is active
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }
}

/// Initialize the global subscriber
///
/// With `config.log_dir` set and the `file-logging` feature enabled, creates:
/// ```text
/// {log_dir}/
///   └── run_20250101_120000/
///       └── regionflow.log   (JSON, one event per line)
/// ```
/// Older run folders are pruned by age and by count.
///
/// # Errors
/// Fails if the run folder cannot be created or a global subscriber is already set.
pub fn init_logging(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string_with_base(&config.level);
    // EnvFilter is not Clone; every layer gets its own
    let make_filter =
        || EnvFilter::try_new(&filter).with_context(|| format!("Invalid log filter: {}", filter));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_layer: BoxedLayer = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_filter(make_filter()?)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(make_filter()?)
            .boxed(),
    };
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let (file_guards, run_dir) = match &config.log_dir {
        Some(base) => {
            let run_dir = create_run_dir(base)?;
            cleanup_old_logs(base, config.retention_days, config.retention_runs)?;

            let appender = tracing_appender::rolling::never(&run_dir, "regionflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .with_filter(make_filter()?)
                    .boxed(),
            );
            (vec![guard], Some(run_dir))
        }
        None => (Vec::new(), None),
    };

    #[cfg(not(feature = "file-logging"))]
    let run_dir: Option<PathBuf> = None;

    Registry::default()
        .with(layers)
        .try_init()
        .context("Global tracing subscriber already set")?;

    #[cfg(not(feature = "file-logging"))]
    if let Some(base) = &config.log_dir {
        tracing::warn!(
            "log_dir {} ignored: built without the file-logging feature",
            base.display()
        );
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        run_dir,
    })
}

/// Initialize console logging at `info` with flags from the process arguments and environment
pub fn init_logging_default() -> Result<LoggingGuard> {
    init_logging(&crate::cli::parse_debug_flags(), &LoggingConfig::default())
}

#[cfg(feature = "file-logging")]
const RUN_PREFIX: &str = "run_";

#[cfg(feature = "file-logging")]
const RUN_STAMP: &str = "%Y%m%d_%H%M%S";

#[cfg(feature = "file-logging")]
fn create_run_dir(base: &Path) -> Result<PathBuf> {
    let stamp = chrono::Utc::now().format(RUN_STAMP);
    let run_dir = base.join(format!("{}{}", RUN_PREFIX, stamp));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create log directory: {}", run_dir.display()))?;
    Ok(run_dir)
}

/// Remove run folders older than `retention_days`, then all but the newest `retention_runs`
#[cfg(feature = "file-logging")]
pub(crate) fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
) -> Result<()> {
    use chrono::{DateTime, NaiveDateTime, Utc};

    if !base_log_dir.exists() {
        return Ok(());
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(RUN_PREFIX));
        if let Some(stamp) = stamp {
            if let Ok(started) = NaiveDateTime::parse_from_str(stamp, RUN_STAMP) {
                runs.push((path, started.and_utc()));
            }
        }
    }

    // oldest first
    runs.sort_by_key(|(_, started)| *started);

    let (expired, kept): (Vec<_>, Vec<_>) =
        runs.into_iter().partition(|(_, started)| *started < cutoff);
    let excess = kept.len().saturating_sub(retention_runs);

    for (path, _) in expired.iter().chain(kept.iter().take(excess)) {
        if let Err(e) = std::fs::remove_dir_all(path) {
            eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            );
        }
    }

    Ok(())
}

#[cfg(all(test, feature = "file-logging"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cleanup_keeps_newest_runs() {
        let dir = tempdir().unwrap();
        let now = chrono::Utc::now();
        let mut names = Vec::new();
        for minutes in [30, 20, 10, 0] {
            let stamp = (now - chrono::Duration::minutes(minutes)).format(RUN_STAMP);
            let name = format!("run_{}", stamp);
            std::fs::create_dir_all(dir.path().join(&name)).unwrap();
            names.push(name);
        }
        std::fs::create_dir_all(dir.path().join("run_1999")).unwrap();
        std::fs::create_dir_all(dir.path().join("run_19990101_000000")).unwrap();

        cleanup_old_logs(dir.path(), 30, 2).unwrap();

        assert!(!dir.path().join(&names[0]).exists());
        assert!(!dir.path().join(&names[1]).exists());
        assert!(dir.path().join(&names[2]).exists());
        assert!(dir.path().join(&names[3]).exists());
        // unparseable names are left alone, expired ones removed
        assert!(dir.path().join("run_1999").exists());
        assert!(!dir.path().join("run_19990101_000000").exists());
    }

    #[test]
    fn test_cleanup_missing_dir_is_ok() {
        let dir = tempdir().unwrap();
        cleanup_old_logs(&dir.path().join("absent"), 1, 1).unwrap();
    }
}
