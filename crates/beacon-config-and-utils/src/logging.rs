//! Logging initialization.
//!
//! Every Beacon process writes structured JSON lines to
//! `~/.beacon/logs/beacon.jsonl` and, optionally, compact lines to stderr.
//! `RUST_LOG` overrides the configured level.

use crate::Paths;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Append-only writer for the central log file.
///
/// Each write is flushed so that lines from concurrent processes stay whole.
#[derive(Clone)]
pub struct CentralLogWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl CentralLogWriter {
    /// Open (or create) the log file in append mode, creating parent directories.
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for CentralLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for CentralLogWriter {
    type Writer = CentralLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Initialize the logging system.
///
/// Installs a JSON-lines file layer at `paths.log_file()` and, when
/// `also_stderr` is set, a compact stderr layer. If the log file cannot be
/// opened the stderr layer is used alone. Calling this twice is a no-op.
///
/// ```ignore
/// init_logging("info", &Paths::new()?, true);
/// tracing::info!("pipeline started");
/// ```
pub fn init_logging(level: &str, paths: &Paths, also_stderr: bool) {
    let log_path = paths.log_file();
    let file_writer = CentralLogWriter::new(&log_path);
    let file_opened = file_writer.is_ok();

    let json_layer = file_writer.ok().map(|writer| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(writer)
            .with_filter(env_filter(level))
    });

    let stderr_layer = if also_stderr || !file_opened {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_writer(io::stderr)
                .with_filter(env_filter(level)),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        if file_opened {
            tracing::info!(log_path = %log_path.display(), "logging initialized");
        } else {
            tracing::warn!(
                log_path = %log_path.display(),
                "could not open log file, logging to stderr only"
            );
        }
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(parse_level(level).as_str()))
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
