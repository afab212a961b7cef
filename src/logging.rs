//! Tracing setup for the server and the chat binary.
//!
//! Both binaries log to the console and to a log file. The server logs at `info` on stdout.
//! `docqa-chat` uses stdout for prompts and answers, so its console logs go to stderr at `warn`.
//! The file is `DOCQA_LOG_FILE` when set, otherwise `logs/docqa.log`, and is written by a
//! non-blocking worker.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_FILE: &str = "logs/docqa.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where console log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleOutput {
    /// Standard output, for the HTTP server.
    Stdout,
    /// Standard error, for binaries that use stdout themselves.
    Stderr,
}

/// Per-binary logging choices.
#[derive(Debug, Clone, Copy)]
pub struct LogSettings<'a> {
    /// Filter used when `RUST_LOG` is unset.
    pub default_directive: &'a str,
    /// Console stream.
    pub console: ConsoleOutput,
}

impl LogSettings<'static> {
    /// Settings for the HTTP server.
    pub fn server() -> Self {
        Self {
            default_directive: "info",
            console: ConsoleOutput::Stdout,
        }
    }

    /// Settings for the interactive chat binary.
    pub fn chat() -> Self {
        Self {
            default_directive: "warn",
            console: ConsoleOutput::Stderr,
        }
    }
}

/// Install the global subscriber. The file writer guard lives for the rest of the process.
pub fn init_tracing(settings: LogSettings<'_>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.default_directive));
    let console_writer = match settings.console {
        ConsoleOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        ConsoleOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
    };
    let console_layer = fmt::layer()
        .with_writer(console_writer)
        .with_target(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let log_path = log_file_path(std::env::var("DOCQA_LOG_FILE").ok());
    match open_log_file(&log_path) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

/// Log file location: the override when it is non-blank, otherwise the default.
fn log_file_path(override_path: Option<String>) -> PathBuf {
    override_path
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

fn open_log_file(path: &Path) -> Option<NonBlocking> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Some(file_name) = path.file_name() else {
        eprintln!("Log file path has no file name: {}", path.display());
        return None;
    };
    if let Err(err) = std::fs::create_dir_all(directory) {
        eprintln!("Failed to create log directory {}: {err}", directory.display());
        return None;
    }

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
