//! Logging configuration for query-chat.
//!
//! The interactive CLI prints the conversation to stdout, so logs go to stderr
//! by default, or to a file when the user asks for quiet output.

use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Sends logs to [`get_log_path`] so they stay out of the chat transcript.
///
/// Falls back to stderr if the file cannot be created.
pub fn init_file_logging() {
    match open_log_file() {
        Ok(log_file) => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(log_file)
            .with_ansi(false)
            .init(),
        Err(e) => {
            eprintln!("Warning: Could not open log file: {e}");
            init_stderr_logging();
        }
    }
}

/// Creates the log directory and truncates the log file.
fn open_log_file() -> io::Result<File> {
    let log_path = get_log_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(log_path)
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the path for the log file.
///
/// Platforms without an XDG state directory use the local data directory.
pub fn get_log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("query-chat")
        .join("query-chat.log")
}
