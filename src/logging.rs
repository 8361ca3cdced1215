//! Logger setup for the nodewatch binary.

use anyhow::{Context, Result};
use env_logger::Builder;
use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// A writer that writes to both stdout and a file
struct MultiWriter {
    stdout: std::io::Stdout,
    file: File,
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stdout.write_all(buf)?;
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stdout.flush()?;
        self.file.flush()
    }
}

/// Parse a log level name, falling back to info
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'info'", level);
            LevelFilter::Info
        }
    }
}

/// Initialize env_logger. With a log file, output goes to stdout and the file.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_default_env();
    builder.filter_level(parse_level(level));

    if let Some(path) = log_file {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(MultiWriter {
            stdout: std::io::stdout(),
            file,
        })));
    }

    // Ignore error if logger is already initialized
    builder.try_init().ok();
    Ok(())
}
