//! Logger setup for the command line tool.
//!
//! Records go through the `log` facade to `env_logger`, which writes them to
//! the screen, to a timestamped log file, or to both. The default level is
//! `info` and can be changed with `RUST_LOG`.

use std::{
    fs::File,
    io::{self, Write},
    path::PathBuf,
};

use chrono::Local;
use env_logger::{Builder, Env, Target};

use crate::error::ExportError;

/// Duplicates every write to the screen and an optional file.
struct TeeWriter {
    screen: Option<io::Stderr>,
    file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(screen) = self.screen.as_mut() {
            screen.write_all(buf)?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(screen) = self.screen.as_mut() {
            screen.flush()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Name of the log file of a run started now, e.g.
/// `csv-sql-exporter - 2024-03-07 14-05-09.log`.
pub fn log_file_name(tool_name: &str) -> PathBuf {
    PathBuf::from(format!(
        "{} - {}.log",
        tool_name,
        Local::now().format("%Y-%m-%d %H-%M-%S")
    ))
}

/// Installs the global logger.
///
/// Returns the path of the log file when one was created.
pub fn init(
    tool_name: &str,
    log_to_file: bool,
    output_to_screen: bool,
) -> Result<Option<PathBuf>, ExportError> {
    let log_file = log_to_file.then(|| log_file_name(tool_name));
    let file = log_file.as_ref().map(File::create).transpose()?;

    let writer = TeeWriter {
        screen: output_to_screen.then(io::stderr),
        file,
    };

    Builder::from_env(Env::default().default_filter_or("info"))
        .format_target(false)
        .target(Target::Pipe(Box::new(writer)))
        .try_init()
        .map_err(|error| ExportError::Configuration(error.to_string()))?;

    Ok(log_file)
}
