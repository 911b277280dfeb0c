use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use rebuild_platform::AppPaths;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

/// `debug.log` -> `debug.log.old`.
fn rotated_path(log_path: &Path) -> PathBuf {
    let mut name = log_path.as_os_str().to_os_string();
    name.push(".old");
    PathBuf::from(name)
}

/// Moves the log aside once it grows past `max_log_size`, replacing the
/// previous rotation. Returns whether a rotation happened.
fn rotate_if_oversized(log_path: &Path, max_log_size: u64) -> io::Result<bool> {
    let size = match std::fs::metadata(log_path) {
        Ok(metadata) => metadata.len(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(error) => return Err(error),
    };
    if size <= max_log_size {
        return Ok(false);
    }
    std::fs::rename(log_path, rotated_path(log_path))?;
    Ok(true)
}

fn open_log(log_path: &Path) -> io::Result<File> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(log_path)
}

fn log_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("rebuild")
        .build()
}

fn level_for(verbose: bool, quiet: LevelFilter) -> LevelFilter {
    if verbose { LevelFilter::Debug } else { quiet }
}

/// The log file records everything at Debug. The terminal shows warnings and
/// errors unless `verbose` is set.
pub fn init_logging(paths: &AppPaths, verbose: bool, max_log_size: u64) {
    let log_path = paths.log_file();
    let rotation = rotate_if_oversized(&log_path, max_log_size);

    let config = log_config();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::with_capacity(2);
    loggers.push(TermLogger::new(
        level_for(verbose, LevelFilter::Warn),
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ));
    match open_log(&log_path) {
        Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, config, file)),
        Err(error) => eprintln!("Could not open log file {}: {error}", log_path.display()),
    }
    let _ = CombinedLogger::init(loggers);

    set_verbose(verbose);
    match rotation {
        Ok(true) => log::debug!("Rotated log to {}", rotated_path(&log_path).display()),
        Ok(false) => {}
        Err(error) => log::warn!("Could not rotate {}: {error}", log_path.display()),
    }
    log::debug!("Logging to {}", log_path.display());
}

pub fn set_verbose(enabled: bool) {
    log::set_max_level(level_for(enabled, LevelFilter::Info));
}
