//! Stderr backend for the `log` facade
//!
//! Kernel printk-style output: one locked write per line with a level
//! prefix, optionally flushed after every line so nothing is lost when a
//! process forks or execs right after logging.
//!
//! # Environment Variables
//!
//! - `SIGRELAY_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (or 0-5)
//! - `SIGRELAY_FLUSH_EPRINT=1` - flush stderr after each line
//!
//! # Usage
//!
//! ```ignore
//! sigrelay_core::logger::init();
//! log::info!("relay ready on fd {}", fd);
//! ```

use crate::env::{env_get_bool, env_get_opt};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static LOGGER: StderrLogger = StderrLogger;

/// `log::Log` implementation writing to stderr
pub struct StderrLogger;

fn prefix(level: Level) -> &'static str {
    match level {
        Level::Error => "[ERROR]",
        Level::Warn => "[WARN] ",
        Level::Info => "[INFO] ",
        Level::Debug => "[DEBUG]",
        Level::Trace => "[TRACE]",
    }
}

/// Parse a level name or number; unknown spellings map to `Info`
pub fn parse_level(val: &str) -> LevelFilter {
    match val.trim().to_lowercase().as_str() {
        "off" | "0" => LevelFilter::Off,
        "error" | "1" => LevelFilter::Error,
        "warn" | "2" => LevelFilter::Warn,
        "info" | "3" => LevelFilter::Info,
        "debug" | "4" => LevelFilter::Debug,
        "trace" | "5" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        let _ = writeln!(
            handle,
            "{} {}: {}",
            prefix(record.level()),
            record.target(),
            record.args()
        );
        if FLUSH_ENABLED.load(Ordering::Relaxed) {
            let _ = handle.flush();
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the stderr logger, configured from the environment
///
/// Safe to call more than once; only the first call installs the logger.
/// Returns false if another logger was already installed by the host.
pub fn init() -> bool {
    let level = env_get_opt::<String>("SIGRELAY_LOG_LEVEL")
        .map(|v| parse_level(&v))
        .unwrap_or(LevelFilter::Info);
    init_with_level(level)
}

/// Install the stderr logger with an explicit level
pub fn init_with_level(level: LevelFilter) -> bool {
    FLUSH_ENABLED.store(env_get_bool("SIGRELAY_FLUSH_EPRINT", false), Ordering::Relaxed);
    match log::set_logger(&LOGGER) {
        Ok(()) => {
            log::set_max_level(level);
            true
        }
        Err(_) => false,
    }
}

/// Set flush mode programmatically
pub fn set_flush_enabled(enabled: bool) {
    FLUSH_ENABLED.store(enabled, Ordering::Relaxed);
}
