//! Colored console logger routed through the shared progress bars.

use indicatif_log_bridge::LogWrapper;
use log::{Level, LevelFilter, Metadata, Record};
use std::io::IsTerminal;

use crate::progress::MULTI;

const INFO_COLOR: &str = "\x1b[1;32m";
const WARNING_COLOR: &str = "\x1b[1;33m";
const ERROR_COLOR: &str = "\x1b[1;31m";
const RESET_COLOR: &str = "\x1b[0m";

struct ColoredLogger {
    level: LevelFilter,
    color: bool,
}

impl log::Log for ColoredLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => Some(ERROR_COLOR),
            Level::Warn => Some(WARNING_COLOR),
            Level::Info => Some(INFO_COLOR),
            Level::Debug | Level::Trace => None,
        };
        match color.filter(|_| self.color) {
            Some(color) => eprintln!("{} - {}{}{}", record.level(), color, record.args(), RESET_COLOR),
            None => eprintln!("{} - {}", record.level(), record.args()),
        }
    }

    fn flush(&self) {}
}

/// Install the logger. `verbose` enables debug output.
pub fn init(verbose: bool) -> Result<(), log::SetLoggerError> {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let logger = ColoredLogger {
        level,
        color: std::io::stderr().is_terminal(),
    };
    LogWrapper::new(MULTI.clone(), logger).try_init()?;
    log::set_max_level(level);
    Ok(())
}
