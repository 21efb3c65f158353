// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Quiet,
    Normal,
    Verbose,
    Trace,
}

impl LogLevel {
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => LogLevel::Quiet,
            (false, 0) => LogLevel::Normal,
            (false, 1) => LogLevel::Verbose,
            (false, _) => LogLevel::Trace,
        }
    }

    /// Library records let through at this level.
    pub fn filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Quiet => log::LevelFilter::Error,
            LogLevel::Normal => log::LevelFilter::Warn,
            LogLevel::Verbose => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LogLevel::Quiet,
            1 => LogLevel::Normal,
            2 => LogLevel::Verbose,
            _ => LogLevel::Trace,
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(1);

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    log::set_max_level(level.filter());
}

pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Forwards `log` records from the libraries to stderr.
struct CliLogger;

static LOGGER: CliLogger = CliLogger;

impl log::Log for CliLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log_level().filter()
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let target = record.target().split("::").next().unwrap_or("");
        eprintln!(
            "[sdrcat] {:<5} {target}: {}",
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Installs the logger once; later calls only change the level.
pub fn init_logger(level: LogLevel) {
    let _ = log::set_logger(&LOGGER);
    set_log_level(level);
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if $crate::utils::log_level() != $crate::utils::LogLevel::Quiet {
            eprintln!("[sdrcat] {}", format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_verbose {
    ($($arg:tt)*) => {
        if matches!(
            $crate::utils::log_level(),
            $crate::utils::LogLevel::Verbose | $crate::utils::LogLevel::Trace
        ) {
            eprintln!("[sdrcat] {}", format_args!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_flags() {
        assert_eq!(LogLevel::from_flags(true, 3), LogLevel::Quiet);
        assert_eq!(LogLevel::from_flags(false, 0), LogLevel::Normal);
        assert_eq!(LogLevel::from_flags(false, 1), LogLevel::Verbose);
        assert_eq!(LogLevel::from_flags(false, 2), LogLevel::Trace);
    }

    #[test]
    fn test_level_round_trips_through_atomic() {
        for level in [LogLevel::Quiet, LogLevel::Normal, LogLevel::Verbose, LogLevel::Trace] {
            assert_eq!(LogLevel::from_u8(level as u8), level);
        }
        assert_eq!(LogLevel::Normal.filter(), log::LevelFilter::Warn);
    }
}
