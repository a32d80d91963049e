use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::Local;
use log::{LevelFilter, Metadata, Record, SetLoggerError};

static LOGGER: OnceLock<ConsoleLogger> = OnceLock::new();
static BACKEND: OnceLock<LogBackend> = OnceLock::new();

/// Per-module filter directives, handled by `env_logger` when present
pub const FILTER_ENV: &str = "RUST_LOG";

/// Targets printed under their own label instead of the record level
const LABELLED_TARGETS: [(&str, &str); 2] = [("ble", "BLE"), ("tone", "TONE")];

/// Prints `[timestamp] [LEVEL]: message` lines to stderr.
/// Filtering follows the global `log::max_level`, so the level can change after install.
#[derive(Debug, Default)]
pub struct ConsoleLogger;

/// Which logger owns the `log` facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogBackend {
    /// [`ConsoleLogger`], level from configuration
    Console,
    /// `env_logger` driven by `RUST_LOG`, same line format
    EnvFilter,
}

/// `RUST_LOG` with any directive selects `env_logger`.
pub fn select_backend(filter: Option<&str>) -> LogBackend {
    match filter {
        Some(directives) if !directives.trim().is_empty() => LogBackend::EnvFilter,
        _ => LogBackend::Console,
    }
}

/// Parses a level name (e.g. "debug"); unknown names fall back to info.
pub fn parse_level(name: &str) -> LevelFilter {
    LevelFilter::from_str(name.trim()).unwrap_or(LevelFilter::Info)
}

impl ConsoleLogger {
    pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = LOGGER.get_or_init(ConsoleLogger::default);
        log::set_logger(logger).map(|()| log::set_max_level(level))
    }

    /// Installs the logger chosen by [`select_backend`] for the current environment.
    /// Returns `None` when a logger was already installed.
    pub fn init_with_level_name(level: &str) -> Option<LogBackend> {
        let backend = select_backend(std::env::var(FILTER_ENV).ok().as_deref());
        let installed = match backend {
            LogBackend::Console => ConsoleLogger::init(parse_level(level)).is_ok(),
            LogBackend::EnvFilter => env_logger::Builder::from_env(FILTER_ENV)
                .format(|buf, record| writeln!(buf, "{}", ConsoleLogger::format_line(record)))
                .try_init()
                .is_ok(),
        };
        if !installed {
            return None;
        }
        let _ = BACKEND.set(backend);
        Some(backend)
    }

    /// Changes the level of the console logger. `RUST_LOG` directives take precedence.
    pub fn set_level_name(level: &str) {
        if BACKEND.get() == Some(&LogBackend::Console) {
            log::set_max_level(parse_level(level));
        }
    }

    /// Formats one line
    pub fn format_line(record: &Record) -> String {
        let label = LABELLED_TARGETS
            .iter()
            .find(|(target, _)| *target == record.target())
            .map(|(_, label)| label.to_string())
            .unwrap_or_else(|| record.level().to_string());
        format!(
            "[{}] [{}]: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            label,
            record.args()
        )
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", Self::format_line(record));
        }
    }

    fn flush(&self) {}
}
