//! Logging setup for bndl
//!
//! `BNDL_LOG_LEVEL` selects the level. A `json:` prefix (or the bare value
//! `json`) switches to one JSON object per line, written to `BNDL_LOG_PATH`
//! when set and to stderr otherwise.

use chrono::{Local, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;
use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Environment variable holding the log level
pub const LOG_LEVEL_ENV: &str = "BNDL_LOG_LEVEL";

/// Environment variable holding the JSON log file path
pub const LOG_PATH_ENV: &str = "BNDL_LOG_PATH";

/// Level used when neither the CLI nor the environment picks one
pub const DEFAULT_LOG_LEVEL: &str = "warn";

static JSON_INSTALLED: AtomicBool = AtomicBool::new(false);

/// JSON logger implementation
#[derive(Debug)]
pub struct JsonLogger {
    level: Level,
    target_file: Mutex<Option<std::fs::File>>,
}

/// Split a level string into (json output?, level name)
fn parse_level_spec(level_str: &str) -> (bool, &str) {
    if let Some(stripped) = level_str.strip_prefix("json:") {
        (true, stripped)
    } else if level_str == "json" {
        (true, "info")
    } else {
        (false, level_str)
    }
}

fn parse_level_filter(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

impl JsonLogger {
    /// Create a new JSON logger
    pub fn new(level: Level, log_path: Option<String>) -> Self {
        let target_file = if let Some(path) = log_path {
            OpenOptions::new().create(true).append(true).open(path).ok()
        } else {
            None
        };

        JsonLogger {
            level,
            target_file: Mutex::new(target_file),
        }
    }

    /// Initialize logging with an explicit level string (e.g. "debug" or "json:trace")
    pub fn init_with_level(level_str: &str) {
        let (use_json, actual_level) = parse_level_spec(level_str);
        let level_filter = parse_level_filter(actual_level);

        if !use_json {
            let result = env_logger::Builder::new()
                .filter_level(level_filter)
                .format(|buf, record| {
                    writeln!(
                        buf,
                        "[{} {} {}] {}",
                        Local::now().format("%Y-%m-%dT%H:%M:%S"),
                        record.level(),
                        record.target(),
                        record.args()
                    )
                })
                .try_init();
            if let Err(e) = result {
                eprintln!("Failed to initialize logger: {e}");
            }
            return;
        }

        let Some(level) = level_filter.to_level() else {
            log::set_max_level(LevelFilter::Off);
            return;
        };

        let logger = Box::new(JsonLogger::new(level, env::var(LOG_PATH_ENV).ok()));
        if let Err(e) = log::set_boxed_logger(logger) {
            eprintln!("Failed to initialize JSON logger: {e}");
            return;
        }
        JSON_INSTALLED.store(true, Ordering::Relaxed);
        log::set_max_level(level_filter);
    }

    /// Initialize logging from `BNDL_LOG_LEVEL`
    pub fn init() {
        let log_level = env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
        Self::init_with_level(&log_level);
    }
}

impl Log for JsonLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let log_entry = json!({
            "@timestamp": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            "@level": record.level().to_string().to_lowercase(),
            "@message": record.args().to_string(),
            "@module": record.target(),
            "@pid": std::process::id(),
            "@file": record.file().unwrap_or("unknown"),
            "@line": record.line().unwrap_or(0),
        });
        let line = format!("{log_entry}\n");

        if let Ok(mut file_guard) = self.target_file.lock() {
            if let Some(ref mut file) = *file_guard {
                let _ = file.write_all(line.as_bytes());
                let _ = file.flush();
                return;
            }
        }
        let _ = io::stderr().write_all(line.as_bytes());
    }

    fn flush(&self) {
        if let Ok(mut file_guard) = self.target_file.lock() {
            if let Some(ref mut file) = *file_guard {
                let _ = file.flush();
            }
        }
        let _ = io::stderr().flush();
    }
}

/// Whether output goes through the JSON logger (installed, or requested by env)
pub fn is_json_logging() -> bool {
    JSON_INSTALLED.load(Ordering::Relaxed)
        || env::var(LOG_LEVEL_ENV)
            .map(|v| parse_level_spec(&v).0)
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_spec() {
        assert_eq!(parse_level_spec("debug"), (false, "debug"));
        assert_eq!(parse_level_spec("json"), (true, "info"));
        assert_eq!(parse_level_spec("json:trace"), (true, "trace"));
    }

    #[test]
    fn test_parse_level_filter_falls_back_to_warn() {
        assert_eq!(parse_level_filter("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level_filter("off"), LevelFilter::Off);
        assert_eq!(parse_level_filter("loud"), LevelFilter::Warn);
    }

    #[test]
    fn test_json_logger_respects_level() {
        let logger = JsonLogger::new(Level::Info, None);
        let debug = Metadata::builder().level(Level::Debug).build();
        let warn = Metadata::builder().level(Level::Warn).build();
        assert!(!logger.enabled(&debug));
        assert!(logger.enabled(&warn));
    }
}
