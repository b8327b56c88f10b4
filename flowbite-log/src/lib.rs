//! Flowbite Logging
//!
//! Logging backend for the Flowbite admin crates. Records are emitted through
//! the [`log`] facade, so library code only uses the familiar macros while the
//! application decides when (and whether) to install [`FlowbiteLogger`].
//!
//! # Usage
//!
//! ```rust
//! use flowbite_log::{debug, info, warn};
//!
//! flowbite_log::init();
//!
//! debug!("Building change list for {}", "books");
//! info!(target: "flowbite::site", "Admin site ready");
//! warn!("Skipping table that could not be counted");
//! ```
//!
//! # Environment Variables
//!
//! - `FLOWBITE_DEBUG=1` - Enable debug logging
//! - `FLOWBITE_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `FLOWBITE_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `FLOWBITE_LOG_TIMESTAMPS=1|0` - Include timestamps

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::env;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

pub use log::{debug, error, info, trace, warn};

// ============================================================================
// Log Levels
// ============================================================================

/// Log level understood by the Flowbite backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    /// Trace level (most verbose)
    Trace = 0,
    /// Debug level
    Debug = 1,
    /// Info level
    Info = 2,
    /// Warning level
    Warn = 3,
    /// Error level
    Error = 4,
    /// Nothing is logged
    Off = 5,
}

impl Level {
    /// Upper-case level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            _ => Level::Off,
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "off" | "none" => Ok(Level::Off),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Level::Trace,
            log::Level::Debug => Level::Debug,
            log::Level::Info => Level::Info,
            log::Level::Warn => Level::Warn,
            log::Level::Error => Level::Error,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human readable, one field per column
    Pretty,
    /// Short single-letter level, time only
    Compact,
    /// One JSON object per line
    Json,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Format::Pretty),
            "compact" => Ok(Format::Compact),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

// ============================================================================
// Global Configuration
// ============================================================================

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

static LOGGER: FlowbiteLogger = FlowbiteLogger;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether to include timestamps
    pub timestamps: bool,
    /// Whether to include the record target
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            timestamps: true,
            module_path: true,
        }
    }
}

impl LogConfig {
    /// Read the configuration from `FLOWBITE_*` environment variables and
    /// publish the level to the global atomics.
    pub fn from_env() -> Self {
        let debug = env_flag("FLOWBITE_DEBUG").unwrap_or(false);

        let level = env::var("FLOWBITE_LOG_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = env::var("FLOWBITE_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Format::Json);

        let timestamps = env_flag("FLOWBITE_LOG_TIMESTAMPS").unwrap_or(true);

        DEBUG_ENABLED.store(debug, Ordering::SeqCst);
        LOG_LEVEL.store(level as u8, Ordering::SeqCst);

        Self {
            debug,
            level,
            format,
            timestamps,
            module_path: true,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Public API
// ============================================================================

/// Install [`FlowbiteLogger`] as the global `log` backend.
///
/// Fails when another logger was installed first.
pub fn try_init() -> Result<(), log::SetLoggerError> {
    Lazy::force(&CONFIG);
    log::set_logger(&LOGGER)?;
    // Filtering happens against LOG_LEVEL so set_level keeps working after init.
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

/// Install the logger, ignoring a previously installed one.
pub fn init() {
    let _ = try_init();
}

/// Check if debug logging is enabled.
#[inline]
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Check if a log level passes the current threshold.
#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    level != Level::Off && level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Current minimum level.
pub fn current_level() -> Level {
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level at runtime.
pub fn set_level(level: Level) {
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Enable or disable debug mode at runtime.
pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    if enabled && current_level() > Level::Debug {
        set_level(Level::Debug);
    }
}

/// The configuration read from the environment.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

// ============================================================================
// Backend
// ============================================================================

/// `log::Log` implementation writing to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlowbiteLogger;

impl log::Log for FlowbiteLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        let level = Level::from(metadata.level());
        is_level_enabled(level) || (level == Level::Debug && is_debug_enabled())
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(
            Level::from(record.level()),
            record.target(),
            &record.args().to_string(),
            config(),
            Utc::now(),
        );

        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", line);
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Render one log line in the configured format.
pub fn format_line(
    level: Level,
    target: &str,
    message: &str,
    config: &LogConfig,
    now: DateTime<Utc>,
) -> String {
    match config.format {
        Format::Pretty => {
            let mut line = String::new();
            if config.timestamps {
                line.push_str(&now.format("%Y-%m-%d %H:%M:%S%.3f ").to_string());
            }
            line.push_str(&format!("{:5} ", level.as_str()));
            if config.module_path && !target.is_empty() {
                line.push_str(&format!("[{}] ", target));
            }
            line.push_str(message);
            line
        }
        Format::Compact => {
            let mut line = String::new();
            if config.timestamps {
                line.push_str(&now.format("%H:%M:%S ").to_string());
            }
            line.push(level.as_str().chars().next().unwrap_or('?'));
            line.push(' ');
            if config.module_path && !target.is_empty() {
                line.push_str(target);
                line.push_str(": ");
            }
            line.push_str(message);
            line
        }
        Format::Json => format_json(level, target, message, now),
    }
}

#[cfg(feature = "json")]
fn format_json(level: Level, target: &str, message: &str, now: DateTime<Utc>) -> String {
    use serde::Serialize;

    #[derive(Serialize)]
    struct LogEntry<'a> {
        timestamp: String,
        level: &'a str,
        target: &'a str,
        message: &'a str,
    }

    let entry = LogEntry {
        timestamp: now.to_rfc3339(),
        level: level.as_str(),
        target,
        message,
    };

    serde_json::to_string(&entry).unwrap_or_default()
}

#[cfg(not(feature = "json"))]
fn format_json(level: Level, target: &str, message: &str, now: DateTime<Utc>) -> String {
    format!(
        r#"{{"timestamp":"{}","level":"{}","target":"{}","message":"{}"}}"#,
        now.to_rfc3339(),
        level.as_str(),
        escape_json(target),
        escape_json(message)
    )
}

#[cfg(not(feature = "json"))]
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => result.push_str(&format!("\\u{:04x}", c as u32)),
            c => result.push(c),
        }
    }
    result
}

// ============================================================================
// Tests
// ============================================================================
