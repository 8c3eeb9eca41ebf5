//! Structured logging setup for phasekit
//!
//! Logs go to stderr so command output on stdout stays machine readable.
//! `RUST_LOG` directives are honoured on top of the configured level.
//!
//! # Example
//!
//! ```no_run
//! use phasekit::util::logging;
//!
//! // Reads PHASEKIT_LOG_LEVEL and PHASEKIT_LOG_JSON
//! logging::init_from_env();
//!
//! tracing::info!(package = "zlib", "Installing from source");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Ensures logging is only initialized once
static INIT: Once = Once::new();

pub const ENV_LOG_JSON: &str = "PHASEKIT_LOG_JSON";

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for phasekit's own events
    pub level: Level,

    /// One JSON object per event instead of human-readable lines
    pub use_json: bool,

    /// Include the module target (e.g., phasekit::pipeline) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,

    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: false,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with full event metadata, for CI log collectors.
    pub fn structured(level: Level) -> Self {
        Self {
            level,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }
}

/// Parses a log level from a string
///
/// Unknown names fall back to `INFO` with a note on stderr.
///
/// ```
/// use phasekit::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("WARN"), Level::WARN);
/// assert_eq!(parse_level("chatty"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn build_filter(level: Level) -> EnvFilter {
    let directive = format!("phasekit={}", level)
        .parse()
        .expect("static directive is valid");
    EnvFilter::from_default_env().add_directive(directive)
}

/// Initializes the global subscriber. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_thread_names(config.include_thread_ids);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .init();
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

/// Initializes logging from `PHASEKIT_LOG_LEVEL` and `PHASEKIT_LOG_JSON`.
pub fn init_from_env() {
    let level = env::var(crate::config::ENV_LOG_LEVEL)
        .map(|s| parse_level(&s))
        .unwrap_or(Level::INFO);
    init_logging(LoggingConfig {
        level,
        use_json: json_requested(),
        ..Default::default()
    });
}

/// Whether `PHASEKIT_LOG_JSON` asks for JSON output.
pub fn json_requested() -> bool {
    env::var(ENV_LOG_JSON)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false)
}
