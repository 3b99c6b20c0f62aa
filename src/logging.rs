//! Subscriber setup for the crate's `tracing` output.
//!
//! Library code only emits events; an application opts in by calling one of
//! the `init_*` functions once at startup.

use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable that overrides the level passed to [`init_logging`].
pub const LOG_ENV_VAR: &str = "INVOICE_OCR_LOG";

/// Verbosity of invoice-ocr's own log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    /// Attempts, retries and completed extractions
    Info,
    /// Request shapes and stream summaries
    Debug,
    /// Every chunk and fragment
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }

    /// Filter directive restricting output to this crate at this level.
    pub fn directive(self) -> String {
        format!("invoice_ocr={}", self.to_tracing_level())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Initialize logging at `level`.
///
/// `INVOICE_OCR_LOG`, when set, takes precedence and accepts any
/// `EnvFilter` directive string:
///
/// ```bash
/// INVOICE_OCR_LOG=invoice_ocr::backend=trace cargo run
/// ```
///
/// ```no_run
/// use invoice_ocr::logging::{LogLevel, init_logging};
///
/// init_logging(LogLevel::Info);
/// tracing::info!("Application starting");
/// ```
pub fn init_logging(level: LogLevel) {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(level.directive()));
    install(env_filter);
    tracing::info!(?level, "invoice-ocr logging initialized");
}

/// Initialize logging with an explicit filter, e.g.
/// `"invoice_ocr=info,invoice_ocr::backend::stream=trace"`.
///
/// An invalid filter falls back to `invoice_ocr=info`.
pub fn init_logging_with_filter(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| {
        eprintln!("Invalid log filter {:?}, using invoice_ocr=info", filter);
        EnvFilter::new(LogLevel::Info.directive())
    });
    install(env_filter);
    tracing::info!(filter, "invoice-ocr logging initialized with custom filter");
}

// A subscriber installed earlier (by the application or another test) wins.
fn install(env_filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(env_filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive() {
        assert_eq!(LogLevel::Debug.directive(), "invoice_ocr=DEBUG");
        assert_eq!(LogLevel::Error.directive(), "invoice_ocr=ERROR");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(" trace ".parse::<LogLevel>(), Ok(LogLevel::Trace));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging_with_filter("invoice_ocr=debug");
        init_logging(LogLevel::Info);
    }
}
