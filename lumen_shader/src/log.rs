//! Engine log sink
//!
//! Every component reports through `Engine::log` with a source tag such as
//! `"lumen::ShaderAsset"`. The installed `Logger` decides where entries go;
//! `DefaultLogger` prints them to stdout, colored, above a minimum severity.
//! Error entries carry the file and line of the macro call.
//!
//! Driver compile and link logs arrive here too, so an editor can show them
//! by installing its own logger.

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Destination of engine log entries
///
/// Called from whichever thread logged, GPU thread included.
///
/// # Example
///
/// ```no_run
/// use lumen_shader::lumen::log::{Logger, LogEntry};
///
/// struct ConsolePanel;
///
/// impl Logger for ConsolePanel {
///     fn log(&self, entry: &LogEntry) {
///         // Forward to the editor...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One logged message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Component tag, e.g. "lumen::GpuThread"
    pub source: String,
    pub message: String,
    /// Set by `engine_error!` only
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

/// Ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Cache hits, queued GPU requests
    Trace,
    /// Reloads, new variants
    Debug,
    /// GPU thread start/stop, singleton creation
    Info,
    /// Recompiles that failed during a reload
    Warn,
    Error,
}

/// Stdout logger
///
/// Prints `[timestamp] [SEVERITY] [source] message`, with ` (file:line)`
/// appended when the entry has a location. Severities are colored, errors
/// in bold red.
#[derive(Debug, Clone, Copy)]
pub struct DefaultLogger {
    min_severity: LogSeverity,
}

impl DefaultLogger {
    /// Create a logger printing every entry at or above `min_severity`
    pub fn new(min_severity: LogSeverity) -> Self {
        Self { min_severity }
    }

    /// Minimum severity that gets printed
    pub fn min_severity(&self) -> LogSeverity {
        self.min_severity
    }

    /// Format an entry the way it is printed (without the trailing newline)
    pub fn format_entry(entry: &LogEntry) -> String {
        // Local time, millisecond precision
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let severity_str = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            format!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp, severity_str, source, entry.message, file, line
            )
        } else {
            format!("[{}] [{}] [{}] {}", timestamp, severity_str, source, entry.message)
        }
    }
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self::new(LogSeverity::Debug)
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        if entry.severity < self.min_severity {
            return;
        }
        println!("{}", Self::format_entry(entry));
    }
}

// ===== LOGGING MACROS =====

/// Trace-level entry; `DefaultLogger::default()` hides these
///
/// # Example
///
/// ```no_run
/// # use lumen_shader::engine_trace;
/// engine_trace!("lumen::ProgramCache", "Cache hit for feature hash {}", 5);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Engine::log(
            $crate::lumen::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Debug-level entry
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Engine::log(
            $crate::lumen::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Info-level entry
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Engine::log(
            $crate::lumen::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Warn-level entry
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Engine::log(
            $crate::lumen::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Error-level entry, tagged with the calling file and line
///
/// # Example
///
/// ```no_run
/// # use lumen_shader::engine_error;
/// engine_error!("lumen::VariantCompiler", "Failed to dump shader source: {}", "disk full");
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::lumen::Engine::log_detailed(
            $crate::lumen::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// `engine_error!`, then `return Err(Error::BackendError(message))`
///
/// Only usable inside functions returning `lumen::Result<_>`.
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        return Err($crate::lumen::Error::BackendError(message));
    }};
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
