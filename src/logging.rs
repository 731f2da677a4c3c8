//! Structured logging for collections, waiters and the browser runtime.
//!
//! Records can be forwarded to an external callback (for example to bridge
//! into an application's own logger) or printed by the default console
//! handler.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Verbosity;
use crate::error::FailureKind;

/// Convenience alias for external logging callbacks.
pub type LogCallback = Arc<dyn Fn(&ElementiumLogRecord) + Send + Sync + 'static>;

/// Logging configuration shared by every collection derived from one root.
#[derive(Clone)]
pub struct LogConfig {
    pub verbose: Verbosity,
    pub external_logger: Option<LogCallback>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            verbose: Verbosity::Medium,
            external_logger: None,
        }
    }
}

impl LogConfig {
    pub fn new(verbose: Verbosity) -> Self {
        Self {
            verbose,
            ..Default::default()
        }
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        level == LogLevel::Error || level.as_u8() <= self.verbose.as_u8()
    }
}

/// Log severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Info = 1,
    Debug = 2,
}

impl LogLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// What a retry or poll loop did, attached to its log record so callbacks can
/// count retries without parsing messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WaiterEvent {
    Retrying {
        attempt: u32,
        kind: FailureKind,
        error: String,
    },
    RefreshFailed {
        kind: FailureKind,
        error: String,
    },
    GaveUp {
        polls: u32,
        condition: String,
    },
}

impl fmt::Display for WaiterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaiterEvent::Retrying { attempt, kind, .. } => {
                write!(f, "attempt {attempt} failed with {kind}, retrying")
            }
            WaiterEvent::RefreshFailed { kind, error } => {
                write!(f, "refresh between attempts failed with {kind}: {error}")
            }
            WaiterEvent::GaveUp { polls, condition } => {
                write!(f, "gave up waiting for '{condition}' after {polls} poll(s)")
            }
        }
    }
}

/// Structured log entry shared with external callbacks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementiumLogRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Path of the collection the record is about, e.g. `root > css(li)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiter: Option<WaiterEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auxiliary: Option<Value>,
}

impl ElementiumLogRecord {
    pub fn new(
        message: impl Into<String>,
        level: LogLevel,
        category: Option<String>,
        auxiliary: Option<Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            level,
            category,
            subject: None,
            waiter: None,
            auxiliary,
        }
    }

    fn from_waiter(level: LogLevel, subject: Option<&str>, event: WaiterEvent) -> Self {
        Self {
            subject: subject.map(str::to_string),
            waiter: Some(event.clone()),
            ..Self::new(event.to_string(), level, Some(WAITER_CATEGORY.to_string()), None)
        }
    }
}

const WAITER_CATEGORY: &str = "waiter";

/// Default console printer used when no external logger is configured.
pub fn default_log_handler(record: &ElementiumLogRecord) {
    let timestamp = record
        .timestamp
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let message = match &record.subject {
        Some(subject) => format!("{subject}: {}", record.message),
        None => record.message.clone(),
    };
    match &record.category {
        Some(category) => println!(
            "[{}] {:<5} [{}] {}",
            timestamp,
            record.level.label(),
            category,
            message
        ),
        None => println!("[{}] {:<5} {}", timestamp, record.level.label(), message),
    }
    if let Some(aux) = record.auxiliary.as_ref().filter(|aux| !aux.is_null()) {
        println!("    {aux}");
    }
}

pub struct ElementiumLogger {
    config: LogConfig,
    default_handler: LogCallback,
}

impl fmt::Debug for ElementiumLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementiumLogger")
            .field("verbosity", &self.config.verbose)
            .field("external_logger", &self.config.external_logger.is_some())
            .finish()
    }
}

impl Default for ElementiumLogger {
    fn default() -> Self {
        Self::with_config(LogConfig::default())
    }
}

impl ElementiumLogger {
    pub fn with_config(config: LogConfig) -> Self {
        Self {
            config,
            default_handler: Arc::new(default_log_handler),
        }
    }

    pub fn new(verbose: Verbosity) -> Self {
        Self::with_config(LogConfig::new(verbose))
    }

    /// Logger that drops everything except errors, and sends those nowhere.
    pub fn silent() -> Self {
        Self::with_config(LogConfig {
            verbose: Verbosity::Minimal,
            external_logger: Some(Arc::new(|_: &ElementiumLogRecord| {})),
        })
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn set_verbose(&mut self, verbose: Verbosity) {
        self.config.verbose = verbose;
    }

    pub fn set_external_logger(&mut self, logger: Option<LogCallback>) {
        self.config.external_logger = logger;
    }

    pub fn log(
        &self,
        message: impl Into<String>,
        level: LogLevel,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        if !self.config.should_log(level) {
            return;
        }

        self.emit(ElementiumLogRecord::new(
            message,
            level,
            category.map(str::to_string),
            auxiliary,
        ));
    }

    /// Record a retry or poll event for the collection at `subject`.
    pub fn waiter(&self, level: LogLevel, subject: Option<&str>, event: WaiterEvent) {
        if self.config.should_log(level) {
            self.emit(ElementiumLogRecord::from_waiter(level, subject, event));
        }
    }

    fn emit(&self, record: ElementiumLogRecord) {
        match &self.config.external_logger {
            Some(callback) => callback(&record),
            None => (self.default_handler)(&record),
        }
    }

    pub fn error(&self, message: impl Into<String>, category: Option<&str>, auxiliary: Option<Value>) {
        self.log(message, LogLevel::Error, category, auxiliary);
    }

    pub fn info(&self, message: impl Into<String>, category: Option<&str>, auxiliary: Option<Value>) {
        self.log(message, LogLevel::Info, category, auxiliary);
    }

    pub fn debug(&self, message: impl Into<String>, category: Option<&str>, auxiliary: Option<Value>) {
        self.log(message, LogLevel::Debug, category, auxiliary);
    }
}
