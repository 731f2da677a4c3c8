//! Error types shared by the collection, the waiters and driver adapters.
//!
//! Every failure carries a [`FailureKind`] tag. Retry policies decide whether a
//! failure is transient by checking that tag against an injectable set, so the
//! classification lives in data rather than in the error type hierarchy.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of failure tags understood by the retry waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    StaleElement,
    NoSuchElement,
    NotInteractable,
    Navigation,
    Script,
    Protocol,
    Unsupported,
    Timeout,
    WaiterNeverRan,
    IndexOutOfRange,
    Assertion,
    InvalidBudget,
    InvalidArgument,
    Operation,
}

impl FailureKind {
    /// Kinds a driver reports for transient page state. This is the default
    /// recognized set for every retrying operation.
    pub const DRIVER: &'static [FailureKind] = &[
        FailureKind::StaleElement,
        FailureKind::NoSuchElement,
        FailureKind::NotInteractable,
        FailureKind::Navigation,
        FailureKind::Script,
        FailureKind::Protocol,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::StaleElement => "stale_element",
            FailureKind::NoSuchElement => "no_such_element",
            FailureKind::NotInteractable => "not_interactable",
            FailureKind::Navigation => "navigation",
            FailureKind::Script => "script",
            FailureKind::Protocol => "protocol",
            FailureKind::Unsupported => "unsupported",
            FailureKind::Timeout => "timeout",
            FailureKind::WaiterNeverRan => "waiter_never_ran",
            FailureKind::IndexOutOfRange => "index_out_of_range",
            FailureKind::Assertion => "assertion",
            FailureKind::InvalidBudget => "invalid_budget",
            FailureKind::InvalidArgument => "invalid_argument",
            FailureKind::Operation => "operation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalised = value.trim().to_ascii_lowercase().replace('-', "_");
        let kind = match normalised.as_str() {
            "stale_element" => FailureKind::StaleElement,
            "no_such_element" => FailureKind::NoSuchElement,
            "not_interactable" => FailureKind::NotInteractable,
            "navigation" => FailureKind::Navigation,
            "script" => FailureKind::Script,
            "protocol" => FailureKind::Protocol,
            "unsupported" => FailureKind::Unsupported,
            "timeout" => FailureKind::Timeout,
            "waiter_never_ran" => FailureKind::WaiterNeverRan,
            "index_out_of_range" => FailureKind::IndexOutOfRange,
            "assertion" => FailureKind::Assertion,
            "invalid_budget" => FailureKind::InvalidBudget,
            "invalid_argument" => FailureKind::InvalidArgument,
            "operation" => FailureKind::Operation,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`Driver`](crate::driver::Driver) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DriverError {
    kind: FailureKind,
    message: String,
}

impl DriverError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn stale_element(message: impl Into<String>) -> Self {
        Self::new(FailureKind::StaleElement, message)
    }

    pub fn no_such_element(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NoSuchElement, message)
    }

    pub fn not_interactable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotInteractable, message)
    }

    pub fn navigation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Navigation, message)
    }

    pub fn script(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Script, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Protocol, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unsupported, message)
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced by element collections and waiters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ElementsError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("invalid wait budget: {0}")]
    InvalidBudget(String),
    #[error("condition not met before the budget ran out: {condition}")]
    Timeout { condition: String },
    #[error(
        "waiter was never run; n ({n}) or ttl ({ttl}) were negative, or the ttl was too small to allow a single attempt"
    )]
    WaiterNeverRan { n: i64, ttl: f64 },
    #[error("index {index} is out of range for a collection of {len} element(s)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("assertion failed: {condition}")]
    Assertion { condition: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Operation(String),
}

impl ElementsError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ElementsError::Driver(err) => err.kind(),
            ElementsError::InvalidBudget(_) => FailureKind::InvalidBudget,
            ElementsError::Timeout { .. } => FailureKind::Timeout,
            ElementsError::WaiterNeverRan { .. } => FailureKind::WaiterNeverRan,
            ElementsError::IndexOutOfRange { .. } => FailureKind::IndexOutOfRange,
            ElementsError::Assertion { .. } => FailureKind::Assertion,
            ElementsError::InvalidArgument(_) => FailureKind::InvalidArgument,
            ElementsError::Unsupported(_) => FailureKind::Unsupported,
            ElementsError::Operation(_) => FailureKind::Operation,
        }
    }

    /// Whether this failure is tagged with one of `kinds`.
    pub fn is_one_of(&self, kinds: &[FailureKind]) -> bool {
        kinds.contains(&self.kind())
    }
}
