//! Strongly-typed configuration for collections and the browser runtime.
//!
//! Values can be constructed from defaults, loaded from `ELEMENTIUM_*`
//! environment variables (with optional `.env` support), or merged with
//! explicit overrides.

use std::env;
use std::fmt;
use std::num::{ParseFloatError, ParseIntError};
use std::path::PathBuf;

use dotenvy::dotenv;
use serde::de::{Deserialize, Deserializer, Error as DeError};
use serde::ser::{Serialize, Serializer};
use serde::{Deserialize as DeriveDeserialize, Serialize as DeriveSerialize};
use thiserror::Error;

use crate::browser::Viewport;
use crate::error::FailureKind;
use crate::logging::{LogCallback, LogConfig};
use crate::waiters::{DEFAULT_PAUSE_SECS, DEFAULT_TTL_SECS};

/// Verbosity level for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Minimal,
    #[default]
    Medium,
    Detailed,
}

impl Verbosity {
    pub fn as_u8(self) -> u8 {
        match self {
            Verbosity::Minimal => 0,
            Verbosity::Medium => 1,
            Verbosity::Detailed => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Verbosity::Minimal),
            1 => Some(Verbosity::Medium),
            2 => Some(Verbosity::Detailed),
            _ => None,
        }
    }
}

impl Serialize for Verbosity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Verbosity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Verbosity::from_u8(value).ok_or_else(|| {
            DeError::custom(format!(
                "invalid verbosity value {value}; expected 0, 1, or 2"
            ))
        })
    }
}

/// Settings shared by a root collection and everything derived from it.
#[derive(Debug, Clone, PartialEq, DeriveSerialize, DeriveDeserialize)]
#[serde(default)]
pub struct ElementsConfig {
    /// Time budget for retried operations in seconds. Zero disables retries.
    pub ttl: f64,
    /// Initial backoff pause in seconds.
    pub pause: f64,
    /// Defer resolution until the items are first read.
    pub lazy: bool,
    #[serde(alias = "onlyDisplayed")]
    pub only_displayed: bool,
    #[serde(alias = "retryOn")]
    pub retry_on: Vec<FailureKind>,
}

impl Default for ElementsConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL_SECS,
            pause: DEFAULT_PAUSE_SECS,
            lazy: false,
            only_displayed: true,
            retry_on: FailureKind::DRIVER.to_vec(),
        }
    }
}

/// Top-level configuration.
#[derive(DeriveSerialize, DeriveDeserialize, Clone)]
#[serde(default)]
pub struct ElementiumConfig {
    pub ttl: f64,
    pub pause: f64,
    pub lazy: bool,
    #[serde(alias = "onlyDisplayed")]
    pub only_displayed: bool,
    #[serde(alias = "retryOn")]
    pub retry_on: Vec<FailureKind>,
    pub verbose: Verbosity,
    #[serde(skip_serializing, skip_deserializing)]
    pub logger: Option<LogCallback>,
    pub headless: bool,
    #[serde(alias = "chromeExecutable")]
    pub chrome_executable: Option<PathBuf>,
    #[serde(alias = "cdpUrl")]
    pub cdp_url: Option<String>,
    #[serde(alias = "userDataDir")]
    pub user_data_dir: Option<PathBuf>,
    pub viewport: Viewport,
    #[serde(alias = "launchArgs")]
    pub launch_args: Vec<String>,
}

impl Default for ElementiumConfig {
    fn default() -> Self {
        let elements = ElementsConfig::default();
        ElementiumConfig {
            ttl: elements.ttl,
            pause: elements.pause,
            lazy: elements.lazy,
            only_displayed: elements.only_displayed,
            retry_on: elements.retry_on,
            verbose: Verbosity::default(),
            logger: None,
            headless: true,
            chrome_executable: None,
            cdp_url: None,
            user_data_dir: None,
            viewport: Viewport::default(),
            launch_args: Vec::new(),
        }
    }
}

impl ElementiumConfig {
    /// Construct a configuration by reading `ELEMENTIUM_*` environment
    /// variables, after loading a `.env` file if present.
    pub fn from_env() -> Result<Self, ElementiumConfigError> {
        let _ = dotenv();
        let mut config = ElementiumConfig::default();

        if let Some(value) = env_var("ELEMENTIUM_TTL") {
            config.ttl = parse_seconds("ELEMENTIUM_TTL", &value)?;
        }

        if let Some(value) = env_var("ELEMENTIUM_PAUSE") {
            config.pause = parse_seconds("ELEMENTIUM_PAUSE", &value)?;
        }

        if let Some(value) = env_var("ELEMENTIUM_LAZY") {
            config.lazy = parse_bool("ELEMENTIUM_LAZY", &value)?;
        }

        if let Some(value) = env_var("ELEMENTIUM_ONLY_DISPLAYED") {
            config.only_displayed = parse_bool("ELEMENTIUM_ONLY_DISPLAYED", &value)?;
        }

        if let Some(value) = env_var("ELEMENTIUM_RETRY_ON") {
            config.retry_on = parse_kinds("ELEMENTIUM_RETRY_ON", &value)?;
        }

        if let Some(value) = env_var("ELEMENTIUM_VERBOSE") {
            let parsed = parse_u8("ELEMENTIUM_VERBOSE", &value)?;
            config.verbose = Verbosity::from_u8(parsed).ok_or_else(|| {
                ElementiumConfigError::invalid_enum("ELEMENTIUM_VERBOSE", parsed.to_string())
            })?;
        }

        if let Some(value) = env_var("ELEMENTIUM_HEADLESS") {
            config.headless = parse_bool("ELEMENTIUM_HEADLESS", &value)?;
        }

        if let Some(value) = env_var("ELEMENTIUM_CHROME_BIN") {
            config.chrome_executable = Some(PathBuf::from(value));
        }

        if let Some(value) = env_var("ELEMENTIUM_CDP_URL") {
            config.cdp_url = Some(value);
        }

        if let Some(value) = env_var("ELEMENTIUM_USER_DATA_DIR") {
            config.user_data_dir = Some(PathBuf::from(value));
        }

        if let Some(value) = env_var("ELEMENTIUM_WINDOW_SIZE") {
            config.viewport = parse_viewport("ELEMENTIUM_WINDOW_SIZE", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject budgets the waiters would refuse later.
    pub fn validate(&self) -> Result<(), ElementiumConfigError> {
        if !(self.ttl >= 0.0) {
            return Err(ElementiumConfigError::Negative {
                field: "ttl",
                value: self.ttl,
            });
        }
        if !(self.pause >= 0.0) {
            return Err(ElementiumConfigError::Negative {
                field: "pause",
                value: self.pause,
            });
        }
        if self.retry_on.is_empty() {
            return Err(ElementiumConfigError::EmptyRetrySet);
        }
        Ok(())
    }

    /// Collection-level settings.
    pub fn elements(&self) -> ElementsConfig {
        ElementsConfig {
            ttl: self.ttl,
            pause: self.pause,
            lazy: self.lazy,
            only_displayed: self.only_displayed,
            retry_on: self.retry_on.clone(),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            verbose: self.verbose,
            external_logger: self.logger.clone(),
        }
    }

    /// Create a new configuration with explicit field overrides applied.
    pub fn with_overrides(&self, overrides: ElementiumConfigOverrides) -> ElementiumConfig {
        let mut next = self.clone();

        if let Some(value) = overrides.ttl {
            next.ttl = value;
        }
        if let Some(value) = overrides.pause {
            next.pause = value;
        }
        if let Some(value) = overrides.lazy {
            next.lazy = value;
        }
        if let Some(value) = overrides.only_displayed {
            next.only_displayed = value;
        }
        if let Some(value) = overrides.retry_on {
            next.retry_on = value;
        }
        if let Some(value) = overrides.verbose {
            next.verbose = value;
        }
        if let Some(value) = overrides.logger {
            next.logger = value;
        }
        if let Some(value) = overrides.headless {
            next.headless = value;
        }
        if let Some(value) = overrides.chrome_executable {
            next.chrome_executable = value;
        }
        if let Some(value) = overrides.cdp_url {
            next.cdp_url = value;
        }
        if let Some(value) = overrides.user_data_dir {
            next.user_data_dir = value;
        }
        if let Some(value) = overrides.viewport {
            next.viewport = value;
        }
        if let Some(value) = overrides.launch_args {
            next.launch_args = value;
        }

        next
    }
}

/// Field-level overrides for [`ElementiumConfig::with_overrides`].
#[derive(Default, Clone)]
pub struct ElementiumConfigOverrides {
    pub ttl: Option<f64>,
    pub pause: Option<f64>,
    pub lazy: Option<bool>,
    pub only_displayed: Option<bool>,
    pub retry_on: Option<Vec<FailureKind>>,
    pub verbose: Option<Verbosity>,
    pub logger: Option<Option<LogCallback>>,
    pub headless: Option<bool>,
    pub chrome_executable: Option<Option<PathBuf>>,
    pub cdp_url: Option<Option<String>>,
    pub user_data_dir: Option<Option<PathBuf>>,
    pub viewport: Option<Viewport>,
    pub launch_args: Option<Vec<String>>,
}

impl ElementiumConfigOverrides {
    pub fn ttl(mut self, ttl: f64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn cdp_url<T: Into<Option<String>>>(mut self, cdp_url: T) -> Self {
        self.cdp_url = Some(cdp_url.into());
        self
    }
}

impl fmt::Debug for ElementiumConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementiumConfig")
            .field("ttl", &self.ttl)
            .field("pause", &self.pause)
            .field("lazy", &self.lazy)
            .field("only_displayed", &self.only_displayed)
            .field("retry_on", &self.retry_on)
            .field("verbose", &self.verbose)
            .field("headless", &self.headless)
            .field("chrome_executable", &self.chrome_executable)
            .field("cdp_url", &self.cdp_url)
            .field("user_data_dir", &self.user_data_dir)
            .field("viewport", &self.viewport)
            .field("launch_args", &self.launch_args)
            .field("logger_present", &self.logger.is_some())
            .finish()
    }
}

impl fmt::Debug for ElementiumConfigOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementiumConfigOverrides")
            .field("ttl", &self.ttl)
            .field("pause", &self.pause)
            .field("lazy", &self.lazy)
            .field("only_displayed", &self.only_displayed)
            .field("retry_on", &self.retry_on)
            .field("verbose", &self.verbose)
            .field("logger", &self.logger.as_ref().map(|inner| inner.is_some()))
            .field("headless", &self.headless)
            .field("chrome_executable", &self.chrome_executable)
            .field("cdp_url", &self.cdp_url)
            .field("user_data_dir", &self.user_data_dir)
            .field("viewport", &self.viewport)
            .field("launch_args", &self.launch_args)
            .finish()
    }
}

/// Errors that can arise while constructing an [`ElementiumConfig`].
#[derive(Debug, Error)]
pub enum ElementiumConfigError {
    #[error("invalid value '{value}' for {field}")]
    InvalidEnumVariant { field: &'static str, value: String },
    #[error("invalid boolean '{value}' for {field}")]
    InvalidBool { field: &'static str, value: String },
    #[error("invalid integer '{value}' for {field}: {source}")]
    InvalidInteger {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid number '{value}' for {field}: {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("invalid window size '{value}' for {field}; expected WIDTHxHEIGHT")]
    InvalidWindowSize { field: &'static str, value: String },
    #[error("at least one failure kind must be retried")]
    EmptyRetrySet,
}

impl ElementiumConfigError {
    fn invalid_enum(field: &'static str, value: String) -> Self {
        ElementiumConfigError::InvalidEnumVariant { field, value }
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ElementiumConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ElementiumConfigError::InvalidBool {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_u8(field: &'static str, value: &str) -> Result<u8, ElementiumConfigError> {
    value
        .trim()
        .parse::<u8>()
        .map_err(|source| ElementiumConfigError::InvalidInteger {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_seconds(field: &'static str, value: &str) -> Result<f64, ElementiumConfigError> {
    let parsed = value
        .trim()
        .parse::<f64>()
        .map_err(|source| ElementiumConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })?;
    if !(parsed >= 0.0) {
        return Err(ElementiumConfigError::Negative {
            field,
            value: parsed,
        });
    }
    Ok(parsed)
}

fn parse_kinds(field: &'static str, value: &str) -> Result<Vec<FailureKind>, ElementiumConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            FailureKind::parse(part)
                .ok_or_else(|| ElementiumConfigError::invalid_enum(field, part.to_string()))
        })
        .collect()
}

fn parse_viewport(field: &'static str, value: &str) -> Result<Viewport, ElementiumConfigError> {
    let invalid = || ElementiumConfigError::InvalidWindowSize {
        field,
        value: value.to_string(),
    };
    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(invalid)?;
    let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
    let height = height.trim().parse::<u32>().map_err(|_| invalid())?;
    Ok(Viewport { width, height })
}
