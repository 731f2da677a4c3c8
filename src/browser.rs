//! Browser launch planning and the runtime seam.
//!
//! [`LaunchPlan`] turns configuration into a concrete "attach to this CDP
//! endpoint" or "launch a local browser" decision. A [`BrowserRuntime`]
//! executes the plan and hands out drivers for individual pages, which
//! [`ElementiumBrowser`] wraps into root [`Elements`] collections.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ElementiumConfig, ElementiumConfigError};
use crate::driver::Driver;
use crate::elements::Elements;
use crate::error::ElementsError;
use crate::logging::ElementiumLogger;

const DEFAULT_LAUNCH_ARGS: &[&str] = &["--disable-blink-features=AutomationControlled"];

/// Viewport dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 1288,
            height: 711,
        }
    }
}

/// Options applied when launching a local browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOptions {
    pub headless: bool,
    pub args: Vec<String>,
    pub viewport: Viewport,
    #[serde(rename = "ignoreHTTPSErrors")]
    pub ignore_https_errors: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LaunchStrategy {
    AttachCdp { url: String },
    LaunchPersistent { user_data_dir: Option<PathBuf> },
}

/// Normalised launch plan derived from an [`ElementiumConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub strategy: LaunchStrategy,
    pub launch_options: LaunchOptions,
    pub chrome_executable: Option<PathBuf>,
}

impl LaunchPlan {
    pub fn from_config(config: &ElementiumConfig) -> Self {
        let strategy = match &config.cdp_url {
            Some(url) => LaunchStrategy::AttachCdp { url: url.clone() },
            None => LaunchStrategy::LaunchPersistent {
                user_data_dir: config.user_data_dir.clone(),
            },
        };

        let args = if config.launch_args.is_empty() {
            DEFAULT_LAUNCH_ARGS.iter().map(|arg| arg.to_string()).collect()
        } else {
            config.launch_args.clone()
        };

        LaunchPlan {
            strategy,
            launch_options: LaunchOptions {
                headless: config.headless,
                args,
                viewport: config.viewport,
                ignore_https_errors: true,
            },
            chrome_executable: config.chrome_executable.clone(),
        }
    }
}

/// Executes a [`LaunchPlan`] and opens pages as drivers.
#[async_trait]
pub trait BrowserRuntime: Send + Sync {
    type Driver: Driver;

    async fn launch(&self, plan: &LaunchPlan) -> Result<(), BrowserRuntimeError>;

    /// Open `url` in a new page and return a driver bound to it.
    async fn open(&self, url: &str) -> Result<Self::Driver, BrowserRuntimeError>;

    async fn shutdown(&self) -> Result<(), BrowserRuntimeError> {
        Err(BrowserRuntimeError::Unsupported(
            "runtime shutdown not implemented".to_string(),
        ))
    }
}

#[derive(Debug, Error)]
pub enum BrowserRuntimeError {
    #[error("browser runtime error: {0}")]
    Message(String),
    #[error("browser runtime not initialized")]
    NotInitialized,
    #[error("browser runtime feature unsupported: {0}")]
    Unsupported(String),
}

/// Errors surfaced by [`ElementiumBrowser`].
#[derive(Debug, Error)]
pub enum ElementiumError {
    #[error(transparent)]
    Config(#[from] ElementiumConfigError),
    #[error(transparent)]
    Runtime(#[from] BrowserRuntimeError),
    #[error(transparent)]
    Elements(#[from] ElementsError),
}

/// Owns a runtime and the configuration every opened page inherits.
pub struct ElementiumBrowser<R: BrowserRuntime> {
    config: ElementiumConfig,
    plan: LaunchPlan,
    runtime: R,
    logger: Arc<ElementiumLogger>,
}

impl<R: BrowserRuntime> ElementiumBrowser<R> {
    pub fn new(config: ElementiumConfig, runtime: R) -> Result<Self, ElementiumError> {
        config.validate()?;
        let plan = LaunchPlan::from_config(&config);
        let logger = Arc::new(ElementiumLogger::with_config(config.log_config()));
        Ok(Self {
            config,
            plan,
            runtime,
            logger,
        })
    }

    pub fn config(&self) -> &ElementiumConfig {
        &self.config
    }

    pub fn plan(&self) -> &LaunchPlan {
        &self.plan
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn logger(&self) -> &Arc<ElementiumLogger> {
        &self.logger
    }

    pub async fn launch(&self) -> Result<(), ElementiumError> {
        self.logger.debug(
            format!("launching browser ({:?})", self.plan.strategy),
            Some("runtime"),
            None,
        );
        self.runtime.launch(&self.plan).await?;
        Ok(())
    }

    /// Open `url` and return the root collection for that page.
    pub async fn open(&self, url: &str) -> Result<Elements<R::Driver>, ElementiumError> {
        let driver = self.runtime.open(url).await?;
        let root =
            Elements::root_with_logger(Arc::new(driver), self.config.elements(), Arc::clone(&self.logger))
                .await?;
        Ok(root)
    }

    pub async fn shutdown(&self) -> Result<(), ElementiumError> {
        self.runtime.shutdown().await?;
        Ok(())
    }
}

impl<R: BrowserRuntime> fmt::Debug for ElementiumBrowser<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementiumBrowser")
            .field("plan", &self.plan)
            .finish()
    }
}
