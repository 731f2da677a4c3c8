//! Chromiumoxide-based browser runtime.
//!
//! Implements [`BrowserRuntime`] on top of the `chromiumoxide` crate: it
//! launches a local Chromium (or attaches to an existing DevTools endpoint),
//! drives the CDP handler on a background task, and opens pages as
//! [`ChromiumoxideDriver`]s.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use tokio::{fs, sync::Mutex, task::JoinHandle};

use crate::adapter::chromiumoxide::ChromiumoxideDriver;
use crate::browser::{BrowserRuntime, BrowserRuntimeError, LaunchPlan, LaunchStrategy};

pub struct ChromiumoxideRuntime {
    state: Arc<Mutex<Option<RuntimeState>>>,
}

struct RuntimeState {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    /// Launched by us rather than attached; closed on shutdown.
    owned: bool,
}

impl ChromiumoxideRuntime {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(None)),
        }
    }

    async fn browser(&self) -> Result<Arc<Browser>, BrowserRuntimeError> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or(BrowserRuntimeError::NotInitialized)?;
        Ok(Arc::clone(&state.browser))
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    async fn install(&self, new_state: RuntimeState) {
        let old_state = {
            let mut guard = self.state.lock().await;
            guard.replace(new_state)
        };
        if let Some(state) = old_state {
            dispose(state).await;
        }
    }
}

impl Default for ChromiumoxideRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserRuntime for ChromiumoxideRuntime {
    type Driver = ChromiumoxideDriver;

    async fn launch(&self, plan: &LaunchPlan) -> Result<(), BrowserRuntimeError> {
        if self.is_running().await {
            return Ok(());
        }

        let (browser, handler) = match &plan.strategy {
            LaunchStrategy::AttachCdp { url } => Browser::connect(url.as_str())
                .await
                .map_err(map_chromiumoxide_error)?,
            LaunchStrategy::LaunchPersistent { user_data_dir } => {
                if let Some(dir) = user_data_dir {
                    fs::create_dir_all(dir)
                        .await
                        .map_err(|err| BrowserRuntimeError::Message(err.to_string()))?;
                }
                Browser::launch(build_config(plan)?)
                    .await
                    .map_err(map_chromiumoxide_error)?
            }
        };

        self.install(RuntimeState {
            browser: Arc::new(browser),
            handler: spawn_handler(handler),
            owned: matches!(plan.strategy, LaunchStrategy::LaunchPersistent { .. }),
        })
        .await;
        Ok(())
    }

    async fn open(&self, url: &str) -> Result<ChromiumoxideDriver, BrowserRuntimeError> {
        let browser = self.browser().await?;
        let page = browser
            .new_page(url)
            .await
            .map_err(map_chromiumoxide_error)?;
        Ok(ChromiumoxideDriver::new(page))
    }

    async fn shutdown(&self) -> Result<(), BrowserRuntimeError> {
        let state = {
            let mut guard = self.state.lock().await;
            guard.take()
        };
        if let Some(state) = state {
            dispose(state).await;
        }
        Ok(())
    }
}

fn build_config(plan: &LaunchPlan) -> Result<BrowserConfig, BrowserRuntimeError> {
    let launch = &plan.launch_options;

    let viewport = chromiumoxide::handler::viewport::Viewport {
        width: launch.viewport.width,
        height: launch.viewport.height,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: launch.viewport.width >= launch.viewport.height,
        has_touch: false,
    };

    let mut builder = BrowserConfig::builder();

    if let Some(path) = &plan.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    let builder = builder
        .viewport(viewport)
        .window_size(launch.viewport.width, launch.viewport.height)
        .args(launch.args.clone());

    let builder = if launch.headless {
        builder
    } else {
        builder.with_head()
    };

    let builder = if !launch.ignore_https_errors {
        builder.respect_https_errors()
    } else {
        builder
    };

    let builder = match &plan.strategy {
        LaunchStrategy::AttachCdp { .. } => builder,
        LaunchStrategy::LaunchPersistent { user_data_dir } => match user_data_dir {
            Some(dir) => builder.user_data_dir(dir),
            None => builder,
        },
    };

    builder.build().map_err(BrowserRuntimeError::Message)
}

fn map_chromiumoxide_error<E: std::fmt::Display>(err: E) -> BrowserRuntimeError {
    BrowserRuntimeError::Message(err.to_string())
}

fn spawn_handler(mut handler: chromiumoxide::handler::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = handler.next().await {
            if let Err(err) = result {
                log::debug!("chromiumoxide handler error: {err}");
            }
        }
    })
}

async fn dispose(state: RuntimeState) {
    if state.owned {
        if let Ok(mut browser) = Arc::try_unwrap(state.browser) {
            if let Err(err) = browser.close().await {
                log::debug!("browser close failed: {err}");
            }
        }
    }
    state.handler.abort();
}
