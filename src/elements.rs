//! Lazy, context-chained element collections.
//!
//! An [`Elements`] value describes "the nodes matching X beneath the nodes of
//! my parent". The description is a replayable resolver; the collection keeps
//! the last successful resolution as a snapshot and refreshes it on demand.
//! Refreshing with `propagate` first refreshes every ancestor, so a failure on
//! a deeply derived collection re-resolves the whole chain from the root.
//!
//! `Elements` is a cheap handle: clones share one snapshot, and children hold
//! a clone of their parent. Updating a parent is visible to every child on its
//! next read.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::{Value as JsonValue, json};
use tokio::time::{Instant, sleep};

use crate::config::ElementsConfig;
use crate::driver::{Driver, Query, SelectBy, WindowSize};
use crate::error::{DriverError, ElementsError};
use crate::logging::ElementiumLogger;
use crate::waiters::{
    Condition, ConditionElementsWaiter, ExceptionRetryElementsWaiter, ExceptionRetryWaiter, Waiter,
};

const LOG_CATEGORY: &str = "elements";

type Nodes<D> = Vec<<D as Driver>::Node>;

/// Replayable resolution function of a collection.
pub type Resolver<D> = Arc<
    dyn Fn(ResolveScope<D>) -> BoxFuture<'static, Result<Nodes<D>, ElementsError>> + Send + Sync,
>;

/// What a resolver gets to work with on each replay.
pub struct ResolveScope<D: Driver> {
    pub driver: Arc<D>,
    pub parent: Option<Elements<D>>,
}

impl<D: Driver> ResolveScope<D> {
    /// The parent collection, or an error for root-level resolvers.
    pub fn require_parent(self) -> Result<Elements<D>, ElementsError> {
        self.parent.ok_or_else(|| {
            ElementsError::Operation("resolver requires a parent collection".to_string())
        })
    }
}

/// Options for [`Elements::foreach`] and [`Elements::foreach_collect`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForEachOptions {
    /// Seconds to sleep between elements.
    pub pause: Option<f64>,
    /// Wall-clock budget for the whole iteration. Defaults to the config ttl.
    pub ttl: Option<f64>,
}

/// Options for query operations such as [`Elements::find`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FindOptions {
    /// Keep only visible matches. Defaults to the config value.
    pub only_displayed: Option<bool>,
    /// Wait until the query matches at least one node.
    pub wait: bool,
    pub ttl: Option<f64>,
}

impl FindOptions {
    pub fn waiting() -> Self {
        Self {
            wait: true,
            ..Self::default()
        }
    }

    pub fn include_hidden(mut self) -> Self {
        self.only_displayed = Some(false);
        self
    }

    pub fn ttl(mut self, ttl: f64) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

fn boxed_resolver<D, F, Fut>(resolver: F) -> Resolver<D>
where
    D: Driver,
    F: Fn(ResolveScope<D>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Nodes<D>, ElementsError>> + Send + 'static,
{
    Arc::new(
        move |scope: ResolveScope<D>| -> BoxFuture<'static, Result<Nodes<D>, ElementsError>> {
            Box::pin(resolver(scope))
        },
    )
}

struct Inner<D: Driver> {
    driver: Arc<D>,
    parent: Option<Elements<D>>,
    label: String,
    resolver: Resolver<D>,
    items: Mutex<Option<Nodes<D>>>,
    config: Arc<ElementsConfig>,
    logger: Arc<ElementiumLogger>,
}

/// An ordered, refreshable collection of driver nodes.
pub struct Elements<D: Driver> {
    inner: Arc<Inner<D>>,
}

impl<D: Driver> Clone for Elements<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> fmt::Debug for Elements<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Elements")
            .field("path", &self.path())
            .field("items", &*self.lock_items())
            .finish()
    }
}

impl<D: Driver> Elements<D> {
    /// Root collection over the driver's document node.
    pub async fn root(driver: Arc<D>, config: ElementsConfig) -> Result<Self, ElementsError> {
        Self::root_with_logger(driver, config, Arc::new(ElementiumLogger::default())).await
    }

    pub async fn root_with_logger(
        driver: Arc<D>,
        config: ElementsConfig,
        logger: Arc<ElementiumLogger>,
    ) -> Result<Self, ElementsError> {
        let resolver = boxed_resolver(|scope: ResolveScope<D>| async move {
            Ok::<_, ElementsError>(vec![scope.driver.resolve_root().await?])
        });
        Self::build(
            driver,
            None,
            "root".to_string(),
            resolver,
            Arc::new(config),
            logger,
        )
        .await
    }

    async fn build(
        driver: Arc<D>,
        parent: Option<Elements<D>>,
        label: String,
        resolver: Resolver<D>,
        config: Arc<ElementsConfig>,
        logger: Arc<ElementiumLogger>,
    ) -> Result<Self, ElementsError> {
        let lazy = config.lazy;
        let elements = Self {
            inner: Arc::new(Inner {
                driver,
                parent,
                label,
                resolver,
                items: Mutex::new(None),
                config,
                logger,
            }),
        };
        if !lazy {
            elements.update(false).await?;
        }
        Ok(elements)
    }

    /// Derive a child collection whose items come from `resolver`.
    ///
    /// The resolver receives this collection as its parent on every replay.
    pub async fn derive<F, Fut>(&self, label: impl Into<String>, resolver: F) -> Result<Self, ElementsError>
    where
        F: Fn(ResolveScope<D>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Nodes<D>, ElementsError>> + Send + 'static,
    {
        Self::build(
            Arc::clone(&self.inner.driver),
            Some(self.clone()),
            label.into(),
            boxed_resolver(resolver),
            Arc::clone(&self.inner.config),
            Arc::clone(&self.inner.logger),
        )
        .await
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.inner.driver
    }

    pub fn parent_collection(&self) -> Option<&Elements<D>> {
        self.inner.parent.as_ref()
    }

    pub fn config(&self) -> &ElementsConfig {
        &self.inner.config
    }

    pub fn logger(&self) -> &Arc<ElementiumLogger> {
        &self.inner.logger
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Labels from the root down to this collection, joined with ` > `.
    pub fn path(&self) -> String {
        let mut labels = vec![self.inner.label.as_str()];
        let mut current = self.inner.parent.as_ref();
        while let Some(parent) = current {
            labels.push(parent.inner.label.as_str());
            current = parent.inner.parent.as_ref();
        }
        labels.reverse();
        labels.join(" > ")
    }

    /// Whether two handles share one collection.
    pub fn same_collection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock_items(&self) -> MutexGuard<'_, Option<Nodes<D>>> {
        self.inner
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a resolution has completed at least once.
    pub fn is_populated(&self) -> bool {
        self.lock_items().is_some()
    }

    /// Current snapshot, resolving it first if this collection is lazy and
    /// has never been read.
    pub async fn items(&self) -> Result<Nodes<D>, ElementsError> {
        let cached = self.lock_items().clone();
        if let Some(items) = cached {
            return Ok(items);
        }
        self.update(false).await?;
        Ok(self.lock_items().clone().unwrap_or_default())
    }

    pub async fn len(&self) -> Result<usize, ElementsError> {
        Ok(self.items().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, ElementsError> {
        Ok(self.len().await? == 0)
    }

    pub async fn first(&self) -> Result<Option<D::Node>, ElementsError> {
        Ok(self.items().await?.into_iter().next())
    }

    /// First node, or `None` when empty or unresolvable.
    pub async fn item(&self) -> Option<D::Node> {
        self.first().await.ok().flatten()
    }

    /// Re-run the resolver and replace the snapshot.
    ///
    /// With `propagate`, ancestors are refreshed first, root first. The
    /// snapshot is only replaced when resolution succeeds.
    pub fn update(&self, propagate: bool) -> BoxFuture<'static, Result<Self, ElementsError>> {
        let this = self.clone();
        Box::pin(async move {
            if propagate {
                if let Some(parent) = &this.inner.parent {
                    parent.update(true).await?;
                }
            }

            let scope = ResolveScope {
                driver: Arc::clone(&this.inner.driver),
                parent: this.inner.parent.clone(),
            };
            let items = (this.inner.resolver)(scope).await?;

            this.inner.logger.debug(
                format!("resolved {} element(s)", items.len()),
                Some(LOG_CATEGORY),
                Some(json!({ "path": this.path(), "propagate": propagate })),
            );
            *this.lock_items() = Some(items);
            Ok(this)
        })
    }

    /// Single-element collection over the parent's item at `index`.
    ///
    /// The index is applied to the parent's snapshot each time the child
    /// resolves, so an out-of-range index fails at resolution time.
    pub async fn get(&self, index: usize) -> Result<Self, ElementsError> {
        self.derive(format!("[{index}]"), move |scope: ResolveScope<D>| async move {
            let items = scope.require_parent()?.items().await?;
            let len = items.len();
            items
                .into_iter()
                .nth(index)
                .map(|node| vec![node])
                .ok_or(ElementsError::IndexOutOfRange { index, len })
        })
        .await
    }

    /// One single-element child per item of the current snapshot.
    pub async fn children(&self) -> Result<Vec<Self>, ElementsError> {
        let len = self.len().await?;
        let mut children = Vec::with_capacity(len);
        for index in 0..len {
            children.push(self.get(index).await?);
        }
        Ok(children)
    }

    fn resolve_ttl(&self, ttl: Option<f64>) -> Result<f64, ElementsError> {
        let ttl = ttl.unwrap_or(self.inner.config.ttl);
        if !(ttl >= 0.0) {
            return Err(ElementsError::InvalidBudget(format!(
                "ttl ({ttl}) must be non-negative"
            )));
        }
        Ok(ttl)
    }

    fn waiter(&self) -> Result<Waiter, ElementsError> {
        Waiter::new(0, 0.0, self.inner.config.pause)
    }

    /// Run `operation` against this collection, retrying recognized failures
    /// for up to `ttl` seconds.
    ///
    /// With `update`, each failure refreshes this collection and its
    /// ancestors before the next attempt. A resolved ttl of zero runs the
    /// operation exactly once.
    pub async fn retried<T, F, Fut>(
        &self,
        mut operation: F,
        update: bool,
        ttl: Option<f64>,
    ) -> Result<T, ElementsError>
    where
        F: FnMut(Elements<D>) -> Fut,
        Fut: Future<Output = Result<T, ElementsError>>,
    {
        let ttl = self.resolve_ttl(ttl)?;
        if ttl == 0.0 {
            return operation(self.clone()).await;
        }

        let retry_on = self.inner.config.retry_on.clone();
        if update {
            ExceptionRetryElementsWaiter::new(self.clone(), self.waiter()?, retry_on)?
                .wait(operation, None, Some(ttl))
                .await
        } else {
            let this = self.clone();
            ExceptionRetryWaiter::new(self.waiter()?, retry_on)?
                .with_logger(Arc::clone(&self.inner.logger))
                .wait(|| operation(this.clone()), None, Some(ttl))
                .await
        }
    }

    /// Retry `operation` without refreshing anything between attempts.
    pub async fn run<T, F, Fut>(&self, operation: F, ttl: Option<f64>) -> Result<T, ElementsError>
    where
        F: FnMut(Elements<D>) -> Fut,
        Fut: Future<Output = Result<T, ElementsError>>,
    {
        self.retried(operation, false, ttl).await
    }

    /// Apply `operation` to each element, in order, and collect the results.
    ///
    /// Every element is exposed as its own single-element child, and each call
    /// is retried with refresh. The whole iteration shares one wall-clock
    /// budget: each element gets whatever the previous ones left over.
    pub async fn foreach_collect<T, F, Fut>(
        &self,
        operation: F,
        options: ForEachOptions,
    ) -> Result<Vec<T>, ElementsError>
    where
        F: Fn(Elements<D>) -> Fut,
        Fut: Future<Output = Result<T, ElementsError>>,
    {
        let total = self.resolve_ttl(options.ttl)?;
        let started = Instant::now();
        let children = self.children().await?;
        let mut results = Vec::with_capacity(children.len());

        for (position, child) in children.into_iter().enumerate() {
            if position > 0 {
                if let Some(pause) = options
                    .pause
                    .and_then(|pause| Duration::try_from_secs_f64(pause).ok())
                {
                    sleep(pause).await;
                }
            }
            let remaining = (total - started.elapsed().as_secs_f64()).max(0.0);
            let value = child.retried(&operation, true, Some(remaining)).await?;
            results.push(value);
        }

        Ok(results)
    }

    /// Like [`Elements::foreach_collect`], discarding results.
    pub async fn foreach<T, F, Fut>(&self, operation: F, options: ForEachOptions) -> Result<Self, ElementsError>
    where
        F: Fn(Elements<D>) -> Fut,
        Fut: Future<Output = Result<T, ElementsError>>,
    {
        self.foreach_collect(operation, options).await?;
        Ok(self.clone())
    }

    /// Poll `condition`, refreshing between polls, until it holds.
    ///
    /// A zero ttl polls exactly once.
    pub async fn until(&self, condition: &Condition<D>, ttl: Option<f64>) -> Result<Self, ElementsError> {
        let ttl = self.resolve_ttl(ttl)?;
        let waiter = ConditionElementsWaiter::new(
            self.clone(),
            self.waiter()?,
            self.inner.config.retry_on.clone(),
        );
        if ttl == 0.0 {
            waiter.wait(condition, Some(1), None).await
        } else {
            waiter.wait(condition, None, Some(ttl)).await
        }
    }

    /// [`Elements::until`], then a final direct check that turns a timeout
    /// into an assertion failure.
    pub async fn insist(&self, condition: &Condition<D>, ttl: Option<f64>) -> Result<Self, ElementsError> {
        match self.until(condition, ttl).await {
            Err(ElementsError::Timeout { .. }) => {}
            other => return other,
        }
        if condition.check(self.clone()).await {
            Ok(self.clone())
        } else {
            Err(ElementsError::Assertion {
                condition: condition.describe(),
            })
        }
    }

    async fn matches(&self, query: &Query, only_displayed: bool) -> Result<Nodes<D>, ElementsError> {
        let driver = self.driver();
        let mut matches = Vec::new();
        for node in self.items().await? {
            for found in driver.resolve_query(&node, query).await? {
                if !only_displayed || driver.is_visible(&found).await? {
                    matches.push(found);
                }
            }
        }
        Ok(matches)
    }

    /// Child collection of every match of `query` beneath each element.
    ///
    /// Matches are flattened in parent order; duplicates are kept.
    pub async fn query(&self, query: Query, options: FindOptions) -> Result<Self, ElementsError> {
        let only_displayed = options
            .only_displayed
            .unwrap_or(self.inner.config.only_displayed);
        let ttl = options.ttl;
        let label = query.to_string();
        let query = Arc::new(query);

        let found = self
            .derive(label, move |scope: ResolveScope<D>| {
                let query = Arc::clone(&query);
                async move {
                    let parent = scope.require_parent()?;
                    let groups = parent
                        .foreach_collect(
                            move |element: Elements<D>| {
                                let query = Arc::clone(&query);
                                async move { element.matches(&query, only_displayed).await }
                            },
                            ForEachOptions { pause: None, ttl },
                        )
                        .await?;
                    Ok(groups.into_iter().flatten().collect())
                }
            })
            .await?;

        if options.wait {
            found.until(&Condition::non_empty(), ttl).await
        } else {
            Ok(found)
        }
    }

    pub async fn find(&self, selector: impl Into<String>, options: FindOptions) -> Result<Self, ElementsError> {
        self.query(Query::Css(selector.into()), options).await
    }

    pub async fn xpath(&self, selector: impl Into<String>, options: FindOptions) -> Result<Self, ElementsError> {
        self.query(Query::XPath(selector.into()), options).await
    }

    /// Anchors whose text equals `text`, or contains it when `exact` is false.
    pub async fn find_link(
        &self,
        text: impl Into<String>,
        exact: bool,
        options: FindOptions,
    ) -> Result<Self, ElementsError> {
        let query = if exact {
            Query::LinkText(text.into())
        } else {
            Query::PartialLinkText(text.into())
        };
        self.query(query, options).await
    }

    /// Find with wait, then insist the first match is displayed.
    pub async fn find_with_wait(
        &self,
        selector: impl Into<String>,
        options: FindOptions,
    ) -> Result<Self, ElementsError> {
        let found = self
            .find(selector, FindOptions {
                wait: true,
                ..options
            })
            .await?;
        found.insist(&Condition::displayed(), options.ttl).await
    }

    /// Child collection of the elements for which `condition` holds.
    pub async fn filter(&self, condition: Condition<D>) -> Result<Self, ElementsError> {
        let label = format!("filter({})", condition.describe());
        self.derive(label, move |scope: ResolveScope<D>| {
            let condition = condition.clone();
            async move {
                let mut kept = Vec::new();
                for child in scope.require_parent()?.children().await? {
                    if condition.check(child.clone()).await {
                        kept.extend(child.items().await?);
                    }
                }
                Ok(kept)
            }
        })
        .await
    }

    /// Collection holding the parent node of the first element.
    pub async fn parent(&self) -> Result<Self, ElementsError> {
        self.derive("parent", |scope: ResolveScope<D>| async move {
            let driver = Arc::clone(&scope.driver);
            match scope.require_parent()?.first().await? {
                Some(node) => Ok(driver.parent_of(&node).await?.into_iter().collect()),
                None => Ok(Vec::new()),
            }
        })
        .await
    }

    /// Collection holding the focused element of the page.
    pub async fn switch_to_active_element(&self) -> Result<Self, ElementsError> {
        self.derive("active_element", |scope: ResolveScope<D>| async move {
            let driver = Arc::clone(&scope.driver);
            if scope.require_parent()?.is_empty().await? {
                return Ok(Vec::new());
            }
            Ok(driver.active_element().await?.into_iter().collect())
        })
        .await
    }

    async fn read_first<T, R, RFut>(&self, empty: T, read: R, ttl: Option<f64>) -> Result<T, ElementsError>
    where
        T: Clone,
        R: Fn(Arc<D>, D::Node) -> RFut,
        RFut: Future<Output = Result<T, DriverError>>,
    {
        let read = &read;
        let empty = &empty;
        self.retried(
            move |elements: Elements<D>| async move {
                match elements.first().await? {
                    Some(node) => Ok(read(Arc::clone(elements.driver()), node).await?),
                    None => Ok(empty.clone()),
                }
            },
            true,
            ttl,
        )
        .await
    }

    pub async fn is_displayed(&self, ttl: Option<f64>) -> Result<bool, ElementsError> {
        self.read_first(false, |driver, node| async move { driver.is_visible(&node).await }, ttl)
            .await
    }

    pub async fn is_enabled(&self, ttl: Option<f64>) -> Result<bool, ElementsError> {
        self.read_first(false, |driver, node| async move { driver.is_enabled(&node).await }, ttl)
            .await
    }

    pub async fn is_selected(&self, ttl: Option<f64>) -> Result<bool, ElementsError> {
        self.read_first(false, |driver, node| async move { driver.is_selected(&node).await }, ttl)
            .await
    }

    pub async fn text(&self, ttl: Option<f64>) -> Result<Option<String>, ElementsError> {
        self.read_first(
            None,
            |driver, node| async move { driver.read_text(&node).await.map(Some) },
            ttl,
        )
        .await
    }

    pub async fn tag_name(&self, ttl: Option<f64>) -> Result<Option<String>, ElementsError> {
        self.read_first(
            None,
            |driver, node| async move { driver.read_tag_name(&node).await.map(Some) },
            ttl,
        )
        .await
    }

    pub async fn value(&self, ttl: Option<f64>) -> Result<Option<String>, ElementsError> {
        self.attribute("value", ttl).await
    }

    pub async fn attribute(&self, name: &str, ttl: Option<f64>) -> Result<Option<String>, ElementsError> {
        self.read_first(
            None,
            move |driver, node| async move { driver.read_attribute(&node, name).await },
            ttl,
        )
        .await
    }

    pub async fn clear(&self, ttl: Option<f64>) -> Result<Self, ElementsError> {
        self.foreach(
            |element: Elements<D>| async move {
                for node in element.items().await? {
                    element.driver().clear(&node).await?;
                }
                Ok(())
            },
            ForEachOptions { pause: None, ttl },
        )
        .await
    }

    /// Click every element, sleeping `pause` seconds between clicks.
    pub async fn click(&self, pause: Option<f64>, ttl: Option<f64>) -> Result<Self, ElementsError> {
        self.foreach(
            |element: Elements<D>| async move {
                for node in element.items().await? {
                    element.driver().click(&node).await?;
                }
                Ok(())
            },
            ForEachOptions { pause, ttl },
        )
        .await
    }

    /// Type `text` into every element.
    pub async fn write(&self, text: &str, ttl: Option<f64>) -> Result<Self, ElementsError> {
        self.foreach(
            move |element: Elements<D>| async move {
                for node in element.items().await? {
                    element.driver().send_keys(&node, text).await?;
                }
                Ok(())
            },
            ForEachOptions { pause: None, ttl },
        )
        .await
    }

    pub async fn select(&self, by: &SelectBy, ttl: Option<f64>) -> Result<Self, ElementsError> {
        self.foreach(
            move |element: Elements<D>| async move {
                for node in element.items().await? {
                    element.driver().select_option(&node, by).await?;
                }
                Ok(())
            },
            ForEachOptions { pause: None, ttl },
        )
        .await
    }

    /// Deselect the matching option, or every option when `by` is `None`.
    pub async fn deselect(&self, by: Option<&SelectBy>, ttl: Option<f64>) -> Result<Self, ElementsError> {
        self.foreach(
            move |element: Elements<D>| async move {
                for node in element.items().await? {
                    element.driver().deselect_option(&node, by).await?;
                }
                Ok(())
            },
            ForEachOptions { pause: None, ttl },
        )
        .await
    }

    pub async fn title(&self, ttl: Option<f64>) -> Result<String, ElementsError> {
        self.retried(
            |elements: Elements<D>| async move { Ok(elements.driver().title().await?) },
            true,
            ttl,
        )
        .await
    }

    pub async fn source(&self, ttl: Option<f64>) -> Result<String, ElementsError> {
        self.retried(
            |elements: Elements<D>| async move { Ok(elements.driver().page_source().await?) },
            true,
            ttl,
        )
        .await
    }

    /// Load `url`, retrying navigation failures without refreshing the
    /// collection.
    pub async fn navigate(&self, url: &str, ttl: Option<f64>) -> Result<Self, ElementsError> {
        self.run(
            move |elements: Elements<D>| async move { Ok(elements.driver().navigate(url).await?) },
            ttl,
        )
        .await?;
        Ok(self.clone())
    }

    pub async fn refresh(&self) -> Result<Self, ElementsError> {
        self.inner.driver.refresh().await?;
        Ok(self.clone())
    }

    pub async fn current_url(&self) -> Result<Option<String>, ElementsError> {
        Ok(self.inner.driver.current_url().await?)
    }

    pub async fn execute_script(&self, script: &str, ttl: Option<f64>) -> Result<JsonValue, ElementsError> {
        self.run(
            move |elements: Elements<D>| async move {
                Ok(elements.driver().execute_script(script).await?)
            },
            ttl,
        )
        .await
    }

    /// Window size, or `None` when the driver cannot report it.
    pub async fn window_size(&self) -> Option<WindowSize> {
        match self.inner.driver.window_size().await {
            Ok(size) => Some(size),
            Err(err) => {
                self.inner.logger.error(
                    format!("failed to read window size: {err}"),
                    Some(LOG_CATEGORY),
                    None,
                );
                None
            }
        }
    }

    /// Resize the window, then sleep `settle` seconds. Failures are logged and
    /// swallowed.
    pub async fn set_window_size(&self, size: WindowSize, settle: Option<f64>) -> Self {
        match self.inner.driver.set_window_size(size).await {
            Ok(()) => self.settle(settle).await,
            Err(err) => self.inner.logger.error(
                format!("failed to resize window to {}x{}: {err}", size.width, size.height),
                Some(LOG_CATEGORY),
                None,
            ),
        }
        self.clone()
    }

    /// Scroll the window to `(x, y)`. `y` is a script expression so callers
    /// can pass e.g. `document.body.scrollHeight`.
    pub async fn scroll(&self, x: i64, y: &str, settle: Option<f64>) -> Result<Self, ElementsError> {
        let script = format!("window.scrollTo({x}, {y})");
        self.inner.driver.execute_script(&script).await?;
        self.settle(settle).await;
        Ok(self.clone())
    }

    pub async fn scroll_top(&self, x: i64, settle: Option<f64>) -> Result<Self, ElementsError> {
        self.scroll(x, "0", settle).await
    }

    pub async fn scroll_bottom(&self, x: i64, settle: Option<f64>) -> Result<Self, ElementsError> {
        self.scroll(x, "document.body.scrollHeight", settle).await
    }

    async fn settle(&self, settle: Option<f64>) {
        let seconds = settle.unwrap_or(self.inner.config.pause);
        if let Ok(pause) = Duration::try_from_secs_f64(seconds) {
            if !pause.is_zero() {
                sleep(pause).await;
            }
        }
    }
}
