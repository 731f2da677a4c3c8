//! Retry and polling policies bounded by an attempt count or a time budget.
//!
//! A [`Waiter`] carries the default budget and the initial backoff pause. The
//! concrete waiters resolve a per-call budget from it and then loop:
//!
//! * [`ExceptionRetryWaiter`] retries a bare operation while it fails with a
//!   recognized [`FailureKind`].
//! * [`ExceptionRetryElementsWaiter`] does the same for an operation bound to
//!   an [`Elements`] collection, refreshing the collection (and its ancestors)
//!   after every recognized failure.
//! * [`ConditionElementsWaiter`] polls a [`Condition`] against a collection,
//!   refreshing between polls, until it holds or the budget runs out.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::{Instant, sleep};

use crate::driver::Driver;
use crate::elements::Elements;
use crate::error::{ElementsError, FailureKind};
use crate::logging::{ElementiumLogger, LogLevel, WaiterEvent};

/// Initial pause between attempts, in seconds.
pub const DEFAULT_PAUSE_SECS: f64 = 0.25;
/// Default time budget for retried operations, in seconds.
pub const DEFAULT_TTL_SECS: f64 = 20.0;

const BACKOFF_CAP_FACTOR: f64 = 4.0;

/// A resolved per-call budget. Exactly one of `n` and `ttl` is nonzero unless
/// it was forced through [`Waiter::force_budget`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Budget {
    pub n: i64,
    pub ttl: f64,
}

/// Budget defaults and backoff unit shared by the concrete waiters.
#[derive(Debug, Clone, PartialEq)]
pub struct Waiter {
    n: i64,
    ttl: f64,
    pause: f64,
    forced: Option<Budget>,
}

impl Default for Waiter {
    fn default() -> Self {
        Self {
            n: 0,
            ttl: DEFAULT_TTL_SECS,
            pause: DEFAULT_PAUSE_SECS,
            forced: None,
        }
    }
}

impl Waiter {
    /// Build a waiter with default budget `n` attempts or `ttl` seconds.
    ///
    /// Both may be zero, in which case every call must supply its own budget.
    pub fn new(n: i64, ttl: f64, pause: f64) -> Result<Self, ElementsError> {
        if n < 0 || !(ttl >= 0.0) || !(pause >= 0.0) {
            return Err(ElementsError::InvalidBudget(format!(
                "n ({n}), ttl ({ttl}) and pause ({pause}) must be non-negative"
            )));
        }
        if n != 0 && ttl != 0.0 {
            return Err(ElementsError::InvalidBudget(format!(
                "n ({n}) and ttl ({ttl}) are mutually exclusive"
            )));
        }
        Ok(Self {
            n,
            ttl,
            pause,
            forced: None,
        })
    }

    /// Skip budget validation and use exactly `n`/`ttl` for every call.
    ///
    /// This is a low-level escape hatch; a forced budget with no remaining
    /// attempts makes the elements waiter fail with
    /// [`ElementsError::WaiterNeverRan`].
    pub fn force_budget(mut self, n: i64, ttl: f64) -> Self {
        self.forced = Some(Budget { n, ttl });
        self
    }

    /// Resolve the budget for one call.
    pub fn resolve_budget(&self, n: Option<i64>, ttl: Option<f64>) -> Result<Budget, ElementsError> {
        if let Some(forced) = self.forced {
            return Ok(forced);
        }

        let n = n.unwrap_or(0);
        let ttl = ttl.unwrap_or(0.0);

        if n < 0 || !(ttl >= 0.0) {
            return Err(ElementsError::InvalidBudget(format!(
                "n ({n}) and ttl ({ttl}) must be non-negative"
            )));
        }
        if n != 0 && ttl != 0.0 {
            return Err(ElementsError::InvalidBudget(format!(
                "n ({n}) and ttl ({ttl}) are mutually exclusive"
            )));
        }
        if n == 0 && ttl == 0.0 {
            if self.n == 0 && self.ttl == 0.0 {
                return Err(ElementsError::InvalidBudget(
                    "must set either n or ttl".to_string(),
                ));
            }
            return Ok(Budget {
                n: self.n,
                ttl: self.ttl,
            });
        }
        Ok(Budget { n, ttl })
    }

    /// Start counting against `budget`. Unless the budget was forced, the
    /// first attempt is always granted, even when a tiny ttl has already
    /// elapsed by the time the loop checks it.
    fn attempts(&self, budget: Budget) -> Attempts {
        Attempts::start(budget, self.forced.is_none())
    }
}

/// Remaining attempts and deadline for one `wait` call.
#[derive(Debug)]
struct Attempts {
    remaining: i64,
    deadline: Option<Instant>,
    made: u32,
    grant_first: bool,
}

impl Attempts {
    fn start(budget: Budget, grant_first: bool) -> Self {
        let deadline = if budget.ttl > 0.0 {
            Duration::try_from_secs_f64(budget.ttl)
                .ok()
                .and_then(|ttl| Instant::now().checked_add(ttl))
        } else {
            None
        };
        Self {
            remaining: budget.n,
            deadline,
            made: 0,
            grant_first,
        }
    }

    fn has_budget(&self) -> bool {
        (self.grant_first && self.made == 0)
            || self.remaining > 0
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() < deadline)
    }

    fn consume(&mut self) {
        self.remaining -= 1;
        self.made += 1;
    }
}

/// Doubling pause, capped at a fixed multiple of the initial value.
#[derive(Debug)]
struct Backoff {
    current: f64,
    cap: f64,
}

impl Backoff {
    fn new(pause: f64) -> Self {
        Self {
            current: pause,
            cap: pause * BACKOFF_CAP_FACTOR,
        }
    }

    async fn sleep(&mut self) {
        if let Ok(pause) = Duration::try_from_secs_f64(self.current) {
            if !pause.is_zero() {
                sleep(pause).await;
            }
        }
        self.current = (self.current * 2.0).min(self.cap);
    }
}

fn log_retry(
    logger: Option<&ElementiumLogger>,
    attempt: u32,
    err: &ElementsError,
    subject: Option<&str>,
) {
    if let Some(logger) = logger {
        logger.waiter(
            LogLevel::Debug,
            subject,
            WaiterEvent::Retrying {
                attempt,
                kind: err.kind(),
                error: err.to_string(),
            },
        );
    }
}

fn log_refresh_failure(logger: &ElementiumLogger, err: &ElementsError, subject: &str) {
    logger.waiter(
        LogLevel::Debug,
        Some(subject),
        WaiterEvent::RefreshFailed {
            kind: err.kind(),
            error: err.to_string(),
        },
    );
}

/// Retries an operation while it fails with a recognized failure kind.
#[derive(Debug, Clone)]
pub struct ExceptionRetryWaiter {
    waiter: Waiter,
    retry_on: Vec<FailureKind>,
    logger: Option<Arc<ElementiumLogger>>,
}

impl ExceptionRetryWaiter {
    pub fn new(waiter: Waiter, retry_on: Vec<FailureKind>) -> Result<Self, ElementsError> {
        if retry_on.is_empty() {
            return Err(ElementsError::InvalidArgument(
                "at least one failure kind must be recognized".to_string(),
            ));
        }
        Ok(Self {
            waiter,
            retry_on,
            logger: None,
        })
    }

    pub fn with_logger(mut self, logger: Arc<ElementiumLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Run `operation` until it succeeds, fails with an unrecognized kind, or
    /// the budget is spent. The last failure is returned unchanged.
    pub async fn wait<T, F, Fut>(
        &self,
        mut operation: F,
        n: Option<i64>,
        ttl: Option<f64>,
    ) -> Result<T, ElementsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ElementsError>>,
    {
        let budget = self.waiter.resolve_budget(n, ttl)?;
        let mut attempts = self.waiter.attempts(budget);
        let mut backoff = Backoff::new(self.waiter.pause);

        loop {
            attempts.consume();
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_one_of(&self.retry_on) && attempts.has_budget() => {
                    log_retry(self.logger.as_deref(), attempts.made, &err, None);
                    backoff.sleep().await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Retries an operation bound to a collection, refreshing the collection
/// after each recognized failure.
pub struct ExceptionRetryElementsWaiter<D: Driver> {
    elements: Elements<D>,
    waiter: Waiter,
    retry_on: Vec<FailureKind>,
}

impl<D: Driver> ExceptionRetryElementsWaiter<D> {
    pub fn new(
        elements: Elements<D>,
        waiter: Waiter,
        retry_on: Vec<FailureKind>,
    ) -> Result<Self, ElementsError> {
        if retry_on.is_empty() {
            return Err(ElementsError::InvalidArgument(
                "at least one failure kind must be recognized".to_string(),
            ));
        }
        Ok(Self {
            elements,
            waiter,
            retry_on,
        })
    }

    pub fn elements(&self) -> &Elements<D> {
        &self.elements
    }

    pub async fn wait<T, F, Fut>(
        &self,
        mut operation: F,
        n: Option<i64>,
        ttl: Option<f64>,
    ) -> Result<T, ElementsError>
    where
        F: FnMut(Elements<D>) -> Fut,
        Fut: Future<Output = Result<T, ElementsError>>,
    {
        let budget = self.waiter.resolve_budget(n, ttl)?;
        let mut attempts = self.waiter.attempts(budget);
        let mut backoff = Backoff::new(self.waiter.pause);
        let logger = self.elements.logger();
        let subject = self.elements.path();
        let mut last_error = None;

        while attempts.has_budget() {
            attempts.consume();
            let err = match operation(self.elements.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_one_of(&self.retry_on) => err,
                Err(err) => return Err(err),
            };

            log_retry(Some(&**logger), attempts.made, &err, Some(&subject));

            if let Err(update_err) = self.elements.update(true).await {
                if !update_err.is_one_of(&self.retry_on) {
                    return Err(update_err);
                }
                log_refresh_failure(logger, &update_err, &subject);
            }
            last_error = Some(err);

            if attempts.has_budget() {
                backoff.sleep().await;
            }
        }

        Err(last_error.unwrap_or(ElementsError::WaiterNeverRan {
            n: budget.n,
            ttl: budget.ttl,
        }))
    }
}

type ConditionFn<D> = Arc<dyn Fn(Elements<D>) -> BoxFuture<'static, bool> + Send + Sync>;

/// An async predicate over a collection, with a label used in diagnostics.
pub struct Condition<D: Driver> {
    label: String,
    check: ConditionFn<D>,
}

impl<D: Driver> Clone for Condition<D> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            check: Arc::clone(&self.check),
        }
    }
}

impl<D: Driver> fmt::Debug for Condition<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("label", &self.describe())
            .finish()
    }
}

impl<D: Driver> Condition<D> {
    pub fn new<F, Fut>(label: impl Into<String>, check: F) -> Self
    where
        F: Fn(Elements<D>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            label: label.into(),
            check: Arc::new(move |elements: Elements<D>| -> BoxFuture<'static, bool> {
                Box::pin(check(elements))
            }),
        }
    }

    /// A condition with no label; it is reported as `Unknown`.
    pub fn unlabeled<F, Fut>(check: F) -> Self
    where
        F: Fn(Elements<D>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self::new(String::new(), check)
    }

    /// Holds once the collection resolves to at least one element.
    pub fn non_empty() -> Self {
        Self::new("collection is not empty", |elements: Elements<D>| async move {
            elements.len().await.is_ok_and(|len| len > 0)
        })
    }

    /// Holds once the collection resolves to exactly `count` elements.
    pub fn count(count: usize) -> Self {
        Self::new(
            format!("collection has {count} element(s)"),
            move |elements: Elements<D>| async move {
                elements.len().await.is_ok_and(|len| len == count)
            },
        )
    }

    /// Holds once the first element is visible. Driver failures count as
    /// "not yet".
    pub fn displayed() -> Self {
        Self::new("first element is displayed", |elements: Elements<D>| async move {
            match elements.first().await {
                Ok(Some(node)) => elements.driver().is_visible(&node).await.unwrap_or(false),
                _ => false,
            }
        })
    }

    pub fn describe(&self) -> String {
        if self.label.trim().is_empty() {
            "Unknown".to_string()
        } else {
            self.label.clone()
        }
    }

    pub async fn check(&self, elements: Elements<D>) -> bool {
        (self.check)(elements).await
    }
}

/// Polls a [`Condition`] against a collection until it holds.
pub struct ConditionElementsWaiter<D: Driver> {
    elements: Elements<D>,
    waiter: Waiter,
    retry_on: Vec<FailureKind>,
}

impl<D: Driver> ConditionElementsWaiter<D> {
    pub fn new(elements: Elements<D>, waiter: Waiter, retry_on: Vec<FailureKind>) -> Self {
        Self {
            elements,
            waiter,
            retry_on,
        }
    }

    pub async fn wait(
        &self,
        condition: &Condition<D>,
        n: Option<i64>,
        ttl: Option<f64>,
    ) -> Result<Elements<D>, ElementsError> {
        let budget = self.waiter.resolve_budget(n, ttl)?;
        let mut attempts = self.waiter.attempts(budget);
        let mut backoff = Backoff::new(self.waiter.pause);
        let logger = self.elements.logger();
        let subject = self.elements.path();

        while attempts.has_budget() {
            attempts.consume();
            if condition.check(self.elements.clone()).await {
                return Ok(self.elements.clone());
            }

            backoff.sleep().await;
            if let Err(err) = self.elements.update(true).await {
                if !err.is_one_of(&self.retry_on) {
                    return Err(err);
                }
                log_refresh_failure(logger, &err, &subject);
            }
        }

        let condition = condition.describe();
        logger.waiter(
            LogLevel::Info,
            Some(&subject),
            WaiterEvent::GaveUp {
                polls: attempts.made,
                condition: condition.clone(),
            },
        );
        Err(ElementsError::Timeout { condition })
    }
}
