//! Lazy, context-chained element collections over a live browser page.
//!
//! An [`Elements`] value is an ordered list of driver nodes plus the recipe
//! that produced it. Collections derived from one another form a chain back
//! to the page root, so a stale result can be rebuilt by replaying the chain.
//! Every page interaction is wrapped in a retry policy from [`waiters`].

pub mod adapter;
pub mod browser;
pub mod config;
pub mod driver;
pub mod elements;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod waiters;

pub use browser::{BrowserRuntime, ElementiumBrowser, ElementiumError, LaunchPlan};
pub use config::{ElementiumConfig, ElementsConfig, Verbosity};
pub use driver::{Driver, Query, SelectBy, WindowSize};
pub use elements::{Elements, FindOptions, ForEachOptions};
pub use error::{DriverError, ElementsError, FailureKind};
pub use runtime::ChromiumoxideRuntime;
pub use waiters::{Condition, Waiter};
