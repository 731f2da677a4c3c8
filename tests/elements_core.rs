use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use elementium_rs::config::ElementsConfig;
use elementium_rs::driver::{Driver, Query, SelectBy, WindowSize};
use elementium_rs::elements::{Elements, FindOptions, ForEachOptions, ResolveScope};
use elementium_rs::error::{DriverError, ElementsError, FailureKind};
use elementium_rs::config::Verbosity;
use elementium_rs::logging::{ElementiumLogRecord, ElementiumLogger, LogCallback, LogConfig, WaiterEvent};
use elementium_rs::waiters::{
    Condition, ConditionElementsWaiter, ExceptionRetryElementsWaiter, ExceptionRetryWaiter, Waiter,
};
use serde_json::{Value as JsonValue, json};
use tokio::time::Instant;

const DOCUMENT: usize = 0;

#[derive(Debug, Clone)]
struct FakeNode {
    tag: &'static str,
    parent: usize,
    text: &'static str,
    visible: bool,
    attributes: HashMap<&'static str, &'static str>,
}

fn node(tag: &'static str, parent: usize, text: &'static str) -> FakeNode {
    FakeNode {
        tag,
        parent,
        text,
        visible: true,
        attributes: HashMap::new(),
    }
}

/// In-memory document. Node 0 is the document itself.
#[derive(Default)]
struct FakeDom {
    nodes: Mutex<Vec<FakeNode>>,
    root_resolutions: AtomicUsize,
    stale_clicks: AtomicUsize,
    clicked: Mutex<Vec<usize>>,
    typed: Mutex<Vec<(usize, String)>>,
    selected: Mutex<Vec<(usize, SelectBy)>>,
    focused: Mutex<Option<usize>>,
    url: Mutex<Option<String>>,
    window: Mutex<Option<WindowSize>>,
    resize_fails: AtomicBool,
    scripts: Mutex<Vec<String>>,
}

impl FakeDom {
    fn new(nodes: Vec<FakeNode>) -> Arc<Self> {
        let mut all = vec![node("#document", DOCUMENT, "")];
        all.extend(nodes);
        Arc::new(Self {
            nodes: Mutex::new(all),
            ..Self::default()
        })
    }

    fn with_node<T>(&self, id: usize, read: impl FnOnce(&FakeNode) -> T) -> Result<T, DriverError> {
        let nodes = self.nodes.lock().unwrap();
        nodes
            .get(id)
            .map(read)
            .ok_or_else(|| DriverError::stale_element(format!("node {id} is gone")))
    }

    fn is_descendant(nodes: &[FakeNode], mut id: usize, ancestor: usize) -> bool {
        while id != DOCUMENT {
            id = nodes[id].parent;
            if id == ancestor {
                return true;
            }
        }
        false
    }

    fn push(&self, fake: FakeNode) {
        self.nodes.lock().unwrap().push(fake);
    }
}

#[async_trait]
impl Driver for FakeDom {
    type Node = usize;

    async fn resolve_root(&self) -> Result<usize, DriverError> {
        self.root_resolutions.fetch_add(1, Ordering::SeqCst);
        Ok(DOCUMENT)
    }

    async fn resolve_query(&self, node: &usize, query: &Query) -> Result<Vec<usize>, DriverError> {
        let nodes = self.nodes.lock().unwrap();
        if *node >= nodes.len() {
            return Err(DriverError::stale_element(format!("node {node} is gone")));
        }
        let matches = |fake: &FakeNode| match query {
            Query::Css(tag) => fake.tag == tag,
            Query::XPath(path) => fake.tag == path.trim_start_matches("//"),
            Query::LinkText(text) => fake.tag == "a" && fake.text == text,
            Query::PartialLinkText(text) => fake.tag == "a" && fake.text.contains(text.as_str()),
        };
        Ok((1..nodes.len())
            .filter(|id| Self::is_descendant(&nodes, *id, *node) && matches(&nodes[*id]))
            .collect())
    }

    async fn is_visible(&self, node: &usize) -> Result<bool, DriverError> {
        self.with_node(*node, |fake| fake.visible)
    }

    async fn read_attribute(&self, node: &usize, name: &str) -> Result<Option<String>, DriverError> {
        self.with_node(*node, |fake| fake.attributes.get(name).map(|v| v.to_string()))
    }

    async fn read_text(&self, node: &usize) -> Result<String, DriverError> {
        self.with_node(*node, |fake| fake.text.to_string())
    }

    async fn read_tag_name(&self, node: &usize) -> Result<String, DriverError> {
        self.with_node(*node, |fake| fake.tag.to_string())
    }

    async fn is_enabled(&self, node: &usize) -> Result<bool, DriverError> {
        self.with_node(*node, |fake| !fake.attributes.contains_key("disabled"))
    }

    async fn click(&self, node: &usize) -> Result<(), DriverError> {
        if self.stale_clicks.load(Ordering::SeqCst) > 0 {
            self.stale_clicks.fetch_sub(1, Ordering::SeqCst);
            return Err(DriverError::stale_element("element is not attached"));
        }
        self.clicked.lock().unwrap().push(*node);
        Ok(())
    }

    async fn send_keys(&self, node: &usize, text: &str) -> Result<(), DriverError> {
        self.typed.lock().unwrap().push((*node, text.to_string()));
        *self.focused.lock().unwrap() = Some(*node);
        Ok(())
    }

    async fn select_option(&self, node: &usize, by: &SelectBy) -> Result<(), DriverError> {
        if self.with_node(*node, |fake| fake.tag)? != "select" {
            return Err(DriverError::not_interactable("not a select"));
        }
        self.selected.lock().unwrap().push((*node, by.clone()));
        Ok(())
    }

    async fn parent_of(&self, node: &usize) -> Result<Option<usize>, DriverError> {
        if *node == DOCUMENT {
            return Ok(None);
        }
        self.with_node(*node, |fake| Some(fake.parent))
    }

    async fn active_element(&self) -> Result<Option<usize>, DriverError> {
        Ok(*self.focused.lock().unwrap())
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        *self.url.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>, DriverError> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn execute_script(&self, script: &str) -> Result<JsonValue, DriverError> {
        self.scripts.lock().unwrap().push(script.to_string());
        match script {
            "document.title" => Ok(json!("Fake page")),
            other if other.starts_with("window.scrollTo") => Ok(JsonValue::Null),
            other => Err(DriverError::script(format!("unknown script: {other}"))),
        }
    }

    async fn window_size(&self) -> Result<WindowSize, DriverError> {
        self.window
            .lock()
            .unwrap()
            .ok_or_else(|| DriverError::unsupported("window size"))
    }

    async fn set_window_size(&self, size: WindowSize) -> Result<(), DriverError> {
        if self.resize_fails.load(Ordering::SeqCst) {
            return Err(DriverError::navigation("window is minimized"));
        }
        *self.window.lock().unwrap() = Some(size);
        Ok(())
    }
}

/// `<ul id=1>` with three `<li>`s, one hidden, and a link inside the second.
fn list_page() -> Arc<FakeDom> {
    let mut hidden = node("li", 1, "three");
    hidden.visible = false;
    let mut input = node("input", DOCUMENT, "");
    input.attributes.insert("value", "hello");
    input.attributes.insert("name", "q");
    FakeDom::new(vec![
        node("ul", DOCUMENT, ""),
        node("li", 1, "one"),
        node("li", 1, "two"),
        hidden,
        node("a", 3, "Read more"),
        input,
        node("select", DOCUMENT, ""),
    ])
}

fn config() -> ElementsConfig {
    ElementsConfig {
        ttl: 2.0,
        pause: 0.05,
        ..ElementsConfig::default()
    }
}

async fn root(dom: &Arc<FakeDom>, config: ElementsConfig) -> Elements<FakeDom> {
    Elements::root_with_logger(Arc::clone(dom), config, Arc::new(ElementiumLogger::silent()))
        .await
        .expect("root")
}

/// Child of `parent` that yields every `li` and counts its resolutions.
async fn counted_items(
    parent: &Elements<FakeDom>,
    counter: Arc<AtomicUsize>,
) -> Elements<FakeDom> {
    parent
        .derive("counted", move |scope: ResolveScope<FakeDom>| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let driver = Arc::clone(&scope.driver);
                Ok(driver
                    .resolve_query(&DOCUMENT, &Query::Css("li".into()))
                    .await?)
            }
        })
        .await
        .expect("derive")
}

fn stale() -> ElementsError {
    DriverError::stale_element("gone").into()
}

fn count_waiter() -> Waiter {
    Waiter::new(0, 0.0, 0.01).unwrap()
}

#[tokio::test(start_paused = true)]
async fn retry_waiter_reraises_after_exhausting_n() {
    let waiter = ExceptionRetryWaiter::new(count_waiter(), vec![FailureKind::StaleElement]).unwrap();
    let calls = AtomicUsize::new(0);

    let err = waiter
        .wait(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(stale())
            },
            Some(2),
            None,
        )
        .await
        .expect_err("always stale");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(err, stale());
}

#[tokio::test(start_paused = true)]
async fn elements_waiter_updates_once_per_failed_attempt() {
    let dom = list_page();
    let root = root(&dom, config()).await;
    let resolutions = Arc::new(AtomicUsize::new(0));
    let items = counted_items(&root, Arc::clone(&resolutions)).await;
    assert_eq!(resolutions.load(Ordering::SeqCst), 1);

    let calls = AtomicUsize::new(0);
    let waiter =
        ExceptionRetryElementsWaiter::new(items.clone(), count_waiter(), FailureKind::DRIVER.to_vec())
            .unwrap();
    let err = waiter
        .wait(
            |_elements| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(stale())
            },
            Some(2),
            None,
        )
        .await
        .expect_err("always stale");

    assert_eq!(err.kind(), FailureKind::StaleElement);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(resolutions.load(Ordering::SeqCst), 1 + 2);
}

#[tokio::test(start_paused = true)]
async fn elements_waiter_propagates_unrecognized_failures_without_refresh() {
    let dom = list_page();
    let root = root(&dom, config()).await;
    let resolutions = Arc::new(AtomicUsize::new(0));
    let items = counted_items(&root, Arc::clone(&resolutions)).await;

    let waiter = ExceptionRetryElementsWaiter::new(
        items,
        count_waiter(),
        vec![FailureKind::StaleElement],
    )
    .unwrap();
    let err = waiter
        .wait(
            |_elements| async { Err::<(), _>(ElementsError::Operation("boom".into())) },
            Some(5),
            None,
        )
        .await
        .expect_err("unrecognized");

    assert_eq!(err, ElementsError::Operation("boom".into()));
    assert_eq!(resolutions.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn forced_empty_budget_reports_waiter_never_ran() {
    let dom = list_page();
    let root = root(&dom, config()).await;
    let waiter = ExceptionRetryElementsWaiter::new(
        root,
        count_waiter().force_budget(-1, -1.0),
        FailureKind::DRIVER.to_vec(),
    )
    .unwrap();

    let err = waiter
        .wait(|_elements| async { Ok::<_, ElementsError>(()) }, None, None)
        .await
        .expect_err("never ran");
    assert_eq!(err, ElementsError::WaiterNeverRan { n: -1, ttl: -1.0 });
}

#[tokio::test(start_paused = true)]
async fn condition_waiter_polls_n_times_then_times_out() {
    let dom = list_page();
    let root = root(&dom, config()).await;
    let resolutions = Arc::new(AtomicUsize::new(0));
    let items = counted_items(&root, Arc::clone(&resolutions)).await;

    let checks = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&checks);
    let never = Condition::new("never holds", move |_elements: Elements<FakeDom>| {
        let seen = Arc::clone(&seen);
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            false
        }
    });

    let waiter = ConditionElementsWaiter::new(items, count_waiter(), FailureKind::DRIVER.to_vec());
    let err = waiter.wait(&never, Some(2), None).await.expect_err("timeout");

    assert_eq!(
        err,
        ElementsError::Timeout {
            condition: "never holds".into()
        }
    );
    assert_eq!(checks.load(Ordering::SeqCst), 2);
    assert_eq!(resolutions.load(Ordering::SeqCst), 1 + 2);
}

#[tokio::test(start_paused = true)]
async fn condition_waiter_honours_wall_clock_budget() {
    let dom = list_page();
    let root = root(&dom, config()).await;
    let checks = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&checks);
    let never = Condition::unlabeled(move |_elements: Elements<FakeDom>| {
        let seen = Arc::clone(&seen);
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            false
        }
    });

    let started = Instant::now();
    let waiter = ConditionElementsWaiter::new(root, count_waiter(), FailureKind::DRIVER.to_vec());
    let err = waiter.wait(&never, None, Some(2.0)).await.expect_err("timeout");

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(checks.load(Ordering::SeqCst) >= 1);
    assert_eq!(
        err,
        ElementsError::Timeout {
            condition: "Unknown".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn condition_waiter_refreshes_after_sleeping() {
    let dom = list_page();
    let root = root(&dom, config()).await;
    let paragraphs = root.find("p", FindOptions::default()).await.unwrap();
    assert!(paragraphs.is_empty().await.unwrap());

    let adder = Arc::clone(&dom);
    let added = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        adder.push(node("p", DOCUMENT, "late"));
    });

    let started = Instant::now();
    let waiter = ConditionElementsWaiter::new(
        paragraphs.clone(),
        Waiter::new(0, 0.0, 0.1).unwrap(),
        FailureKind::DRIVER.to_vec(),
    );
    let found = waiter
        .wait(&Condition::non_empty(), Some(2), None)
        .await
        .expect("second poll sees the refreshed snapshot");
    added.await.unwrap();

    assert!(found.same_collection(&paragraphs));
    assert_eq!(found.len().await.unwrap(), 1);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn tiny_ttl_still_attempts_once() {
    let dom = list_page();
    let root = root(&dom, config()).await;
    let items = root.find("li", FindOptions::default()).await.unwrap();

    let calls = AtomicUsize::new(0);
    let value = items
        .retried(
            |_elements| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ElementsError>("ran")
            },
            true,
            Some(1e-10),
        )
        .await
        .unwrap();
    assert_eq!(value, "ran");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let err = items
        .retried(
            |_elements| async { Err::<(), _>(stale()) },
            false,
            Some(1e-10),
        )
        .await
        .expect_err("stale once");
    assert_eq!(err.kind(), FailureKind::StaleElement);

    let checks = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&checks);
    let holds = Condition::new("holds", move |_elements: Elements<FakeDom>| {
        let seen = Arc::clone(&seen);
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        }
    });
    items.until(&holds, Some(1e-10)).await.unwrap();
    assert_eq!(checks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn lazy_collections_defer_resolution() {
    let dom = list_page();
    let eager_root = root(&dom, config()).await;
    assert_eq!(dom.root_resolutions.load(Ordering::SeqCst), 1);

    let eager = Arc::new(AtomicUsize::new(0));
    counted_items(&eager_root, Arc::clone(&eager)).await;
    assert_eq!(eager.load(Ordering::SeqCst), 1);

    let lazy_root = root(
        &dom,
        ElementsConfig {
            lazy: true,
            ..config()
        },
    )
    .await;
    assert_eq!(dom.root_resolutions.load(Ordering::SeqCst), 1);
    assert!(!lazy_root.is_populated());

    let lazy = Arc::new(AtomicUsize::new(0));
    let items = counted_items(&lazy_root, Arc::clone(&lazy)).await;
    assert_eq!(lazy.load(Ordering::SeqCst), 0);

    assert_eq!(items.len().await.unwrap(), 3);
    assert_eq!(items.len().await.unwrap(), 3);
    assert_eq!(lazy.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn foreach_retries_each_element_and_collects_every_result() {
    let dom = list_page();
    let root = root(&dom, config()).await;
    let items = root
        .find("li", FindOptions::default().include_hidden())
        .await
        .unwrap();
    assert_eq!(items.len().await.unwrap(), 3);

    let failed_once = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let texts = items
        .foreach_collect(
            |element: Elements<FakeDom>| {
                let failed_once = Arc::clone(&failed_once);
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let label = element.path();
                    let first_try = {
                        let mut failed = failed_once.lock().unwrap();
                        if failed.contains(&label) {
                            false
                        } else {
                            failed.push(label);
                            true
                        }
                    };
                    if first_try {
                        return Err(stale());
                    }
                    element.text(Some(0.0)).await
                }
            },
            ForEachOptions {
                pause: Some(0.01),
                ttl: Some(5.0),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        texts,
        vec![
            Some("one".to_string()),
            Some("two".to_string()),
            Some("three".to_string())
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn insist_turns_timeout_into_assertion() {
    let dom = list_page();
    let root = root(&dom, config()).await;
    let items = root.find("li", FindOptions::default()).await.unwrap();

    let err = items
        .insist(&Condition::count(5), Some(0.5))
        .await
        .expect_err("never five");
    assert_eq!(
        err,
        ElementsError::Assertion {
            condition: "collection has 5 element(s)".into()
        }
    );

    let ok = items.insist(&Condition::count(2), Some(0.5)).await.unwrap();
    assert!(ok.same_collection(&items));
}

#[tokio::test]
async fn queries_flatten_in_parent_order_and_filter_hidden() {
    let dom = list_page();
    let root = root(&dom, config()).await;

    let visible = root.find("li", FindOptions::default()).await.unwrap();
    assert_eq!(visible.items().await.unwrap(), vec![2, 3]);

    let all = root
        .xpath("//li", FindOptions::default().include_hidden())
        .await
        .unwrap();
    assert_eq!(all.items().await.unwrap(), vec![2, 3, 4]);

    // Both lists see the same `li`s, so the flattened result keeps duplicates.
    let lists = root
        .derive("twice", |scope: ResolveScope<FakeDom>| async move {
            let driver = Arc::clone(&scope.driver);
            let lists = driver
                .resolve_query(&DOCUMENT, &Query::Css("ul".into()))
                .await?;
            Ok(vec![lists[0], lists[0]])
        })
        .await
        .unwrap();
    let doubled = lists.find("li", FindOptions::default()).await.unwrap();
    assert_eq!(doubled.items().await.unwrap(), vec![2, 3, 2, 3]);
    assert_eq!(doubled.path(), "root > twice > css(li)");
}

#[tokio::test(start_paused = true)]
async fn wait_mode_retries_the_whole_query() {
    let dom = list_page();
    let root = root(&dom, config()).await;

    let adder = Arc::clone(&dom);
    let added = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        adder.push(node("p", DOCUMENT, "late"));
    });

    let late = root
        .find("p", FindOptions::waiting().ttl(2.0))
        .await
        .unwrap();
    added.await.unwrap();
    assert_eq!(late.len().await.unwrap(), 1);
    assert_eq!(late.text(None).await.unwrap().as_deref(), Some("late"));

    let missing = root
        .find("table", FindOptions::waiting().ttl(0.5))
        .await
        .expect_err("never appears");
    assert_eq!(missing.kind(), FailureKind::Timeout);
}

#[tokio::test(start_paused = true)]
async fn find_with_wait_requires_a_displayed_match() {
    let dom = list_page();
    let root = root(&dom, config()).await;

    let adder = Arc::clone(&dom);
    let added = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        adder.push(node("p", DOCUMENT, "late"));
    });
    let late = root
        .find_with_wait("p", FindOptions::default().ttl(2.0))
        .await
        .unwrap();
    added.await.unwrap();
    assert_eq!(late.text(None).await.unwrap().as_deref(), Some("late"));

    let mut hidden = node("span", DOCUMENT, "hidden");
    hidden.visible = false;
    dom.push(hidden);
    let err = root
        .find_with_wait("span", FindOptions::default().include_hidden().ttl(0.5))
        .await
        .expect_err("never displayed");
    assert_eq!(
        err,
        ElementsError::Assertion {
            condition: "first element is displayed".into()
        }
    );
}

#[tokio::test]
async fn update_propagates_parent_refresh_to_every_child() {
    let dom = list_page();
    let root = root(&dom, config()).await;
    let items = root.find("li", FindOptions::default()).await.unwrap();
    let first = items.get(0).await.unwrap();
    let second = items.get(1).await.unwrap();
    assert_eq!(second.item().await, Some(3));

    dom.push(node("li", 1, "four"));
    assert_eq!(items.len().await.unwrap(), 2);

    first.update(true).await.unwrap();
    assert_eq!(items.len().await.unwrap(), 3);
    assert_eq!(first.item().await, Some(2));
    assert!(first.parent_collection().unwrap().same_collection(&items));
}

#[tokio::test]
async fn get_out_of_range_fails_when_resolved() {
    let dom = list_page();
    let lazy_root = root(
        &dom,
        ElementsConfig {
            lazy: true,
            ..config()
        },
    )
    .await;
    let items = lazy_root.find("li", FindOptions::default()).await.unwrap();

    let beyond = items.get(7).await.expect("deferred");
    assert_eq!(
        beyond.items().await.expect_err("out of range"),
        ElementsError::IndexOutOfRange { index: 7, len: 2 }
    );
    assert_eq!(beyond.item().await, None);
}

#[tokio::test(start_paused = true)]
async fn click_retries_stale_elements_with_refresh() {
    let dom = list_page();
    dom.stale_clicks.store(2, Ordering::SeqCst);
    let root = root(&dom, config()).await;
    let link = root
        .find_link("more", false, FindOptions::default())
        .await
        .unwrap();

    link.click(Some(0.0), None).await.unwrap();
    assert_eq!(*dom.clicked.lock().unwrap(), vec![5]);
}

#[tokio::test(start_paused = true)]
async fn retries_are_logged_against_the_collection_path() {
    let dom = list_page();
    dom.stale_clicks.store(1, Ordering::SeqCst);
    let records = Arc::new(Mutex::new(Vec::<ElementiumLogRecord>::new()));
    let capture = Arc::clone(&records);
    let callback: LogCallback = Arc::new(move |record| capture.lock().unwrap().push(record.clone()));
    let logger = ElementiumLogger::with_config(LogConfig {
        verbose: Verbosity::Detailed,
        external_logger: Some(callback),
    });
    let root = Elements::root_with_logger(Arc::clone(&dom), config(), Arc::new(logger))
        .await
        .unwrap();

    let link = root
        .find_link("more", false, FindOptions::default())
        .await
        .unwrap();
    link.click(None, None).await.unwrap();

    let records = records.lock().unwrap();
    let retry = records
        .iter()
        .find(|record| record.waiter.is_some())
        .expect("retry record");
    assert_eq!(retry.subject.as_deref(), Some("root > partial_link_text(more) > [0]"));
    assert!(matches!(
        retry.waiter,
        Some(WaiterEvent::Retrying {
            attempt: 1,
            kind: FailureKind::StaleElement,
            ..
        })
    ));
}

#[tokio::test]
async fn zero_ttl_runs_once() {
    let dom = list_page();
    dom.stale_clicks.store(1, Ordering::SeqCst);
    let root = root(&dom, config()).await;
    let items = root.find("li", FindOptions::default()).await.unwrap();

    let err = items.click(Some(0.0), Some(0.0)).await.expect_err("stale");
    assert_eq!(err.kind(), FailureKind::StaleElement);
    assert!(dom.clicked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn reads_and_actions_use_the_first_element() {
    let dom = list_page();
    let root = root(&dom, config()).await;

    let input = root.find("input", FindOptions::default()).await.unwrap();
    assert_eq!(input.value(None).await.unwrap().as_deref(), Some("hello"));
    assert_eq!(input.attribute("name", None).await.unwrap().as_deref(), Some("q"));
    assert_eq!(input.tag_name(None).await.unwrap().as_deref(), Some("input"));
    assert!(input.is_enabled(None).await.unwrap());

    input.write("typed", None).await.unwrap();
    assert_eq!(*dom.typed.lock().unwrap(), vec![(6, "typed".to_string())]);
    let active = root.switch_to_active_element().await.unwrap();
    assert_eq!(active.item().await, Some(6));

    let select = root.find("select", FindOptions::default()).await.unwrap();
    select.select(&SelectBy::Text("Red".into()), None).await.unwrap();
    assert_eq!(
        *dom.selected.lock().unwrap(),
        vec![(7, SelectBy::Text("Red".into()))]
    );

    let items = root.find("li", FindOptions::default()).await.unwrap();
    assert_eq!(items.parent().await.unwrap().item().await, Some(1));

    let nothing = root.find("table", FindOptions::default()).await.unwrap();
    assert_eq!(nothing.text(None).await.unwrap(), None);
    assert!(!nothing.is_displayed(None).await.unwrap());
}

#[tokio::test]
async fn filter_keeps_elements_matching_a_condition() {
    let dom = list_page();
    let root = root(&dom, config()).await;
    let all = root
        .find("li", FindOptions::default().include_hidden())
        .await
        .unwrap();

    let starts_with_t = Condition::new("text starts with t", |element: Elements<FakeDom>| async move {
        element
            .text(Some(0.0))
            .await
            .ok()
            .flatten()
            .is_some_and(|text| text.starts_with('t'))
    });
    let filtered = all.filter(starts_with_t).await.unwrap();
    assert_eq!(filtered.items().await.unwrap(), vec![3, 4]);
}

#[tokio::test(start_paused = true)]
async fn page_operations_delegate_to_the_driver() {
    let dom = list_page();
    let root = root(&dom, config()).await;

    root.navigate("https://example.test/", None).await.unwrap();
    assert_eq!(
        root.current_url().await.unwrap().as_deref(),
        Some("https://example.test/")
    );
    assert_eq!(root.title(None).await.unwrap(), "Fake page");

    assert_eq!(root.window_size().await, None);
    root.set_window_size(WindowSize { width: 800, height: 600 }, Some(0.0))
        .await;
    assert_eq!(
        root.window_size().await,
        Some(WindowSize { width: 800, height: 600 })
    );

    dom.resize_fails.store(true, Ordering::SeqCst);
    let same = root
        .set_window_size(WindowSize { width: 1024, height: 768 }, Some(0.0))
        .await;
    assert!(same.same_collection(&root));
    assert_eq!(
        root.window_size().await,
        Some(WindowSize { width: 800, height: 600 })
    );

    dom.scripts.lock().unwrap().clear();
    root.scroll_bottom(10, Some(0.0)).await.unwrap();
    root.scroll_top(0, Some(0.0)).await.unwrap();
    assert_eq!(
        *dom.scripts.lock().unwrap(),
        vec![
            "window.scrollTo(10, document.body.scrollHeight)".to_string(),
            "window.scrollTo(0, 0)".to_string(),
        ]
    );

    let err = root
        .execute_script("explode()", Some(0.0))
        .await
        .expect_err("unknown script");
    assert_eq!(err.kind(), FailureKind::Script);
}
