//! Chromiumoxide-backed [`Driver`] implementation.
//!
//! Nodes are live `chromiumoxide` element handles. Queries that CDP cannot
//! answer relative to an element (XPath below a node, parent lookup, the
//! focused element) are resolved in page script, which tags the matches with a
//! one-off marker attribute so they can be fetched back as element handles.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use serde_json::Value as JsonValue;

use crate::driver::{Driver, Query, SelectBy, WindowSize};
use crate::error::{DriverError, FailureKind};

const MARK_ATTRIBUTE: &str = "data-elementium-mark";

static NEXT_MARK: AtomicU64 = AtomicU64::new(1);

/// Handle to either the page document or one element on it.
#[derive(Clone)]
pub enum ChromiumNode {
    Document,
    Element(Arc<Element>),
}

impl fmt::Debug for ChromiumNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChromiumNode::Document => f.write_str("Document"),
            ChromiumNode::Element(element) => f
                .debug_tuple("Element")
                .field(&element.backend_node_id)
                .finish(),
        }
    }
}

/// Driver bound to a single chromiumoxide [`Page`].
#[derive(Clone)]
pub struct ChromiumoxideDriver {
    page: Page,
}

impl fmt::Debug for ChromiumoxideDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromiumoxideDriver").finish_non_exhaustive()
    }
}

impl ChromiumoxideDriver {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn evaluate(&self, expression: String) -> Result<JsonValue, DriverError> {
        let result = self.page.evaluate(expression).await.map_err(map_cdp_error)?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    async fn call_on(&self, element: &Element, function: String) -> Result<JsonValue, DriverError> {
        let returns = element
            .call_js_fn(function, false)
            .await
            .map_err(map_cdp_error)?;
        if let Some(details) = returns.exception_details {
            return Err(DriverError::script(details.text));
        }
        Ok(returns.result.value.unwrap_or(JsonValue::Null))
    }

    /// Run `body` (a function of `node` returning a node or an array of nodes)
    /// against `element`, then fetch whatever it returned as element handles.
    async fn marked(
        &self,
        element: Option<&Element>,
        body: &str,
    ) -> Result<Vec<ChromiumNode>, DriverError> {
        let mark = NEXT_MARK.fetch_add(1, Ordering::Relaxed).to_string();
        let mark_json = json_literal(&mark);
        let tag = format!(
            "const found = ({body})(node); \
             const list = Array.isArray(found) ? found : (found ? [found] : []); \
             let count = 0; \
             for (const el of list) {{ \
               if (el && el.nodeType === 1) {{ el.setAttribute('{MARK_ATTRIBUTE}', {mark_json}); count += 1; }} \
             }} \
             return count;"
        );

        let count = match element {
            Some(element) => {
                self.call_on(element, format!("function() {{ const node = this; {tag} }}"))
                    .await?
            }
            None => {
                self.evaluate(format!("(() => {{ const node = document; {tag} }})()"))
                    .await?
            }
        };
        if count.as_u64().unwrap_or(0) == 0 {
            return Ok(Vec::new());
        }

        let selector = format!("[{MARK_ATTRIBUTE}={mark_json}]");
        let found = self.page.find_elements(selector.as_str()).await;
        let cleanup = format!(
            "document.querySelectorAll({}).forEach(el => el.removeAttribute('{MARK_ATTRIBUTE}'))",
            json_literal(&selector)
        );
        if let Err(err) = self.page.evaluate(cleanup).await {
            log::debug!("failed to clear element marks: {err}");
        }

        let elements = found.map_err(map_cdp_error)?;
        Ok(elements
            .into_iter()
            .map(|element| ChromiumNode::Element(Arc::new(element)))
            .collect())
    }

    async fn css(&self, node: &ChromiumNode, selector: &str) -> Result<Vec<ChromiumNode>, DriverError> {
        let found = match node {
            ChromiumNode::Document => self.page.find_elements(selector).await,
            ChromiumNode::Element(element) => element.find_elements(selector).await,
        };
        match found {
            Ok(elements) => Ok(elements
                .into_iter()
                .map(|element| ChromiumNode::Element(Arc::new(element)))
                .collect()),
            Err(err) => empty_when_missing(map_cdp_error(err)),
        }
    }

    async fn xpath(&self, node: &ChromiumNode, expression: &str) -> Result<Vec<ChromiumNode>, DriverError> {
        match node {
            ChromiumNode::Document => match self.page.find_xpaths(expression).await {
                Ok(elements) => Ok(elements
                    .into_iter()
                    .map(|element| ChromiumNode::Element(Arc::new(element)))
                    .collect()),
                Err(err) => empty_when_missing(map_cdp_error(err)),
            },
            ChromiumNode::Element(element) => {
                let body = format!(
                    "(node) => {{ \
                       const snap = document.evaluate({}, node, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                       const out = []; \
                       for (let i = 0; i < snap.snapshotLength; i++) out.push(snap.snapshotItem(i)); \
                       return out; \
                     }}",
                    json_literal(expression)
                );
                self.marked(Some(element.as_ref()), &body).await
            }
        }
    }

    async fn links(
        &self,
        node: &ChromiumNode,
        text: &str,
        exact: bool,
    ) -> Result<Vec<ChromiumNode>, DriverError> {
        let mut matches = Vec::new();
        for candidate in self.css(node, "a").await? {
            let ChromiumNode::Element(element) = &candidate else {
                continue;
            };
            let inner = element.inner_text().await.map_err(map_cdp_error)?;
            let inner = inner.unwrap_or_default();
            let inner = inner.trim();
            let hit = if exact {
                inner == text
            } else {
                inner.contains(text)
            };
            if hit {
                matches.push(candidate);
            }
        }
        Ok(matches)
    }
}

#[async_trait]
impl Driver for ChromiumoxideDriver {
    type Node = ChromiumNode;

    async fn resolve_root(&self) -> Result<ChromiumNode, DriverError> {
        Ok(ChromiumNode::Document)
    }

    async fn resolve_query(
        &self,
        node: &ChromiumNode,
        query: &Query,
    ) -> Result<Vec<ChromiumNode>, DriverError> {
        match query {
            Query::Css(selector) => self.css(node, selector).await,
            Query::XPath(expression) => self.xpath(node, expression).await,
            Query::LinkText(text) => self.links(node, text, true).await,
            Query::PartialLinkText(text) => self.links(node, text, false).await,
        }
    }

    async fn is_visible(&self, node: &ChromiumNode) -> Result<bool, DriverError> {
        let element = element(node)?;
        let value = self
            .call_on(
                element,
                "function() { \
                   if (!this.isConnected) return false; \
                   const style = window.getComputedStyle(this); \
                   if (style.visibility === 'hidden' || style.display === 'none') return false; \
                   const rect = this.getBoundingClientRect(); \
                   return rect.width > 0 && rect.height > 0; \
                 }"
                .to_string(),
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn read_attribute(
        &self,
        node: &ChromiumNode,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let element = element(node)?;
        element.attribute(name).await.map_err(map_cdp_error)
    }

    async fn read_text(&self, node: &ChromiumNode) -> Result<String, DriverError> {
        match node {
            ChromiumNode::Document => {
                let value = self.evaluate("document.body ? document.body.innerText : ''".into()).await?;
                Ok(value.as_str().unwrap_or_default().to_string())
            }
            ChromiumNode::Element(element) => Ok(element
                .inner_text()
                .await
                .map_err(map_cdp_error)?
                .unwrap_or_default()),
        }
    }

    async fn read_tag_name(&self, node: &ChromiumNode) -> Result<String, DriverError> {
        match node {
            ChromiumNode::Document => Ok("#document".to_string()),
            ChromiumNode::Element(element) => {
                let value = self
                    .call_on(element, "function() { return this.tagName.toLowerCase(); }".into())
                    .await?;
                Ok(value.as_str().unwrap_or_default().to_string())
            }
        }
    }

    async fn is_enabled(&self, node: &ChromiumNode) -> Result<bool, DriverError> {
        let value = self
            .call_on(element(node)?, "function() { return !this.disabled; }".into())
            .await?;
        Ok(value.as_bool().unwrap_or(true))
    }

    async fn is_selected(&self, node: &ChromiumNode) -> Result<bool, DriverError> {
        let value = self
            .call_on(
                element(node)?,
                "function() { return !!(this.checked || this.selected); }".into(),
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn clear(&self, node: &ChromiumNode) -> Result<(), DriverError> {
        self.call_on(
            element(node)?,
            "function() { \
               if (!('value' in this)) throw new Error('element is not clearable'); \
               this.value = ''; \
               this.dispatchEvent(new Event('input', { bubbles: true })); \
               this.dispatchEvent(new Event('change', { bubbles: true })); \
             }"
            .into(),
        )
        .await?;
        Ok(())
    }

    async fn click(&self, node: &ChromiumNode) -> Result<(), DriverError> {
        element(node)?.click().await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn send_keys(&self, node: &ChromiumNode, text: &str) -> Result<(), DriverError> {
        let element = element(node)?;
        element.focus().await.map_err(map_cdp_error)?;
        element.type_str(text).await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn select_option(&self, node: &ChromiumNode, by: &SelectBy) -> Result<(), DriverError> {
        let matcher = option_matcher(by);
        let value = self
            .call_on(
                element(node)?,
                format!(
                    "function() {{ \
                       if (this.tagName !== 'SELECT') throw new Error('element is not a select'); \
                       const match = {matcher}; \
                       const options = Array.from(this.options); \
                       let hit = false; \
                       options.forEach((opt, i) => {{ if (match(opt, i)) {{ opt.selected = true; hit = true; }} }}); \
                       if (hit) this.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                       return hit; \
                     }}"
                ),
            )
            .await?;
        if value.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(DriverError::no_such_element(format!("no option matching {by:?}")))
        }
    }

    async fn deselect_option(
        &self,
        node: &ChromiumNode,
        by: Option<&SelectBy>,
    ) -> Result<(), DriverError> {
        let matcher = by
            .map(option_matcher)
            .unwrap_or_else(|| "(() => true)".to_string());
        self.call_on(
            element(node)?,
            format!(
                "function() {{ \
                   if (this.tagName !== 'SELECT') throw new Error('element is not a select'); \
                   if (!this.multiple) throw new Error('You may only deselect options of a multi-select'); \
                   const match = {matcher}; \
                   Array.from(this.options).forEach((opt, i) => {{ if (match(opt, i)) opt.selected = false; }}); \
                   this.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                 }}"
            ),
        )
        .await?;
        Ok(())
    }

    async fn parent_of(&self, node: &ChromiumNode) -> Result<Option<ChromiumNode>, DriverError> {
        let ChromiumNode::Element(element) = node else {
            return Ok(None);
        };
        let found = self
            .marked(Some(element.as_ref()), "(node) => node.parentElement")
            .await?;
        Ok(found.into_iter().next())
    }

    async fn active_element(&self) -> Result<Option<ChromiumNode>, DriverError> {
        let found = self
            .marked(None, "(node) => node.activeElement")
            .await?;
        Ok(found.into_iter().next())
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|err| DriverError::navigation(err.to_string()))?;
        Ok(())
    }

    async fn refresh(&self) -> Result<(), DriverError> {
        self.page
            .reload()
            .await
            .map_err(|err| DriverError::navigation(err.to_string()))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>, DriverError> {
        self.page.url().await.map_err(map_cdp_error)
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok(self
            .page
            .get_title()
            .await
            .map_err(map_cdp_error)?
            .unwrap_or_default())
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        self.page.content().await.map_err(map_cdp_error)
    }

    async fn execute_script(&self, script: &str) -> Result<JsonValue, DriverError> {
        self.evaluate(script.to_string()).await
    }

    async fn window_size(&self) -> Result<WindowSize, DriverError> {
        let value = self
            .evaluate("({ width: window.outerWidth, height: window.outerHeight })".into())
            .await?;
        serde_json::from_value(value)
            .map_err(|err| DriverError::script(format!("unexpected window size: {err}")))
    }

    async fn set_window_size(&self, size: WindowSize) -> Result<(), DriverError> {
        let params = SetDeviceMetricsOverrideParams::new(
            i64::from(size.width),
            i64::from(size.height),
            1.0,
            false,
        );
        self.page.execute(params).await.map_err(map_cdp_error)?;
        Ok(())
    }
}

fn element(node: &ChromiumNode) -> Result<&Element, DriverError> {
    match node {
        ChromiumNode::Element(element) => Ok(element),
        ChromiumNode::Document => Err(DriverError::not_interactable(
            "operation requires an element, got the document",
        )),
    }
}

fn empty_when_missing(err: DriverError) -> Result<Vec<ChromiumNode>, DriverError> {
    if err.kind() == FailureKind::NoSuchElement {
        Ok(Vec::new())
    } else {
        Err(err)
    }
}

fn json_literal(value: &str) -> String {
    JsonValue::String(value.to_string()).to_string()
}

fn option_matcher(by: &SelectBy) -> String {
    match by {
        SelectBy::Index(index) => format!("((opt, i) => i === {index})"),
        SelectBy::Value(value) => format!("((opt) => opt.value === {})", json_literal(value)),
        SelectBy::Text(text) => format!(
            "((opt) => opt.text.trim() === {})",
            json_literal(text.trim())
        ),
    }
}

fn map_cdp_error(err: impl fmt::Display) -> DriverError {
    let message = err.to_string();
    DriverError::new(classify(&message), message)
}

/// Map a CDP error message onto the failure kind the waiters retry on.
pub fn classify(message: &str) -> FailureKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("no node")
        || lower.contains("could not find node")
        || lower.contains("detached")
        || lower.contains("cannot find context")
        || lower.contains("does not belong to the document")
    {
        FailureKind::StaleElement
    } else if lower.contains("execution context was destroyed")
        || lower.contains("navigat")
        || lower.contains("frame was detached")
    {
        FailureKind::Navigation
    } else if lower.contains("not found") || lower.contains("no such element") {
        FailureKind::NoSuchElement
    } else if lower.contains("not interactable")
        || lower.contains("not clickable")
        || lower.contains("has no box model")
        || lower.contains("not visible")
    {
        FailureKind::NotInteractable
    } else if lower.contains("javascript")
        || lower.contains("exception")
        || lower.contains("error:")
    {
        FailureKind::Script
    } else {
        FailureKind::Protocol
    }
}
