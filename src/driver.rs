//! Capability contract between element collections and a browser backend.
//!
//! A [`Driver`] owns the live page. Collections only ever hold opaque
//! [`Driver::Node`] handles and ask the driver to act on them; query syntax is
//! passed through untouched.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::DriverError;

/// A sub-query resolved relative to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Css(String),
    XPath(String),
    LinkText(String),
    PartialLinkText(String),
}

impl Query {
    pub fn selector(&self) -> &str {
        match self {
            Query::Css(value)
            | Query::XPath(value)
            | Query::LinkText(value)
            | Query::PartialLinkText(value) => value,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Query::Css(_) => "css",
            Query::XPath(_) => "xpath",
            Query::LinkText(_) => "link_text",
            Query::PartialLinkText(_) => "partial_link_text",
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.selector())
    }
}

/// How an `<option>` is addressed inside a `<select>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by", content = "value")]
pub enum SelectBy {
    Index(usize),
    Value(String),
    Text(String),
}

/// Outer window dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

/// Browser capabilities the collection layer is written against.
///
/// Only root and query resolution are mandatory. Everything else defaults to
/// an `unsupported` failure so partial backends (and test doubles) stay small.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    type Node: Clone + fmt::Debug + Send + Sync + 'static;

    /// The document-level node queries start from.
    async fn resolve_root(&self) -> Result<Self::Node, DriverError>;

    /// Nodes matching `query` beneath `node`, in document order.
    async fn resolve_query(
        &self,
        node: &Self::Node,
        query: &Query,
    ) -> Result<Vec<Self::Node>, DriverError>;

    async fn is_visible(&self, _node: &Self::Node) -> Result<bool, DriverError> {
        Err(DriverError::unsupported("visibility checks"))
    }

    async fn read_attribute(
        &self,
        _node: &Self::Node,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Err(DriverError::unsupported(format!("reading attribute '{name}'")))
    }

    async fn read_text(&self, _node: &Self::Node) -> Result<String, DriverError> {
        Err(DriverError::unsupported("reading text"))
    }

    async fn read_tag_name(&self, _node: &Self::Node) -> Result<String, DriverError> {
        Err(DriverError::unsupported("reading tag names"))
    }

    async fn is_enabled(&self, _node: &Self::Node) -> Result<bool, DriverError> {
        Err(DriverError::unsupported("enabled checks"))
    }

    async fn is_selected(&self, _node: &Self::Node) -> Result<bool, DriverError> {
        Err(DriverError::unsupported("selected checks"))
    }

    async fn clear(&self, _node: &Self::Node) -> Result<(), DriverError> {
        Err(DriverError::unsupported("clearing inputs"))
    }

    async fn click(&self, _node: &Self::Node) -> Result<(), DriverError> {
        Err(DriverError::unsupported("clicking"))
    }

    async fn send_keys(&self, _node: &Self::Node, _text: &str) -> Result<(), DriverError> {
        Err(DriverError::unsupported("sending keys"))
    }

    async fn select_option(&self, _node: &Self::Node, _by: &SelectBy) -> Result<(), DriverError> {
        Err(DriverError::unsupported("selecting options"))
    }

    /// `None` deselects every option.
    async fn deselect_option(
        &self,
        _node: &Self::Node,
        _by: Option<&SelectBy>,
    ) -> Result<(), DriverError> {
        Err(DriverError::unsupported("deselecting options"))
    }

    async fn parent_of(&self, _node: &Self::Node) -> Result<Option<Self::Node>, DriverError> {
        Err(DriverError::unsupported("parent lookup"))
    }

    async fn active_element(&self) -> Result<Option<Self::Node>, DriverError> {
        Err(DriverError::unsupported("active element lookup"))
    }

    async fn navigate(&self, _url: &str) -> Result<(), DriverError> {
        Err(DriverError::unsupported("navigation"))
    }

    async fn refresh(&self) -> Result<(), DriverError> {
        Err(DriverError::unsupported("refresh"))
    }

    async fn current_url(&self) -> Result<Option<String>, DriverError> {
        Err(DriverError::unsupported("reading the current url"))
    }

    async fn title(&self) -> Result<String, DriverError> {
        let value = self.execute_script("document.title").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        let value = self
            .execute_script("document.documentElement.outerHTML")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn execute_script(&self, _script: &str) -> Result<JsonValue, DriverError> {
        Err(DriverError::unsupported("script execution"))
    }

    async fn window_size(&self) -> Result<WindowSize, DriverError> {
        Err(DriverError::unsupported("reading the window size"))
    }

    async fn set_window_size(&self, _size: WindowSize) -> Result<(), DriverError> {
        Err(DriverError::unsupported("resizing the window"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn query_display_names_kind_and_selector() {
        assert_eq!(Query::Css("div.card".into()).to_string(), "css(div.card)");
        assert_eq!(
            Query::PartialLinkText("Sign".into()).to_string(),
            "partial_link_text(Sign)"
        );
    }

    #[test]
    fn select_by_serialises_tagged() {
        let value = serde_json::to_value(SelectBy::Text("Blue".into())).unwrap();
        assert_eq!(value, serde_json::json!({"by": "text", "value": "Blue"}));
    }

    struct RootOnly;

    #[async_trait]
    impl Driver for RootOnly {
        type Node = u32;

        async fn resolve_root(&self) -> Result<u32, DriverError> {
            Ok(0)
        }

        async fn resolve_query(&self, _node: &u32, _query: &Query) -> Result<Vec<u32>, DriverError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn optional_capabilities_default_to_unsupported() {
        let driver = RootOnly;
        let err = driver.click(&0).await.expect_err("click unsupported");
        assert_eq!(err.kind(), FailureKind::Unsupported);
        let err = driver.title().await.expect_err("title needs scripts");
        assert_eq!(err.kind(), FailureKind::Unsupported);
    }
}
