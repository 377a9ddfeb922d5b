//! Browser automation capability
//!
//! The page object and the scenarios only talk to a [`Page`]. Two
//! implementations exist: the Playwright bridge for live runs and the
//! in-memory model of the target application.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// Description of a set of elements on the page.
///
/// A locator is never bound to a DOM node. Every action resolves it again,
/// so indexes always refer to the list as it is rendered at that moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// CSS selector matched against the whole document
    pub selector: String,

    /// Pick the n-th match (0-based) of `selector`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<usize>,

    /// Selector resolved inside the matched element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<String>,
}

impl Locator {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            nth: None,
            inner: None,
        }
    }

    /// Narrow to the n-th match
    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    /// Resolve `selector` inside the matched element
    pub fn locate(mut self, selector: impl Into<String>) -> Self {
        self.inner = Some(selector.into());
        self
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector)?;
        if let Some(n) = self.nth {
            write!(f, " >> nth={}", n)?;
        }
        if let Some(inner) = &self.inner {
            write!(f, " >> {}", inner)?;
        }
        Ok(())
    }
}

/// A single browser page, owned by one scenario.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to an absolute URL and wait for the load event
    async fn goto(&self, url: &str) -> E2eResult<()>;

    /// Current document title
    async fn title(&self) -> E2eResult<String>;

    async fn click(&self, locator: &Locator) -> E2eResult<()>;

    /// Replace the value of an input
    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn input_value(&self, locator: &Locator) -> E2eResult<String>;

    /// Text content of exactly one element
    async fn text_content(&self, locator: &Locator) -> E2eResult<String>;

    /// Text content of every match, in document order
    async fn all_text_contents(&self, locator: &Locator) -> E2eResult<Vec<String>>;

    async fn count(&self, locator: &Locator) -> E2eResult<usize>;

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>>;

    /// Full-page screenshot written to `path`
    async fn screenshot(&self, path: &Path) -> E2eResult<()>;

    /// Tear down the session. Must be safe to call after a failure.
    async fn close(&self) -> E2eResult<()>;
}

/// Creates isolated pages, one per scenario.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Short backend name used in logs and results
    fn name(&self) -> &str;

    async fn new_page(&self) -> E2eResult<Box<dyn Page>>;
}
