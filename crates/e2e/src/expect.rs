//! Auto-retrying assertions
//!
//! Each assertion polls the live page until the observed value matches or
//! the timeout elapses, mirroring Playwright's `expect` semantics. Errors
//! from the page itself (e.g. an element that never appears) end the poll
//! immediately.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::driver::{Locator, Page};
use crate::error::{E2eError, E2eResult};

/// Default assertion window (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Configuration for assertions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectConfig {
    pub timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for ExpectConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expect {
    timeout: Duration,
    poll_interval: Duration,
}

impl Expect {
    pub fn new(config: &ExpectConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        }
    }

    /// Poll `observe` until `matches` holds. Returns the last observation
    /// as `Err` when the window closes without a match.
    async fn poll<T, F, Fut, M>(&self, mut observe: F, matches: M) -> E2eResult<Result<T, T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<T>>,
        M: Fn(&T) -> bool,
    {
        let deadline = Instant::now() + self.timeout;
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            let observed = observe().await?;
            if matches(&observed) {
                return Ok(Ok(observed));
            }
            if Instant::now() >= deadline {
                debug!("Assertion window closed after {} polls", attempts);
                return Ok(Err(observed));
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Page title equals `expected`. A mismatch is a navigation failure.
    pub async fn to_have_title(&self, page: &dyn Page, expected: &str) -> E2eResult<()> {
        match self.poll(move || page.title(), |t: &String| t == expected).await? {
            Ok(_) => Ok(()),
            Err(actual) => Err(E2eError::Navigation {
                expected: expected.to_string(),
                actual,
            }),
        }
    }

    /// Exactly `expected` elements match `locator`.
    pub async fn to_have_count(&self, page: &dyn Page, locator: &Locator, expected: usize) -> E2eResult<()> {
        match self.poll(move || page.count(locator), |n: &usize| *n == expected).await? {
            Ok(_) => Ok(()),
            Err(actual) => Err(E2eError::AssertionFailed(format!(
                "expected {} element(s) matching '{}', found {}",
                expected, locator, actual
            ))),
        }
    }

    /// Input value equals `expected`.
    pub async fn to_have_value(&self, page: &dyn Page, locator: &Locator, expected: &str) -> E2eResult<()> {
        match self.poll(move || page.input_value(locator), |v: &String| v == expected).await? {
            Ok(_) => Ok(()),
            Err(actual) => Err(E2eError::AssertionFailed(format!(
                "expected '{}' to have value {:?}, got {:?}",
                locator, expected, actual
            ))),
        }
    }

    /// Text content equals `expected`.
    pub async fn to_have_text(&self, page: &dyn Page, locator: &Locator, expected: &str) -> E2eResult<()> {
        match self.poll(move || page.text_content(locator), |t: &String| t == expected).await? {
            Ok(_) => Ok(()),
            Err(actual) => Err(E2eError::AssertionFailed(format!(
                "expected '{}' to have text {:?}, got {:?}",
                locator, expected, actual
            ))),
        }
    }

    /// The `class` attribute contains `class` as one of its tokens.
    pub async fn to_have_class(&self, page: &dyn Page, locator: &Locator, class: &str) -> E2eResult<()> {
        let has_class = |attr: &Option<String>| {
            attr.as_deref()
                .map(|value| value.split_whitespace().any(|c| c == class))
                .unwrap_or(false)
        };

        match self.poll(move || page.get_attribute(locator, "class"), has_class).await? {
            Ok(_) => Ok(()),
            Err(actual) => Err(E2eError::AssertionFailed(format!(
                "expected '{}' to have class '{}', class attribute was {:?}",
                locator,
                class,
                actual.unwrap_or_default()
            ))),
        }
    }
}

impl Default for Expect {
    fn default() -> Self {
        Self::new(&ExpectConfig::default())
    }
}
