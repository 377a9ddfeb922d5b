//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Navigation failed: expected title {expected:?}, got {actual:?}")]
    Navigation { expected: String, actual: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Playwright bridge exited unexpectedly")]
    BridgeClosed,

    #[error("Bridge protocol error: {0}")]
    Protocol(String),

    #[error("Unknown task list: {0}")]
    UnknownList(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Target {url} unreachable after {attempts} attempts")]
    TargetUnreachable { url: String, attempts: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Whether this error belongs to the failure classes a scenario can
    /// produce against a live page (navigation, state assertion, timeout).
    pub fn is_scenario_failure(&self) -> bool {
        matches!(
            self,
            E2eError::Navigation { .. } | E2eError::AssertionFailed(_) | E2eError::Timeout(_)
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
