//! Main test runner that orchestrates sessions, scenarios and reporting

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::driver::Launcher;
use crate::error::{E2eError, E2eResult};
use crate::expect::{Expect, ExpectConfig};
use crate::page::{Selectors, TodoPage};
use crate::playwright::PlaywrightConfig;
use crate::scenario::{self, Expectation, Scenario};
use crate::target::{self, TargetConfig};

/// How a scenario ended, relative to its expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    /// Known failure that failed as expected
    ExpectedFailure,
    /// Known failure that passed; the expectation is stale
    UnexpectedPass,
}

impl Outcome {
    /// A known failure only absorbs a failed state assertion. Navigation,
    /// timeouts and infrastructure errors fail the scenario regardless.
    fn classify(expectation: Expectation, result: &E2eResult<()>) -> Self {
        match (expectation, result) {
            (Expectation::Pass, Ok(())) => Outcome::Passed,
            (Expectation::Pass, Err(_)) => Outcome::Failed,
            (Expectation::KnownFailure { .. }, Ok(())) => Outcome::UnexpectedPass,
            (Expectation::KnownFailure { .. }, Err(E2eError::AssertionFailed(_))) => Outcome::ExpectedFailure,
            (Expectation::KnownFailure { .. }, Err(_)) => Outcome::Failed,
        }
    }

    pub fn is_ok(self) -> bool {
        matches!(self, Outcome::Passed | Outcome::ExpectedFailure)
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub backend: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub expected_failures: usize,
    pub unexpected_passes: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl TestSuiteResult {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.unexpected_passes == 0
    }

    pub fn result(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub target: TargetConfig,
    pub selectors: Selectors,
    pub playwright: PlaywrightConfig,
    pub expect: ExpectConfig,

    /// Output directory for results and failure screenshots
    pub output_dir: PathBuf,

    /// Scenarios running at the same time, each in its own session
    pub workers: usize,

    /// Upper bound for one scenario, navigation included
    pub scenario_timeout_ms: u64,

    pub screenshot_on_failure: bool,

    /// Check the target answers HTTP before running anything
    pub preflight: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            selectors: Selectors::default(),
            playwright: PlaywrightConfig::default(),
            expect: ExpectConfig::default(),
            output_dir: PathBuf::from("test-results"),
            workers: 1,
            scenario_timeout_ms: 120_000,
            screenshot_on_failure: true,
            preflight: false,
        }
    }
}

impl RunnerConfig {
    /// Parse a runner config from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a runner config from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.workers == 0 {
            return Err(E2eError::Config("workers must be at least 1".to_string()));
        }
        if self.target.base_url.is_empty() {
            return Err(E2eError::Config("target.base_url is empty".to_string()));
        }
        if self.scenario_timeout_ms == 0 {
            return Err(E2eError::Config("scenario_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: RunnerConfig,
    launcher: Arc<dyn Launcher>,
}

impl TestRunner {
    pub fn new(config: RunnerConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self { config, launcher }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every scenario in the catalog
    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        self.run_scenarios(&scenario::catalog()).await
    }

    /// Run scenarios carrying `tag`
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<TestSuiteResult> {
        let filtered: Vec<Scenario> = scenario::catalog()
            .into_iter()
            .filter(|s| s.has_tag(tag))
            .collect();
        self.run_scenarios(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_named(&self, name: &str) -> E2eResult<TestSuiteResult> {
        let scenario = scenario::find(name).ok_or_else(|| E2eError::ScenarioNotFound(name.to_string()))?;
        self.run_scenarios(&[scenario]).await
    }

    /// Run a list of scenarios, up to `workers` at a time
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> E2eResult<TestSuiteResult> {
        self.config.validate()?;

        if self.config.preflight {
            target::wait_until_reachable(&self.config.target).await?;
        }

        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            "Running {} scenario(s) against {} ({})",
            scenarios.len(),
            self.config.target.base_url,
            self.launcher.name()
        );

        let mut indexed: Vec<(usize, ScenarioResult)> = stream::iter(scenarios.iter().enumerate())
            .map(|(i, scenario)| async move { (i, self.run_scenario(scenario).await) })
            .buffer_unordered(self.config.workers)
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);
        let results: Vec<ScenarioResult> = indexed.into_iter().map(|(_, r)| r).collect();

        let count = |outcome: Outcome| results.iter().filter(|r| r.outcome == outcome).count();
        let passed = count(Outcome::Passed);
        let failed = count(Outcome::Failed);
        let expected_failures = count(Outcome::ExpectedFailure);
        let unexpected_passes = count(Outcome::UnexpectedPass);

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} expected failure(s), {} unexpected pass(es) ({} ms)",
            passed, failed, expected_failures, unexpected_passes, duration_ms
        );

        Ok(TestSuiteResult {
            backend: self.launcher.name().to_string(),
            started_at,
            total: results.len(),
            passed,
            failed,
            expected_failures,
            unexpected_passes,
            duration_ms,
            results,
        })
    }

    /// Run one scenario in a fresh session. Never fails; problems end up in
    /// the result.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let (run_result, screenshot_path) = match self.open_page().await {
            Ok(todo) => {
                let run_result = self.drive(&todo, scenario).await;

                let screenshot_path = match &run_result {
                    Err(_) if self.config.screenshot_on_failure => self.capture_failure(&todo, scenario.name).await,
                    _ => None,
                };

                // Teardown happens whatever the scenario did
                if let Err(e) = todo.close().await {
                    warn!("Failed to close session for {}: {}", scenario.name, e);
                }

                (run_result, screenshot_path)
            }
            Err(e) => (Err(e), None),
        };

        let outcome = Outcome::classify(scenario.expectation, &run_result);
        let duration_ms = start.elapsed().as_millis() as u64;
        let error = run_result.err().map(|e| {
            if !e.is_scenario_failure() {
                warn!("{} hit an infrastructure error: {}", scenario.name, e);
            }
            e.to_string()
        });

        match outcome {
            Outcome::Passed => info!("✓ {} ({} ms)", scenario.name, duration_ms),
            Outcome::ExpectedFailure => info!(
                "✓ {} failed as expected ({} ms): {}",
                scenario.name,
                duration_ms,
                error.as_deref().unwrap_or("unknown error")
            ),
            Outcome::Failed => error!(
                "✗ {} - {}",
                scenario.name,
                error.as_deref().unwrap_or("unknown error")
            ),
            Outcome::UnexpectedPass => error!(
                "✗ {} passed but is marked as a known failure",
                scenario.name
            ),
        }

        ScenarioResult {
            name: scenario.name.to_string(),
            outcome,
            duration_ms,
            error,
            screenshot_path,
        }
    }

    async fn open_page(&self) -> E2eResult<TodoPage> {
        let page = self.launcher.new_page().await?;
        TodoPage::new(
            page,
            self.config.target.clone(),
            self.config.selectors.clone(),
            Expect::new(&self.config.expect),
        )
    }

    /// Navigate then run the scenario body, bounded by the scenario timeout
    async fn drive(&self, todo: &TodoPage, scenario: &Scenario) -> E2eResult<()> {
        let body = async {
            todo.navigate().await?;
            (scenario.run)(todo).await
        };

        let limit = Duration::from_millis(self.config.scenario_timeout_ms);
        match tokio::time::timeout(limit, body).await {
            Ok(result) => result,
            Err(_) => Err(E2eError::Timeout(format!(
                "scenario {} to finish within {} ms",
                scenario.name, self.config.scenario_timeout_ms
            ))),
        }
    }

    async fn capture_failure(&self, todo: &TodoPage, name: &str) -> Option<PathBuf> {
        let path = self.config.output_dir.join("screenshots").join(format!("{}.png", name));
        match todo.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Could not capture failure screenshot for {}: {}", name, e);
                None
            }
        }
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let known = Expectation::KnownFailure { reason: "bug" };
        let assertion = || Err(E2eError::AssertionFailed("count".to_string()));
        assert_eq!(Outcome::classify(Expectation::Pass, &Ok(())), Outcome::Passed);
        assert_eq!(Outcome::classify(Expectation::Pass, &assertion()), Outcome::Failed);
        assert_eq!(Outcome::classify(known, &assertion()), Outcome::ExpectedFailure);
        assert_eq!(Outcome::classify(known, &Ok(())), Outcome::UnexpectedPass);
        assert!(Outcome::ExpectedFailure.is_ok());
        assert!(!Outcome::UnexpectedPass.is_ok());
    }

    #[test]
    fn test_known_failure_does_not_absorb_other_errors() {
        let known = Expectation::KnownFailure { reason: "bug" };
        let errors = [
            E2eError::Navigation {
                expected: "To-Do List".to_string(),
                actual: "Maintenance".to_string(),
            },
            E2eError::Timeout("locator 'label'".to_string()),
            E2eError::PlaywrightNotFound,
            E2eError::BridgeClosed,
        ];
        for error in errors {
            assert_eq!(Outcome::classify(known, &Err(error)), Outcome::Failed);
        }
    }

    #[test]
    fn test_parse_runner_config() {
        let yaml = r#"
target:
  base_url: http://127.0.0.1:8000/
  expected_title: Local To-Do
selectors:
  status_marker: check
playwright:
  browser: firefox
  headless: false
expect:
  timeout_ms: 2000
workers: 4
"#;
        let config = RunnerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.target.base_url, "http://127.0.0.1:8000/");
        assert_eq!(config.target.expected_title, "Local To-Do");
        assert_eq!(config.selectors.status_marker, "check");
        assert_eq!(config.selectors.new_task_input, "#new-task");
        assert_eq!(config.playwright.browser, crate::playwright::Browser::Firefox);
        assert!(!config.playwright.headless);
        assert_eq!(config.expect.timeout_ms, 2000);
        assert_eq!(config.expect.poll_interval_ms, 50);
        assert_eq!(config.workers, 4);
        assert!(config.screenshot_on_failure);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = RunnerConfig::from_yaml("workers: 0").unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = RunnerConfig::from_yaml("{}").unwrap();
        assert_eq!(config.workers, 1);
        assert_eq!(config.target, TargetConfig::default());
    }
}
