//! Target application settings and reachability preflight

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Where the application under test lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Root page of the application
    pub base_url: String,

    /// Title the root page must carry once loaded
    pub expected_title: String,

    /// How long the preflight keeps retrying
    pub preflight_timeout_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://abhigyank.github.io/To-Do-List/".to_string(),
            expected_title: "To-Do List".to_string(),
            preflight_timeout_ms: 30_000,
        }
    }
}

/// Wait until the target answers an HTTP GET with a success status
pub async fn wait_until_reachable(target: &TargetConfig) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let timeout_duration = Duration::from_millis(target.preflight_timeout_ms);
    let start = std::time::Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(&target.base_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Target is reachable at {}", target.base_url);
                return Ok(());
            }
            Ok(resp) => {
                warn!("Preflight returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} to respond...", target.base_url);
                }
                if !e.is_connect() {
                    warn!("Preflight error: {}", e);
                }
            }
        }

        if start.elapsed() >= timeout_duration {
            break;
        }
        sleep(Duration::from_millis(500)).await;
    }

    Err(E2eError::TargetUnreachable {
        url: target.base_url.clone(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_target_gives_up() {
        // Bind then drop to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let target = TargetConfig {
            base_url: format!("http://127.0.0.1:{}/", port),
            preflight_timeout_ms: 0,
            ..Default::default()
        };

        let err = wait_until_reachable(&target).await.unwrap_err();
        assert!(matches!(err, E2eError::TargetUnreachable { attempts: 1, .. }));
    }
}
