//! Playwright browser automation
//!
//! Each page is backed by its own `node` process running a generated
//! Playwright script. Requests go to the script's stdin and responses come
//! back on stdout, one JSON object per line.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::{Launcher, Locator, Page};
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Per-action timeout handed to Playwright
    pub action_timeout_ms: u64,

    /// How long to wait for the bridge to launch the browser
    pub launch_timeout_ms: u64,

    /// Directory holding `node_modules/playwright`, exported as NODE_PATH
    pub node_path: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            action_timeout_ms: 5000,
            launch_timeout_ms: 30_000,
            node_path: None,
        }
    }
}

/// A request sent to the bridge
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Goto { url: String },
    Title,
    Click { locator: Locator },
    Fill { locator: Locator, value: String },
    InputValue { locator: Locator },
    TextContent { locator: Locator },
    AllTextContents { locator: Locator },
    Count { locator: Locator },
    GetAttribute { locator: Locator, name: String },
    Screenshot { path: PathBuf },
    Close,
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a Request,
}

/// A response line from the bridge
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timeout: bool,
}

impl Response {
    /// Turn a failed response into the matching error
    fn into_result(self, what: &str) -> E2eResult<serde_json::Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| "unknown error".to_string());
        if self.timeout {
            Err(E2eError::Timeout(format!("{}: {}", what, message)))
        } else {
            Err(E2eError::Playwright(format!("{}: {}", what, message)))
        }
    }
}

/// Body of the bridge script. `config` is defined by the generated header.
const BRIDGE_BODY: &str = r#"
const readline = require('readline');

function resolve(l) {
  let loc = page.locator(l.selector);
  if (l.nth !== undefined && l.nth !== null) loc = loc.nth(l.nth);
  if (l.inner) loc = loc.locator(l.inner);
  return loc;
}

async function handle(req) {
  switch (req.op) {
    case 'goto': await page.goto(req.url); return null;
    case 'title': return await page.title();
    case 'click': await resolve(req.locator).click(); return null;
    case 'fill': await resolve(req.locator).fill(req.value); return null;
    case 'input_value': return await resolve(req.locator).inputValue();
    case 'text_content': return (await resolve(req.locator).textContent()) ?? '';
    case 'all_text_contents': return await resolve(req.locator).allTextContents();
    case 'count': return await resolve(req.locator).count();
    case 'get_attribute': return await resolve(req.locator).getAttribute(req.name);
    case 'screenshot': await page.screenshot({ path: req.path, fullPage: true }); return null;
    default: throw new Error('unknown op: ' + req.op);
  }
}

let browser;
let page;

(async () => {
  browser = await engines[config.browser].launch({ headless: config.headless });
  const context = await browser.newContext({
    viewport: { width: config.viewportWidth, height: config.viewportHeight }
  });
  page = await context.newPage();
  page.setDefaultTimeout(config.actionTimeout);
  console.log(JSON.stringify({ id: 0, ok: true, value: 'ready' }));

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    const req = JSON.parse(line);
    if (req.op === 'close') {
      await browser.close();
      console.log(JSON.stringify({ id: req.id, ok: true, value: null }));
      process.exit(0);
    }
    try {
      const value = await handle(req);
      console.log(JSON.stringify({ id: req.id, ok: true, value: value }));
    } catch (error) {
      console.log(JSON.stringify({
        id: req.id,
        ok: false,
        error: error.message,
        timeout: error.name === 'TimeoutError'
      }));
    }
  }
  await browser.close();
})().catch(async (error) => {
  console.error(error.stack || String(error));
  if (browser) await browser.close();
  process.exit(1);
});
"#;

/// Build the bridge script for a configuration
pub fn build_script(config: &PlaywrightConfig) -> String {
    let mut script = String::new();

    script.push_str(&format!(
        r#"const {{ chromium, firefox, webkit }} = require('playwright');
const engines = {{ chromium, firefox, webkit }};
const config = {{
  browser: '{browser}',
  headless: {headless},
  viewportWidth: {width},
  viewportHeight: {height},
  actionTimeout: {timeout}
}};
"#,
        browser = config.browser.as_str(),
        headless = config.headless,
        width = config.viewport_width,
        height = config.viewport_height,
        timeout = config.action_timeout_ms,
    ));
    script.push_str(BRIDGE_BODY);

    script
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

/// Playwright-backed page
pub struct PlaywrightPage {
    io: Mutex<BridgeIo>,
    child: Mutex<Child>,
    // Holds the script file for the life of the process
    _script_dir: TempDir,
}

impl PlaywrightPage {
    /// Spawn a bridge process and wait until its browser is up
    pub async fn launch(config: &PlaywrightConfig) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, build_script(config))?;

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut cmd = TokioCommand::new("node");
        cmd.arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(node_path) = &config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take().ok_or(E2eError::BridgeClosed)?;
        let stdout = child.stdout.take().ok_or(E2eError::BridgeClosed)?;

        let page = Self {
            io: Mutex::new(BridgeIo {
                stdin,
                stdout: BufReader::new(stdout).lines(),
                next_id: 1,
            }),
            child: Mutex::new(child),
            _script_dir: script_dir,
        };

        let launch_timeout = Duration::from_millis(config.launch_timeout_ms);
        let ready = tokio::time::timeout(launch_timeout, page.read_response(0))
            .await
            .map_err(|_| E2eError::Timeout(format!("{} to launch", config.browser.as_str())))??;
        ready.into_result("launch")?;

        info!("Launched {} (headless: {})", config.browser.as_str(), config.headless);
        Ok(page)
    }

    async fn read_response(&self, expected_id: u64) -> E2eResult<Response> {
        let mut io = self.io.lock().await;
        Self::read_line(&mut io, expected_id).await
    }

    async fn read_line(io: &mut BridgeIo, expected_id: u64) -> E2eResult<Response> {
        let line = io.stdout.next_line().await?.ok_or(E2eError::BridgeClosed)?;
        let response: Response = serde_json::from_str(&line)
            .map_err(|e| E2eError::Protocol(format!("bad response {:?}: {}", line, e)))?;
        if response.id != expected_id {
            return Err(E2eError::Protocol(format!(
                "expected response {}, got {}",
                expected_id, response.id
            )));
        }
        Ok(response)
    }

    /// Send one request and wait for its response
    async fn call(&self, request: Request) -> E2eResult<serde_json::Value> {
        let what = describe(&request);
        let mut io = self.io.lock().await;

        let id = io.next_id;
        io.next_id += 1;

        let mut line = serde_json::to_string(&Envelope { id, request: &request })?;
        line.push('\n');
        io.stdin.write_all(line.as_bytes()).await.map_err(|_| E2eError::BridgeClosed)?;
        io.stdin.flush().await.map_err(|_| E2eError::BridgeClosed)?;

        debug!("-> {}", what);
        Self::read_line(&mut io, id).await?.into_result(&what)
    }

    /// Stop the bridge process, politely first
    async fn terminate(&self) -> E2eResult<()> {
        let mut child = self.child.lock().await;

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && tokio::time::timeout(Duration::from_millis(500), child.wait()).await.is_ok()
                {
                    return Ok(());
                }
            }
        }

        child.kill().await?;
        Ok(())
    }
}

/// Short description of a request for logs and errors
fn describe(request: &Request) -> String {
    match request {
        Request::Goto { url } => format!("goto:{}", url),
        Request::Title => "title".to_string(),
        Request::Click { locator } => format!("click:{}", locator),
        Request::Fill { locator, .. } => format!("fill:{}", locator),
        Request::InputValue { locator } => format!("input_value:{}", locator),
        Request::TextContent { locator } => format!("text_content:{}", locator),
        Request::AllTextContents { locator } => format!("all_text_contents:{}", locator),
        Request::Count { locator } => format!("count:{}", locator),
        Request::GetAttribute { locator, name } => format!("get_attribute:{}@{}", locator, name),
        Request::Screenshot { path } => format!("screenshot:{}", path.display()),
        Request::Close => "close".to_string(),
    }
}

fn expect_string(value: serde_json::Value, what: &str) -> E2eResult<String> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        other => Err(E2eError::Protocol(format!("{}: expected string, got {}", what, other))),
    }
}

#[async_trait]
impl Page for PlaywrightPage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.call(Request::Goto { url: url.to_string() }).await?;
        Ok(())
    }

    async fn title(&self) -> E2eResult<String> {
        let value = self.call(Request::Title).await?;
        expect_string(value, "title")
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.call(Request::Click { locator: locator.clone() }).await?;
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.call(Request::Fill {
            locator: locator.clone(),
            value: value.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn input_value(&self, locator: &Locator) -> E2eResult<String> {
        let value = self.call(Request::InputValue { locator: locator.clone() }).await?;
        expect_string(value, "input_value")
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<String> {
        let value = self.call(Request::TextContent { locator: locator.clone() }).await?;
        expect_string(value, "text_content")
    }

    async fn all_text_contents(&self, locator: &Locator) -> E2eResult<Vec<String>> {
        let value = self.call(Request::AllTextContents { locator: locator.clone() }).await?;
        serde_json::from_value(value).map_err(E2eError::from)
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        let value = self.call(Request::Count { locator: locator.clone() }).await?;
        serde_json::from_value(value).map_err(E2eError::from)
    }

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        let value = self
            .call(Request::GetAttribute {
                locator: locator.clone(),
                name: name.to_string(),
            })
            .await?;
        serde_json::from_value(value).map_err(E2eError::from)
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.call(Request::Screenshot { path: path.to_path_buf() }).await?;
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        match self.call(Request::Close).await {
            Ok(_) => {
                let mut child = self.child.lock().await;
                if tokio::time::timeout(Duration::from_secs(2), child.wait()).await.is_err() {
                    warn!("Bridge did not exit after close, killing it");
                    child.kill().await?;
                }
                Ok(())
            }
            Err(e) => {
                warn!("Close request failed ({}), terminating bridge", e);
                self.terminate().await
            }
        }
    }
}

/// Launches one Playwright bridge per page
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    /// Create a launcher, failing early if Playwright is missing
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;
        Ok(Self { config })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }
}

#[async_trait]
impl Launcher for PlaywrightLauncher {
    fn name(&self) -> &str {
        self.config.browser.as_str()
    }

    async fn new_page(&self) -> E2eResult<Box<dyn Page>> {
        let page = PlaywrightPage::launch(&self.config).await?;
        Ok(Box::new(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playwright_config_default() {
        let config = PlaywrightConfig::default();
        assert_eq!(config.browser, Browser::Chromium);
        assert!(config.headless);
        assert_eq!(config.action_timeout_ms, 5000);
    }

    #[test]
    fn test_browser_from_str() {
        assert_eq!("webkit".parse::<Browser>().unwrap(), Browser::Webkit);
        assert!(matches!("opera".parse::<Browser>(), Err(E2eError::Config(_))));
    }

    #[test]
    fn test_build_script_embeds_config() {
        let config = PlaywrightConfig {
            browser: Browser::Firefox,
            headless: false,
            viewport_width: 800,
            viewport_height: 600,
            action_timeout_ms: 1234,
            ..Default::default()
        };
        let script = build_script(&config);

        assert!(script.contains("browser: 'firefox'"));
        assert!(script.contains("headless: false"));
        assert!(script.contains("viewportWidth: 800"));
        assert!(script.contains("actionTimeout: 1234"));
        assert!(script.contains("case 'all_text_contents'"));
    }

    #[test]
    fn test_request_envelope_shape() {
        let request = Request::Fill {
            locator: Locator::new("#new-task"),
            value: "Play hard".to_string(),
        };
        let json = serde_json::to_value(Envelope { id: 7, request: &request }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "op": "fill",
                "locator": { "selector": "#new-task" },
                "value": "Play hard"
            })
        );

        let json = serde_json::to_value(Envelope { id: 8, request: &Request::Title }).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 8, "op": "title" }));
    }

    #[test]
    fn test_response_errors() {
        let timeout: Response =
            serde_json::from_str(r#"{"id":3,"ok":false,"error":"locator.click: Timeout 5000ms exceeded","timeout":true}"#)
                .unwrap();
        assert!(matches!(timeout.into_result("click"), Err(E2eError::Timeout(_))));

        let failed: Response = serde_json::from_str(r#"{"id":4,"ok":false,"error":"boom"}"#).unwrap();
        assert!(matches!(failed.into_result("fill"), Err(E2eError::Playwright(ref m)) if m == "fill: boom"));

        let ok: Response = serde_json::from_str(r#"{"id":5,"ok":true,"value":3}"#).unwrap();
        assert_eq!(ok.into_result("count").unwrap(), serde_json::json!(3));
    }
}
