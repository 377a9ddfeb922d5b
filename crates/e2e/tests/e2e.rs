//! E2E test harness entry point
//!
//! This file is the test binary that runs the scenario catalog.
//! Run with: cargo test --package todo-e2e --test e2e -- --backend playwright
//!
//! Without arguments it runs against the in-memory application, so a plain
//! `cargo test` needs neither a browser nor network access.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use todo_e2e::driver::Launcher;
use todo_e2e::memory::{MemoryLauncher, MemoryOptions};
use todo_e2e::playwright::{Browser, PlaywrightLauncher};
use todo_e2e::scenario;
use todo_e2e::{E2eResult, RunnerConfig, TestRunner};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// In-process model of the application
    Memory,
    /// Real browser through Playwright
    Playwright,
}

#[derive(Parser, Debug)]
#[command(name = "todo-e2e")]
#[command(about = "E2E scenarios for the to-do list application")]
struct Args {
    /// YAML runner configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where the scenarios run
    #[arg(long, value_enum, env = "TODO_E2E_BACKEND", default_value = "memory")]
    backend: Backend,

    /// Root URL of the application
    #[arg(long, env = "TODO_E2E_BASE_URL")]
    base_url: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Run only scenarios carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific scenario by name
    #[arg(short, long)]
    name: Option<String>,

    /// Scenarios running concurrently
    #[arg(short, long)]
    workers: Option<usize>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the scenario catalog and exit
    #[arg(long)]
    list: bool,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    if args.list {
        for s in scenario::catalog() {
            println!("{:<32} [{}] {}", s.name, s.tags.join(","), s.description);
        }
        return;
    }

    // Run async main
    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async_main(args));

    match result {
        Ok(success) => {
            if success {
                std::process::exit(0);
            } else {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

fn build_config(args: &Args) -> E2eResult<RunnerConfig> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::from_file(path)?,
        None => RunnerConfig::default(),
    };

    if let Some(base_url) = &args.base_url {
        config.target.base_url = base_url.clone();
    }
    if let Some(browser) = &args.browser {
        config.playwright.browser = browser.parse::<Browser>()?;
    }
    if args.headed {
        config.playwright.headless = false;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let mut config = build_config(&args)?;

    let launcher: Arc<dyn Launcher> = match args.backend {
        Backend::Memory => {
            // In-memory state settles synchronously
            config.expect.timeout_ms = config.expect.timeout_ms.min(250);
            Arc::new(MemoryLauncher::new(MemoryOptions::for_target(
                &config.target,
                &config.selectors,
            )))
        }
        Backend::Playwright => {
            config.preflight = true;
            Arc::new(PlaywrightLauncher::new(config.playwright.clone())?)
        }
    };

    let runner = TestRunner::new(config, launcher);

    // Run scenarios
    let results = if let Some(name) = &args.name {
        runner.run_named(name).await?
    } else if let Some(tag) = &args.tag {
        runner.run_tagged(tag).await?
    } else {
        runner.run_all().await?
    };

    // Write results
    runner.write_results(&results)?;

    Ok(results.is_success())
}
