//! To-Do List E2E Test Framework
//!
//! This crate drives a hosted to-do list application through a page object
//! and checks its behavior with a fixed catalog of scenarios:
//! - Controls Playwright through a long-lived Node bridge (JSON lines)
//! - Wraps the application's markup in the `TodoPage` page object
//! - Runs each scenario in its own browser session with guaranteed teardown
//! - Ships an in-memory model of the application for offline runs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── launcher.new_page() -> Box<dyn Page>                 │
//! │    ├── TodoPage::navigate()                                 │
//! │    ├── (scenario.run)(&TodoPage)                            │
//! │    └── TodoPage::close()          (always)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TodoPage                                                   │
//! │    ├── select_tab / add_task / add_tasks                    │
//! │    ├── complete_task / complete_all_tasks                   │
//! │    ├── delete_task / delete_all_tasks                       │
//! │    └── all_task_texts / task_present / count_items          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page (trait)                                               │
//! │    ├── PlaywrightPage  -> node bridge -> browser            │
//! │    └── MemoryTodoApp   -> in-process model                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod driver;
pub mod error;
pub mod expect;
pub mod memory;
pub mod page;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod target;

pub use driver::{Launcher, Locator, Page};
pub use error::{E2eError, E2eResult};
pub use page::{Selectors, Tab, TaskList, TodoPage};
pub use runner::{RunnerConfig, TestRunner};
