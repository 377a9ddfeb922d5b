//! In-memory model of the to-do list application
//!
//! Answers the same selectors as the hosted page and behaves the way it
//! does: three tabs of which only the active one is actionable, two task
//! lists, a trailing status marker on completed labels, and (by default)
//! the hosted page's acceptance of whitespace-only tasks. Used for offline
//! runs and by this crate's own tests.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::driver::{Launcher, Locator, Page};
use crate::error::{E2eError, E2eResult};
use crate::page::{Selectors, Tab, TaskList};
use crate::target::TargetConfig;

/// Behavior knobs for the in-memory application
#[derive(Debug, Clone)]
pub struct MemoryOptions {
    pub base_url: String,
    pub title: String,

    /// Accept whitespace-only tasks, as the hosted page currently does
    pub accepts_blank: bool,

    pub selectors: Selectors,
}

impl MemoryOptions {
    pub fn for_target(target: &TargetConfig, selectors: &Selectors) -> Self {
        Self {
            base_url: target.base_url.clone(),
            title: target.expected_title.clone(),
            accepts_blank: true,
            selectors: selectors.clone(),
        }
    }
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self::for_target(&TargetConfig::default(), &Selectors::default())
    }
}

#[derive(Debug, Clone, Serialize)]
struct AppState {
    url: String,
    loaded: bool,
    active_tab: Tab,
    input: String,
    incomplete: Vec<String>,
    completed: Vec<String>,
}

impl AppState {
    fn blank() -> Self {
        Self {
            url: "about:blank".to_string(),
            loaded: false,
            active_tab: Tab::AddItem,
            input: String::new(),
            incomplete: Vec::new(),
            completed: Vec::new(),
        }
    }

    fn list(&self, list: TaskList) -> &Vec<String> {
        match list {
            TaskList::Incomplete => &self.incomplete,
            TaskList::Completed => &self.completed,
        }
    }

    fn list_mut(&mut self, list: TaskList) -> &mut Vec<String> {
        match list {
            TaskList::Incomplete => &mut self.incomplete,
            TaskList::Completed => &mut self.completed,
        }
    }
}

/// Element a locator resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    TabLink(Tab),
    Input,
    Submit,
    Item(TaskList, usize),
    Label(TaskList, usize),
    CompleteControl(usize),
    DeleteControl(TaskList, usize),
}

impl Element {
    /// Tab that must be active for the element to be visible
    fn view(self) -> Option<Tab> {
        match self {
            Element::TabLink(_) => None,
            Element::Input | Element::Submit => Some(Tab::AddItem),
            Element::Item(list, _) | Element::Label(list, _) | Element::DeleteControl(list, _) => Some(list.tab()),
            Element::CompleteControl(_) => Some(Tab::Todo),
        }
    }
}

/// One page of the in-memory application
pub struct MemoryTodoApp {
    options: MemoryOptions,
    state: Mutex<AppState>,
    closed: AtomicBool,
    open_sessions: Option<Arc<AtomicUsize>>,
}

impl MemoryTodoApp {
    pub fn new(options: MemoryOptions) -> Self {
        Self {
            options,
            state: Mutex::new(AppState::blank()),
            closed: AtomicBool::new(false),
            open_sessions: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.options.base_url
    }

    /// Tasks currently in `list`, without markup
    pub fn tasks(&self, list: TaskList) -> Vec<String> {
        self.state.lock().list(list).clone()
    }

    pub fn active_tab(&self) -> Tab {
        self.state.lock().active_tab
    }

    fn ensure_open(&self) -> E2eResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(E2eError::Playwright("Target page has been closed".to_string()));
        }
        Ok(())
    }

    fn tab_label(tab: Tab) -> &'static str {
        match tab {
            Tab::AddItem => "Add Item",
            Tab::Todo => "To-Do Tasks",
            Tab::Completed => "Completed",
        }
    }

    fn resolve(&self, state: &AppState, locator: &Locator) -> Vec<Element> {
        if !state.loaded {
            return Vec::new();
        }
        let selectors = &self.options.selectors;

        let mut found: Vec<Element> = if let Some(tab) = Tab::ALL
            .into_iter()
            .find(|tab| selectors.tab_link(*tab).selector == locator.selector)
        {
            vec![Element::TabLink(tab)]
        } else if locator.selector == selectors.new_task_input {
            vec![Element::Input]
        } else if locator.selector == selectors.submit_button {
            vec![Element::Submit]
        } else if let Some(list) = TaskList::ALL
            .into_iter()
            .find(|list| selectors.items(*list).selector == locator.selector)
        {
            (0..state.list(list).len()).map(|i| Element::Item(list, i)).collect()
        } else {
            Vec::new()
        };

        if let Some(n) = locator.nth {
            found = found.into_iter().nth(n).into_iter().collect();
        }

        if let Some(inner) = &locator.inner {
            found = found
                .into_iter()
                .filter_map(|element| match element {
                    Element::Item(list, i) if inner == list.label(selectors) => Some(Element::Label(list, i)),
                    Element::Item(TaskList::Incomplete, i) if *inner == selectors.complete_control => {
                        Some(Element::CompleteControl(i))
                    }
                    Element::Item(list, i) if *inner == selectors.delete_control => {
                        Some(Element::DeleteControl(list, i))
                    }
                    _ => None,
                })
                .collect();
        }

        found
    }

    /// Resolve to exactly one element, as Playwright's strict mode does
    fn resolve_one(&self, state: &AppState, locator: &Locator) -> E2eResult<Element> {
        let found = self.resolve(state, locator);
        match found.as_slice() {
            [element] => Ok(*element),
            [] => Err(E2eError::Timeout(format!("locator '{}'", locator))),
            many => Err(E2eError::Playwright(format!(
                "strict mode violation: '{}' resolved to {} elements",
                locator,
                many.len()
            ))),
        }
    }

    fn resolve_visible(&self, state: &AppState, locator: &Locator) -> E2eResult<Element> {
        let element = self.resolve_one(state, locator)?;
        match element.view() {
            Some(view) if view != state.active_tab => {
                Err(E2eError::Timeout(format!("locator '{}' to be visible", locator)))
            }
            _ => Ok(element),
        }
    }

    fn text_of(&self, state: &AppState, element: Element) -> String {
        match element {
            Element::TabLink(tab) => Self::tab_label(tab).to_string(),
            Element::Input => String::new(),
            Element::Submit => "Add Item".to_string(),
            Element::Item(list, i) | Element::Label(list, i) => {
                let text = &state.list(list)[i];
                if list.has_status_marker() {
                    format!("{} {}", text, self.options.selectors.status_marker)
                } else {
                    text.clone()
                }
            }
            Element::CompleteControl(i) => state.incomplete[i].clone(),
            Element::DeleteControl(..) => "Delete".to_string(),
        }
    }

    fn submit(&self, state: &mut AppState) {
        let text = std::mem::take(&mut state.input);
        if text.is_empty() {
            return;
        }
        if text.trim().is_empty() && !self.options.accepts_blank {
            debug!("Rejected whitespace-only task");
            return;
        }
        state.incomplete.push(text);
    }
}

impl Default for MemoryTodoApp {
    fn default() -> Self {
        Self::new(MemoryOptions::default())
    }
}

#[async_trait]
impl Page for MemoryTodoApp {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        *state = AppState::blank();
        state.url = url.to_string();
        state.loaded = url == self.options.base_url;
        Ok(())
    }

    async fn title(&self) -> E2eResult<String> {
        self.ensure_open()?;
        let state = self.state.lock();
        Ok(if state.loaded { self.options.title.clone() } else { String::new() })
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let element = self.resolve_visible(&state, locator)?;

        match element {
            Element::TabLink(tab) => state.active_tab = tab,
            Element::Submit => self.submit(&mut state),
            Element::CompleteControl(i) => {
                let text = state.incomplete.remove(i);
                state.completed.push(text);
            }
            Element::DeleteControl(list, i) => {
                state.list_mut(list).remove(i);
            }
            Element::Input | Element::Item(..) | Element::Label(..) => {}
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        match self.resolve_visible(&state, locator)? {
            Element::Input => {
                state.input = value.to_string();
                Ok(())
            }
            _ => Err(E2eError::Playwright(format!(
                "'{}' is not an <input>, <textarea> or [contenteditable] element",
                locator
            ))),
        }
    }

    async fn input_value(&self, locator: &Locator) -> E2eResult<String> {
        self.ensure_open()?;
        let state = self.state.lock();
        match self.resolve_one(&state, locator)? {
            Element::Input => Ok(state.input.clone()),
            _ => Err(E2eError::Playwright(format!("'{}' is not an input element", locator))),
        }
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<String> {
        self.ensure_open()?;
        let state = self.state.lock();
        let element = self.resolve_one(&state, locator)?;
        Ok(self.text_of(&state, element))
    }

    async fn all_text_contents(&self, locator: &Locator) -> E2eResult<Vec<String>> {
        self.ensure_open()?;
        let state = self.state.lock();
        Ok(self
            .resolve(&state, locator)
            .into_iter()
            .map(|element| self.text_of(&state, element))
            .collect())
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        self.ensure_open()?;
        let state = self.state.lock();
        Ok(self.resolve(&state, locator).len())
    }

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        self.ensure_open()?;
        let state = self.state.lock();
        let value = match (self.resolve_one(&state, locator)?, name) {
            (Element::TabLink(tab), "class") => {
                if tab == state.active_tab {
                    Some(format!("mdl-layout__tab {}", self.options.selectors.active_tab_class))
                } else {
                    Some("mdl-layout__tab".to_string())
                }
            }
            (Element::TabLink(tab), "href") => Some(tab.href().to_string()),
            (Element::Input, "id") => Some(self.options.selectors.new_task_input.trim_start_matches('#').to_string()),
            _ => None,
        };
        Ok(value)
    }

    /// Writes the application state as JSON; there are no pixels to capture
    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        self.ensure_open()?;
        let snapshot = serde_json::to_vec_pretty(&*self.state.lock())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, snapshot)?;
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Some(open) = &self.open_sessions {
                open.fetch_sub(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

/// Hands every scenario a fresh in-memory application
pub struct MemoryLauncher {
    options: MemoryOptions,
    open_sessions: Arc<AtomicUsize>,
    launched: AtomicUsize,
}

impl MemoryLauncher {
    pub fn new(options: MemoryOptions) -> Self {
        Self {
            options,
            open_sessions: Arc::new(AtomicUsize::new(0)),
            launched: AtomicUsize::new(0),
        }
    }

    /// Sessions handed out and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Launcher for MemoryLauncher {
    fn name(&self) -> &str {
        "memory"
    }

    async fn new_page(&self) -> E2eResult<Box<dyn Page>> {
        self.launched.fetch_add(1, Ordering::SeqCst);
        self.open_sessions.fetch_add(1, Ordering::SeqCst);

        let mut app = MemoryTodoApp::new(self.options.clone());
        app.open_sessions = Some(Arc::clone(&self.open_sessions));
        Ok(Box::new(app))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loaded() -> (MemoryTodoApp, Selectors) {
        let app = MemoryTodoApp::default();
        app.goto(app.base_url()).await.unwrap();
        (app, Selectors::default())
    }

    #[tokio::test]
    async fn test_unknown_url_is_blank() {
        let app = MemoryTodoApp::default();
        app.goto("https://example.invalid/").await.unwrap();
        assert_eq!(app.title().await.unwrap(), "");
        assert_eq!(app.count(&Selectors::default().input()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_submit_appends_and_clears() {
        let (app, sel) = loaded().await;
        app.fill(&sel.input(), "Buy milk").await.unwrap();
        app.click(&sel.submit()).await.unwrap();

        assert_eq!(app.tasks(TaskList::Incomplete), vec!["Buy milk"]);
        assert_eq!(app.input_value(&sel.input()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_empty_submit_is_ignored() {
        let (app, sel) = loaded().await;
        app.click(&sel.submit()).await.unwrap();
        assert!(app.tasks(TaskList::Incomplete).is_empty());
    }

    #[tokio::test]
    async fn test_blank_submit_follows_option() {
        let (app, sel) = loaded().await;
        app.fill(&sel.input(), "   ").await.unwrap();
        app.click(&sel.submit()).await.unwrap();
        assert_eq!(app.tasks(TaskList::Incomplete), vec!["   "]);

        let strict = MemoryTodoApp::new(MemoryOptions {
            accepts_blank: false,
            ..Default::default()
        });
        strict.goto(strict.base_url()).await.unwrap();
        strict.fill(&sel.input(), "   ").await.unwrap();
        strict.click(&sel.submit()).await.unwrap();
        assert!(strict.tasks(TaskList::Incomplete).is_empty());
        assert_eq!(strict.input_value(&sel.input()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_hidden_controls_time_out() {
        let (app, sel) = loaded().await;
        app.fill(&sel.input(), "Task").await.unwrap();
        app.click(&sel.submit()).await.unwrap();

        // Add-item view is active, the todo list is hidden
        let err = app.click(&sel.complete_control_at(0)).await.unwrap_err();
        assert!(matches!(err, E2eError::Timeout(_)));

        app.click(&sel.tab_link(Tab::Todo)).await.unwrap();
        assert_eq!(app.active_tab(), Tab::Todo);
        app.click(&sel.complete_control_at(0)).await.unwrap();
        assert_eq!(app.tasks(TaskList::Completed), vec!["Task"]);
    }

    #[tokio::test]
    async fn test_completed_labels_carry_marker() {
        let (app, sel) = loaded().await;
        app.fill(&sel.input(), "Task").await.unwrap();
        app.click(&sel.submit()).await.unwrap();
        app.click(&sel.tab_link(Tab::Todo)).await.unwrap();
        app.click(&sel.complete_control_at(0)).await.unwrap();

        let labels = app.all_text_contents(&sel.labels(TaskList::Completed)).await.unwrap();
        assert_eq!(labels, vec!["Task done"]);
    }

    #[tokio::test]
    async fn test_strict_mode_on_multiple_matches() {
        let (app, sel) = loaded().await;
        for text in ["a", "b"] {
            app.fill(&sel.input(), text).await.unwrap();
            app.click(&sel.submit()).await.unwrap();
        }

        let err = app.text_content(&sel.labels(TaskList::Incomplete)).await.unwrap_err();
        assert!(matches!(err, E2eError::Playwright(ref msg) if msg.contains("strict mode")));
        assert_eq!(app.text_content(&sel.label_at(TaskList::Incomplete, 1)).await.unwrap(), "b");
        assert_eq!(app.count(&sel.items(TaskList::Incomplete).nth(5)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_labels_resolve_per_list() {
        let (app, sel) = loaded().await;
        for text in ["a", "b"] {
            app.fill(&sel.input(), text).await.unwrap();
            app.click(&sel.submit()).await.unwrap();
        }
        app.click(&sel.tab_link(Tab::Todo)).await.unwrap();
        app.click(&sel.complete_control_at(0)).await.unwrap();

        let incomplete = sel.items(TaskList::Incomplete);
        let completed = sel.items(TaskList::Completed);

        // Each list renders its text in a different element
        assert_eq!(app.count(&incomplete.clone().locate(&sel.incomplete_label)).await.unwrap(), 1);
        assert_eq!(app.count(&incomplete.locate(&sel.completed_label)).await.unwrap(), 0);
        assert_eq!(app.count(&completed.clone().locate(&sel.completed_label)).await.unwrap(), 1);
        assert_eq!(app.count(&completed.locate(&sel.incomplete_label)).await.unwrap(), 0);

        // Completed items have no checkbox label to click
        assert_eq!(
            app.count(&sel.items(TaskList::Completed).nth(0).locate(&sel.complete_control))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_unknown_controls_match_nothing() {
        let (app, sel) = loaded().await;
        app.fill(&sel.input(), "a").await.unwrap();
        app.click(&sel.submit()).await.unwrap();
        app.click(&sel.tab_link(Tab::Todo)).await.unwrap();

        let item = sel.items(TaskList::Incomplete).nth(0);
        let done_button = item.clone().locate(r#"button:has-text("Done")"#);
        assert_eq!(app.count(&done_button).await.unwrap(), 0);
        assert!(matches!(app.click(&done_button).await, Err(E2eError::Timeout(_))));
        assert_eq!(app.count(&Locator::new("#add-item button")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_launcher_tracks_open_sessions() {
        let launcher = MemoryLauncher::new(MemoryOptions::default());
        let first = launcher.new_page().await.unwrap();
        let second = launcher.new_page().await.unwrap();
        assert_eq!(launcher.open_sessions(), 2);

        first.close().await.unwrap();
        first.close().await.unwrap();
        assert_eq!(launcher.open_sessions(), 1);

        second.close().await.unwrap();
        assert_eq!(launcher.open_sessions(), 0);
        assert_eq!(launcher.launched(), 2);

        assert!(second.title().await.is_err());
    }
}
