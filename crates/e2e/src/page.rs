//! Page object for the to-do list application
//!
//! `TodoPage` is the only place that knows the application's markup.
//! Scenarios speak in tasks, tabs and lists; selectors live in
//! [`Selectors`] so they can be overridden from configuration.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::{Locator, Page};
use crate::error::{E2eError, E2eResult};
use crate::expect::Expect;
use crate::target::TargetConfig;

/// One of the three mutually exclusive views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tab {
    AddItem,
    Todo,
    Completed,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::AddItem, Tab::Todo, Tab::Completed];

    /// Fragment the tab link points at
    pub fn href(self) -> &'static str {
        match self {
            Tab::AddItem => "#add-item",
            Tab::Todo => "#todo",
            Tab::Completed => "#completed",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href()[1..])
    }
}

/// The two task lists rendered by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskList {
    #[serde(rename = "incomplete-tasks")]
    Incomplete,
    #[serde(rename = "completed-tasks")]
    Completed,
}

impl TaskList {
    pub const ALL: [TaskList; 2] = [TaskList::Incomplete, TaskList::Completed];

    /// DOM id of the list container
    pub fn id(self) -> &'static str {
        match self {
            TaskList::Incomplete => "incomplete-tasks",
            TaskList::Completed => "completed-tasks",
        }
    }

    /// View that renders this list
    pub fn tab(self) -> Tab {
        match self {
            TaskList::Incomplete => Tab::Todo,
            TaskList::Completed => Tab::Completed,
        }
    }

    pub fn other(self) -> TaskList {
        match self {
            TaskList::Incomplete => TaskList::Completed,
            TaskList::Completed => TaskList::Incomplete,
        }
    }

    /// Selector of the label inside one of this list's items
    pub fn label(self, selectors: &Selectors) -> &str {
        match self {
            TaskList::Incomplete => &selectors.incomplete_label,
            TaskList::Completed => &selectors.completed_label,
        }
    }

    /// Whether labels in this list carry the trailing status marker
    pub fn has_status_marker(self) -> bool {
        matches!(self, TaskList::Completed)
    }
}

impl fmt::Display for TaskList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TaskList {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskList::ALL
            .into_iter()
            .find(|list| list.id() == s)
            .ok_or_else(|| E2eError::UnknownList(s.to_string()))
    }
}

/// Selectors for every element the page object touches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Text input for a new task
    pub new_task_input: String,

    /// Button that submits the input, matched by role and accessible name
    pub submit_button: String,

    /// Class carried by the active tab link
    pub active_tab_class: String,

    /// Items of the incomplete list
    pub incomplete_items: String,

    /// Items of the completed list
    pub completed_items: String,

    /// Text of an incomplete item
    pub incomplete_label: String,

    /// Text of a completed item, followed by the status marker
    pub completed_label: String,

    /// Clicking this inside an incomplete item completes it
    pub complete_control: String,

    /// Delete control inside an item of either list
    pub delete_control: String,

    /// Word rendered after completed labels
    pub status_marker: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            new_task_input: "#new-task".to_string(),
            submit_button: r#"role=button[name="add"]"#.to_string(),
            active_tab_class: "is-active".to_string(),
            incomplete_items: "ul#incomplete-tasks li".to_string(),
            completed_items: "ul#completed-tasks li".to_string(),
            incomplete_label: "span.mdl-checkbox__label".to_string(),
            completed_label: "span.mdl-list__item-primary-content".to_string(),
            complete_control: "label".to_string(),
            delete_control: "button.delete".to_string(),
            status_marker: "done".to_string(),
        }
    }
}

impl Selectors {
    pub fn tab_link(&self, tab: Tab) -> Locator {
        Locator::new(format!(r#"a[href="{}"]"#, tab.href()))
    }

    pub fn input(&self) -> Locator {
        Locator::new(&self.new_task_input)
    }

    pub fn submit(&self) -> Locator {
        Locator::new(&self.submit_button)
    }

    /// Every item of `list`
    pub fn items(&self, list: TaskList) -> Locator {
        match list {
            TaskList::Incomplete => Locator::new(&self.incomplete_items),
            TaskList::Completed => Locator::new(&self.completed_items),
        }
    }

    /// Every label of `list`, in rendered order
    pub fn labels(&self, list: TaskList) -> Locator {
        self.items(list).locate(list.label(self))
    }

    pub fn label_at(&self, list: TaskList, index: usize) -> Locator {
        self.items(list).nth(index).locate(list.label(self))
    }

    pub fn complete_control_at(&self, index: usize) -> Locator {
        self.items(TaskList::Incomplete).nth(index).locate(&self.complete_control)
    }

    pub fn delete_control_at(&self, list: TaskList, index: usize) -> Locator {
        self.items(list).nth(index).locate(&self.delete_control)
    }
}

/// Strips the trailing status marker from completed labels
#[derive(Debug, Clone)]
pub struct StatusMarker {
    pattern: Option<Regex>,
}

impl StatusMarker {
    pub fn new(marker: &str) -> E2eResult<Self> {
        if marker.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = Regex::new(&format!(r"\s*{}\s*$", regex::escape(marker)))
            .map_err(|e| E2eError::Config(format!("status marker {:?}: {}", marker, e)))?;

        Ok(Self { pattern: Some(pattern) })
    }

    /// Remove one trailing marker, if present
    pub fn strip<'a>(&self, label: &'a str) -> Cow<'a, str> {
        match &self.pattern {
            Some(pattern) => pattern.replace(label, ""),
            None => Cow::Borrowed(label),
        }
    }

    /// Apply the cleanup rule `list` uses for its labels
    pub fn clean(&self, list: TaskList, label: String) -> String {
        if list.has_status_marker() {
            self.strip(&label).into_owned()
        } else {
            label
        }
    }
}

/// Page object over a single browser page
pub struct TodoPage {
    page: Box<dyn Page>,
    target: TargetConfig,
    selectors: Selectors,
    marker: StatusMarker,
    expect: Expect,
}

impl TodoPage {
    pub fn new(page: Box<dyn Page>, target: TargetConfig, selectors: Selectors, expect: Expect) -> E2eResult<Self> {
        let marker = StatusMarker::new(&selectors.status_marker)?;
        Ok(Self {
            page,
            target,
            selectors,
            marker,
            expect,
        })
    }

    pub fn selectors(&self) -> &Selectors {
        &self.selectors
    }

    pub fn expect(&self) -> &Expect {
        &self.expect
    }

    /// Underlying automation page
    pub fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    /// Load the application and check its title
    pub async fn navigate(&self) -> E2eResult<()> {
        debug!("Navigating to {}", self.target.base_url);
        self.page.goto(&self.target.base_url).await?;
        self.expect
            .to_have_title(self.page(), &self.target.expected_title)
            .await
    }

    /// Click a tab link and wait for it to become active
    pub async fn select_tab(&self, tab: Tab) -> E2eResult<()> {
        let link = self.selectors.tab_link(tab);
        self.page.click(&link).await?;
        self.expect
            .to_have_class(self.page(), &link, &self.selectors.active_tab_class)
            .await
    }

    /// Submit one task through the add-item view.
    ///
    /// The text is passed through untouched, including empty and
    /// whitespace-only strings; whatever validation exists is the
    /// application's.
    pub async fn add_task(&self, text: &str) -> E2eResult<()> {
        debug!("Adding task {:?}", text);
        self.select_tab(Tab::AddItem).await?;

        let input = self.selectors.input();
        self.page.fill(&input, text).await?;
        self.expect.to_have_value(self.page(), &input, text).await?;

        self.page.click(&self.selectors.submit()).await?;
        self.expect.to_have_value(self.page(), &input, "").await
    }

    /// Add each task in order. The first failure aborts the rest.
    pub async fn add_tasks<S: AsRef<str>>(&self, texts: &[S]) -> E2eResult<()> {
        for text in texts {
            self.add_task(text.as_ref()).await?;
        }
        Ok(())
    }

    /// Exactly `expected` elements match `locator`
    pub async fn count_items(&self, locator: &Locator, expected: usize) -> E2eResult<()> {
        self.expect.to_have_count(self.page(), locator, expected).await
    }

    /// Exactly `expected` items are rendered in `list`
    pub async fn expect_task_count(&self, list: TaskList, expected: usize) -> E2eResult<()> {
        self.count_items(&self.selectors.items(list), expected).await
    }

    /// Current number of items in `list`, without waiting
    pub async fn task_count(&self, list: TaskList) -> E2eResult<usize> {
        self.page.count(&self.selectors.items(list)).await
    }

    /// Whether any item of `list` currently renders `text`
    pub async fn task_present(&self, list: TaskList, text: &str) -> E2eResult<bool> {
        let texts = self.all_task_texts(list).await?;
        Ok(texts.iter().any(|t| t == text))
    }

    /// Complete the incomplete task at `index` and return its text.
    ///
    /// The label is read before the click; the element is gone afterwards.
    pub async fn complete_task(&self, index: usize) -> E2eResult<String> {
        self.select_tab(Tab::Todo).await?;

        let label = self
            .page
            .text_content(&self.selectors.label_at(TaskList::Incomplete, index))
            .await?;
        let text = self.marker.clean(TaskList::Incomplete, label);

        debug!("Completing task {} ({:?})", index, text);
        self.page.click(&self.selectors.complete_control_at(index)).await?;
        Ok(text)
    }

    /// Complete the first incomplete task until none are left.
    /// Returns the texts in completion order.
    pub async fn complete_all_tasks(&self) -> E2eResult<Vec<String>> {
        let mut completed = Vec::new();

        loop {
            let remaining = self.task_count(TaskList::Incomplete).await?;
            if remaining == 0 {
                break;
            }
            completed.push(self.complete_task(0).await?);
            // A list that does not shrink would otherwise loop forever
            self.expect_task_count(TaskList::Incomplete, remaining - 1).await?;
        }

        Ok(completed)
    }

    /// Delete the task at `index` of `list` and return its text
    pub async fn delete_task(&self, list: TaskList, index: usize) -> E2eResult<String> {
        self.select_tab(list.tab()).await?;

        let label = self
            .page
            .text_content(&self.selectors.label_at(list, index))
            .await?;
        let text = self.marker.clean(list, label);

        debug!("Deleting task {} from {} ({:?})", index, list, text);
        self.page.click(&self.selectors.delete_control_at(list, index)).await?;
        Ok(text)
    }

    /// Delete the first task of `list` until it is empty.
    /// Returns the texts in deletion order.
    pub async fn delete_all_tasks(&self, list: TaskList) -> E2eResult<Vec<String>> {
        let mut deleted = Vec::new();

        loop {
            let remaining = self.task_count(list).await?;
            if remaining == 0 {
                break;
            }
            deleted.push(self.delete_task(list, 0).await?);
            self.expect_task_count(list, remaining - 1).await?;
        }

        Ok(deleted)
    }

    /// Snapshot of every label in `list`, in rendered order
    pub async fn all_task_texts(&self, list: TaskList) -> E2eResult<Vec<String>> {
        let labels = self
            .page
            .all_text_contents(&self.selectors.labels(list))
            .await?;
        Ok(labels
            .into_iter()
            .map(|label| self.marker.clean(list, label))
            .collect())
    }

    pub async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        self.page.screenshot(path).await
    }

    pub async fn close(&self) -> E2eResult<()> {
        self.page.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_task_list_from_id() {
        assert_eq!("incomplete-tasks".parse::<TaskList>().unwrap(), TaskList::Incomplete);
        assert_eq!("completed-tasks".parse::<TaskList>().unwrap(), TaskList::Completed);
        assert!(matches!(
            "archived-tasks".parse::<TaskList>(),
            Err(E2eError::UnknownList(id)) if id == "archived-tasks"
        ));
    }

    #[test]
    fn test_task_list_owning_tab() {
        assert_eq!(TaskList::Incomplete.tab(), Tab::Todo);
        assert_eq!(TaskList::Completed.tab(), Tab::Completed);
        assert_eq!(TaskList::Incomplete.other(), TaskList::Completed);
    }

    #[test]
    fn test_tab_link_selector() {
        let selectors = Selectors::default();
        assert_eq!(selectors.tab_link(Tab::Todo).selector, r##"a[href="#todo"]"##);
        assert_eq!(Tab::AddItem.to_string(), "add-item");
    }

    #[test]
    fn test_item_locators_are_indexed() {
        let selectors = Selectors::default();
        let loc = selectors.delete_control_at(TaskList::Completed, 2);
        assert_eq!(loc.selector, "ul#completed-tasks li");
        assert_eq!(loc.nth, Some(2));
        assert_eq!(loc.inner.as_deref(), Some("button.delete"));
        assert_eq!(selectors.labels(TaskList::Incomplete).nth, None);
    }

    #[test]
    fn test_each_list_has_its_own_label() {
        let selectors = Selectors::default();
        let incomplete = selectors.label_at(TaskList::Incomplete, 0);
        let completed = selectors.label_at(TaskList::Completed, 0);

        assert_eq!(incomplete.inner.as_deref(), Some("span.mdl-checkbox__label"));
        assert_eq!(completed.inner.as_deref(), Some("span.mdl-list__item-primary-content"));
        assert_ne!(incomplete.inner, completed.inner);

        // The completion control is the item's checkbox label, not its text
        let control = selectors.complete_control_at(0);
        assert_eq!(control.inner.as_deref(), Some("label"));
        assert_ne!(control.inner, incomplete.inner);
    }

    #[test]
    fn test_label_selectors_from_yaml() {
        let yaml = "incomplete_label: .todo-text\ncompleted_label: .done-text\n";
        let selectors: Selectors = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(TaskList::Incomplete.label(&selectors), ".todo-text");
        assert_eq!(TaskList::Completed.label(&selectors), ".done-text");
        // Unset fields keep the application's defaults
        assert_eq!(selectors.delete_control, "button.delete");
    }

    #[test_case("Play hard done", "Play hard" ; "space separated")]
    #[test_case("Play hard\n  done\n", "Play hard" ; "markup whitespace")]
    #[test_case("get it done done", "get it done" ; "only one marker stripped")]
    #[test_case("Play hard", "Play hard" ; "no marker")]
    #[test_case("a.b (c) done", "a.b (c)" ; "regex characters in label")]
    fn test_status_marker_strip(label: &str, expected: &str) {
        let marker = StatusMarker::new("done").unwrap();
        assert_eq!(marker.strip(label), expected);
    }

    #[test]
    fn test_incomplete_labels_are_untouched() {
        let marker = StatusMarker::new("done").unwrap();
        assert_eq!(marker.clean(TaskList::Incomplete, "all done".to_string()), "all done");
        assert_eq!(marker.clean(TaskList::Completed, "all done done".to_string()), "all done");
    }

    #[test]
    fn test_empty_marker_disables_stripping() {
        let marker = StatusMarker::new("").unwrap();
        assert_eq!(marker.strip("task done "), "task done ");
    }
}
