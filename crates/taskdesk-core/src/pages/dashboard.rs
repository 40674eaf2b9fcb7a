use std::fmt;
use std::str::FromStr;

use super::{LoadState, Route, require_session};
use crate::client::ApiClient;
use crate::models::{Task, TaskStatus};

/// Client-side status filter over the fetched list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Status(TaskStatus),
}

impl TaskFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Status(status) => task.status == status,
        }
    }

    /// Keeps matching tasks in their original order.
    pub fn apply(self, tasks: &[Task]) -> Vec<&Task> {
        tasks.iter().filter(|task| self.matches(task)).collect()
    }

    pub fn empty_message(self) -> String {
        match self {
            TaskFilter::All => "Get started by creating your first task!".to_string(),
            TaskFilter::Status(status) => format!("No {} tasks yet.", status.label()),
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFilter::All => f.write_str("all"),
            TaskFilter::Status(status) => write!(f, "{status}"),
        }
    }
}

impl FromStr for TaskFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(TaskFilter::All);
        }
        value.parse().map(TaskFilter::Status)
    }
}

/// Per-status tallies shown above the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl StatusCounts {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        tasks.iter().fold(
            Self {
                total: tasks.len(),
                ..Self::default()
            },
            |mut counts, task| {
                match task.status {
                    TaskStatus::Pending => counts.pending += 1,
                    TaskStatus::InProgress => counts.in_progress += 1,
                    TaskStatus::Completed => counts.completed += 1,
                }
                counts
            },
        )
    }
}

/// Task list with filtering and confirmed deletion.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub tasks: LoadState<Vec<Task>>,
    pub filter: TaskFilter,
    /// Task awaiting delete confirmation.
    pub pending_delete: Option<i64>,
    /// Last action failure (delete), shown inline.
    pub error: Option<String>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the session, then fetches the list.
    ///
    /// Returns the login route when signed out.
    pub async fn mount(&mut self, client: &ApiClient) -> Option<Route> {
        if let Some(redirect) = require_session(client.store()) {
            return Some(redirect);
        }
        self.load(client).await;
        None
    }

    pub async fn load(&mut self, client: &ApiClient) {
        self.tasks = LoadState::Loading;
        self.tasks = match client.tasks().list().await {
            Ok(tasks) => LoadState::Loaded(tasks),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load tasks");
                LoadState::Failed(e.user_message("Failed to load tasks"))
            }
        };
    }

    /// Route of the "new task" button.
    pub fn open_new() -> Route {
        Route::NewTask
    }

    /// Route of a task's edit link.
    pub fn open_edit(id: i64) -> Route {
        Route::EditTask(id)
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
    }

    /// Tasks passing the current filter, in server order.
    pub fn visible(&self) -> Vec<&Task> {
        self.tasks
            .loaded()
            .map(|tasks| self.filter.apply(tasks))
            .unwrap_or_default()
    }

    pub fn counts(&self) -> StatusCounts {
        self.tasks
            .loaded()
            .map(|tasks| StatusCounts::from_tasks(tasks))
            .unwrap_or_default()
    }

    /// Message for an empty filtered list, if it is empty.
    pub fn empty_message(&self) -> Option<String> {
        (self.tasks.loaded().is_some() && self.visible().is_empty())
            .then(|| self.filter.empty_message())
    }

    pub fn request_delete(&mut self, id: i64) {
        self.pending_delete = Some(id);
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Deletes the task awaiting confirmation and drops it from the list.
    ///
    /// Returns true if a task was deleted.
    pub async fn confirm_delete(&mut self, client: &ApiClient) -> bool {
        let Some(id) = self.pending_delete.take() else {
            return false;
        };

        self.error = None;
        match client.tasks().delete(id).await {
            Ok(()) => {
                if let LoadState::Loaded(tasks) = &mut self.tasks {
                    tasks.retain(|task| task.id != id);
                }
                tracing::info!(task = id, "deleted task");
                true
            }
            Err(e) => {
                self.error = Some(e.user_message("Failed to delete task"));
                false
            }
        }
    }
}
