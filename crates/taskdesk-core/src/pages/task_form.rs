use chrono::NaiveDate;

use super::{LoadState, Route, require_session};
use crate::client::ApiClient;
use crate::models::{Task, TaskDraft, TaskPatch, TaskStatus};

pub const NOT_FOUND_MESSAGE: &str =
    "The task you're looking for doesn't exist or has been deleted.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    New,
    Edit(i64),
}

/// Create/edit form. Every field is required.
#[derive(Debug, Clone)]
pub struct TaskForm {
    pub mode: FormMode,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    /// Edit mode fetches the task first; new forms start loaded.
    pub state: LoadState<()>,
    pub error: Option<String>,
    pub saving: bool,
    /// Server copy after a successful submit.
    pub saved: Option<Task>,
    /// Values as loaded, so an edit only sends what changed.
    original: Option<TaskDraft>,
}

impl TaskForm {
    pub fn new_task() -> Self {
        Self {
            mode: FormMode::New,
            title: String::new(),
            description: String::new(),
            status: TaskStatus::default(),
            due_date: None,
            state: LoadState::Loaded(()),
            error: None,
            saving: false,
            saved: None,
            original: None,
        }
    }

    /// Form for a form route; other routes have none.
    pub fn from_route(route: Route) -> Option<Self> {
        match route {
            Route::NewTask => Some(Self::new_task()),
            Route::EditTask(id) => Some(Self::edit(id)),
            Route::Login | Route::Register | Route::Dashboard => None,
        }
    }

    pub fn edit(id: i64) -> Self {
        Self {
            mode: FormMode::Edit(id),
            state: LoadState::Loading,
            ..Self::new_task()
        }
    }

    fn fill(&mut self, task: &Task) {
        let draft = TaskDraft::from(task);
        self.title.clone_from(&draft.title);
        self.description.clone_from(&draft.description);
        self.status = draft.status;
        self.due_date = Some(draft.due_date);
        self.original = Some(draft);
    }

    /// Checks the session and, when editing, loads the task.
    pub async fn mount(&mut self, client: &ApiClient) -> Option<Route> {
        if let Some(redirect) = require_session(client.store()) {
            return Some(redirect);
        }
        self.load(client).await;
        None
    }

    pub async fn load(&mut self, client: &ApiClient) {
        let FormMode::Edit(id) = self.mode else {
            self.state = LoadState::Loaded(());
            return;
        };

        self.state = LoadState::Loading;
        self.state = match client.tasks().get(id).await {
            Ok(task) => {
                self.fill(&task);
                LoadState::Loaded(())
            }
            Err(e) if e.is_not_found() => LoadState::NotFound,
            Err(e) => LoadState::Failed(e.user_message("Failed to load task")),
        };
    }

    /// Builds the submission, or the first missing-field message.
    ///
    /// # Errors
    /// Returns a message naming the first empty required field.
    pub fn validate(&self) -> Result<TaskDraft, String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("Title is required".to_string());
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err("Description is required".to_string());
        }
        let Some(due_date) = self.due_date else {
            return Err("Due date is required".to_string());
        };

        Ok(TaskDraft {
            title: title.to_string(),
            description: description.to_string(),
            status: self.status,
            due_date,
        })
    }

    /// Creates or updates the task and returns the dashboard route.
    ///
    /// An edit sends only the fields that differ from the loaded task and
    /// skips the request when nothing changed, leaving `saved` empty.
    /// Failures are recorded in `error`.
    pub async fn submit(&mut self, client: &ApiClient) -> Option<Route> {
        self.error = None;
        let draft = match self.validate() {
            Ok(draft) => draft,
            Err(message) => {
                self.error = Some(message);
                return None;
            }
        };

        let patch = match &self.original {
            Some(original) => TaskPatch::changes(original, draft.clone()),
            None => TaskPatch::from(draft.clone()),
        };
        if matches!(self.mode, FormMode::Edit(_)) && patch.is_empty() {
            tracing::debug!("no changes to save");
            return Some(Route::Dashboard);
        }

        self.saving = true;
        let result = match self.mode {
            FormMode::New => client.tasks().create(&draft).await,
            FormMode::Edit(id) => client.tasks().update(id, &patch).await,
        };
        self.saving = false;

        match result {
            Ok(task) => {
                tracing::info!(task = task.id, "saved task");
                self.original = Some(TaskDraft::from(&task));
                self.saved = Some(task);
                Some(Route::Dashboard)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to save task");
                self.error = Some(e.user_message("Failed to save task"));
                None
            }
        }
    }
}
