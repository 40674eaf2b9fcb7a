use serde::Deserialize;

use crate::client::{ApiClient, ApiRequest, ApiResult};
use crate::models::{Task, TaskDraft, TaskPatch};

pub const TASKS_PATH: &str = "tasks/";

/// The list endpoint answers with a bare array, or a paginated envelope
/// when the server has pagination enabled.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TaskList {
    Plain(Vec<Task>),
    Paged { results: Vec<Task> },
}

impl From<TaskList> for Vec<Task> {
    fn from(list: TaskList) -> Self {
        match list {
            TaskList::Plain(tasks) | TaskList::Paged { results: tasks } => tasks,
        }
    }
}

fn task_path(id: i64) -> String {
    format!("{TASKS_PATH}{id}/")
}

/// Task CRUD endpoints. Ownership filtering happens server-side.
#[derive(Debug, Clone, Copy)]
pub struct TasksApi<'a> {
    client: &'a ApiClient,
}

impl<'a> TasksApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Lists the signed-in user's tasks in server order.
    ///
    /// # Errors
    /// Returns pipeline errors.
    pub async fn list(&self) -> ApiResult<Vec<Task>> {
        let list: TaskList = self.client.fetch(&ApiRequest::get(TASKS_PATH)).await?;
        Ok(list.into())
    }

    /// # Errors
    /// Returns a `NotFound` error if the task does not exist.
    pub async fn get(&self, id: i64) -> ApiResult<Task> {
        self.client.fetch(&ApiRequest::get(task_path(id))).await
    }

    /// # Errors
    /// Returns pipeline errors.
    pub async fn create(&self, draft: &TaskDraft) -> ApiResult<Task> {
        let request = ApiRequest::post(TASKS_PATH).json(draft)?;
        self.client.fetch(&request).await
    }

    /// Sends only the fields set on `patch`.
    ///
    /// # Errors
    /// Returns pipeline errors.
    pub async fn update(&self, id: i64, patch: &TaskPatch) -> ApiResult<Task> {
        let request = ApiRequest::patch(task_path(id)).json(patch)?;
        self.client.fetch(&request).await
    }

    /// # Errors
    /// Returns pipeline errors.
    pub async fn delete(&self, id: i64) -> ApiResult<()> {
        self.client.execute(&ApiRequest::delete(task_path(id))).await
    }
}
