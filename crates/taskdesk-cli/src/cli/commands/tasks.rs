//! Task command handlers.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use comfy_table::{ContentArrangement, Table};
use taskdesk_core::client::ApiClient;
use taskdesk_core::models::{Task, TaskStatus};
use taskdesk_core::pages::{
    Dashboard, FormMode, LoadState, NOT_FOUND_MESSAGE, Route, TaskFilter, TaskForm,
    require_session,
};

use super::{NOT_LOGGED_IN, confirm};

/// Field values from the command line; `None` keeps the form's value.
pub struct TaskFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub due: Option<NaiveDate>,
}

impl TaskFields {
    fn apply(self, form: &mut TaskForm) {
        if let Some(title) = self.title {
            form.title = title;
        }
        if let Some(description) = self.description {
            form.description = description;
        }
        if let Some(status) = self.status {
            form.status = status;
        }
        if let Some(due) = self.due {
            form.due_date = Some(due);
        }
    }
}

async fn mount_dashboard(client: &ApiClient) -> Result<Dashboard> {
    let mut dashboard = Dashboard::new();
    if dashboard.mount(client).await == Some(Route::Login) {
        bail!(NOT_LOGGED_IN);
    }
    if let LoadState::Failed(message) = &dashboard.tasks {
        bail!(message.clone());
    }
    Ok(dashboard)
}

fn task_table(tasks: &[&Task]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(["ID", "Title", "Status", "Due"]);
    for task in tasks {
        table.add_row([
            task.id.to_string(),
            task.title.clone(),
            task.status.badge().to_string(),
            task.due_label(),
        ]);
    }
    table
}

pub async fn list(client: &ApiClient, filter: TaskFilter) -> Result<()> {
    let mut dashboard = mount_dashboard(client).await?;
    dashboard.set_filter(filter);

    let counts = dashboard.counts();
    println!(
        "Total: {}  Pending: {}  In progress: {}  Completed: {}",
        counts.total, counts.pending, counts.in_progress, counts.completed
    );
    println!();

    if let Some(message) = dashboard.empty_message() {
        println!("{message}");
        return Ok(());
    }

    println!("{}", task_table(&dashboard.visible()));
    Ok(())
}

pub async fn show(client: &ApiClient, id: i64) -> Result<()> {
    if require_session(client.store()).is_some() {
        bail!(NOT_LOGGED_IN);
    }

    let task = match client.tasks().get(id).await {
        Ok(task) => task,
        Err(e) if e.is_not_found() => bail!(NOT_FOUND_MESSAGE),
        Err(e) => return Err(e.into()),
    };

    println!("#{} {}", task.id, task.title);
    println!("  Status:  {}", task.status.badge());
    println!("  Due:     {}", task.due_label());
    println!("  Created: {}", task.created_at.format("%b %d, %Y %H:%M"));
    println!("  Updated: {}", task.updated_at.format("%b %d, %Y %H:%M"));
    if !task.description.is_empty() {
        println!();
        println!("{}", task.description);
    }
    Ok(())
}

async fn submit(client: &ApiClient, form: &mut TaskForm, verb: &str) -> Result<()> {
    if form.submit(client).await.is_none() {
        bail!(
            form.error
                .clone()
                .unwrap_or_else(|| "Failed to save task".to_string())
        );
    }
    match (&form.saved, form.mode) {
        (Some(task), _) => println!("✓ {verb} task #{}: {}", task.id, task.title),
        (None, FormMode::Edit(id)) => println!("No changes to task #{id}."),
        (None, FormMode::New) => {}
    }
    Ok(())
}

async fn open_form(client: &ApiClient, route: Route) -> Result<TaskForm> {
    let Some(mut form) = TaskForm::from_route(route) else {
        bail!("No task form for {route:?}");
    };
    if form.mount(client).await.is_some() {
        bail!(NOT_LOGGED_IN);
    }
    Ok(form)
}

pub async fn create(client: &ApiClient, fields: TaskFields) -> Result<()> {
    let mut form = open_form(client, Dashboard::open_new()).await?;
    fields.apply(&mut form);
    submit(client, &mut form, "Created").await
}

pub async fn edit(client: &ApiClient, id: i64, fields: TaskFields) -> Result<()> {
    let mut form = open_form(client, Dashboard::open_edit(id)).await?;
    match &form.state {
        LoadState::NotFound => bail!(NOT_FOUND_MESSAGE),
        LoadState::Failed(message) => bail!(message.clone()),
        LoadState::Loading | LoadState::Loaded(()) => {}
    }

    fields.apply(&mut form);
    submit(client, &mut form, "Updated").await
}

pub async fn delete(client: &ApiClient, id: i64, yes: bool) -> Result<()> {
    let mut dashboard = mount_dashboard(client).await?;

    let Some(title) = dashboard
        .tasks
        .loaded()
        .and_then(|tasks| tasks.iter().find(|task| task.id == id))
        .map(|task| task.title.clone())
    else {
        bail!(NOT_FOUND_MESSAGE);
    };

    dashboard.request_delete(id);
    if !yes && !confirm(&format!("Delete task #{id} \"{title}\"?"))? {
        dashboard.cancel_delete();
        println!("Delete cancelled.");
        return Ok(());
    }

    if !dashboard.confirm_delete(client).await {
        bail!(
            dashboard
                .error
                .unwrap_or_else(|| "Failed to delete task".to_string())
        );
    }
    println!("✓ Deleted task #{id}");
    Ok(())
}
