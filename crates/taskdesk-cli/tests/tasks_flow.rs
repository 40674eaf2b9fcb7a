//! Integration tests for task commands against a mock API.


use assert_cmd::cargo::cargo_bin_cmd;
use fixtures::{can_bind_localhost, read_session, task_json, temp_home, write_session};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn signed_in() -> (TempDir, MockServer) {
    let home = temp_home();
    write_session(home.path(), "T1", "R1", "a");
    (home, MockServer::start().await)
}

async fn mount_list(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/tasks/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            task_json(5, "Write report", "pending"),
            task_json(6, "Ship release", "completed"),
        ])))
        .mount(server)
        .await;
}

#[test]
fn test_list_without_session_fails() {
    let home = temp_home();

    cargo_bin_cmd!("taskdesk")
        .env("TASKDESK_HOME", home.path())
        .args(["tasks", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Not logged in. Run 'taskdesk login'.",
        ));
}

#[tokio::test]
async fn test_list_shows_counts_and_tasks() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let (home, server) = signed_in().await;
    mount_list(&server).await;

    cargo_bin_cmd!("taskdesk")
        .env("TASKDESK_HOME", home.path())
        .env("TASKDESK_API_URL", server.uri())
        .args(["tasks", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Total: 2  Pending: 1  In progress: 0  Completed: 1",
        ))
        .stdout(predicate::str::contains("Write report"))
        .stdout(predicate::str::contains("COMPLETED"))
        .stdout(predicate::str::contains("Jan 01, 2024"));
}

#[tokio::test]
async fn test_list_filter_shows_empty_state() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let (home, server) = signed_in().await;
    mount_list(&server).await;

    cargo_bin_cmd!("taskdesk")
        .env("TASKDESK_HOME", home.path())
        .env("TASKDESK_API_URL", server.uri())
        .args(["tasks", "list", "--status", "in_progress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No in progress tasks yet."));
}

#[tokio::test]
async fn test_new_task_is_created() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let (home, server) = signed_in().await;

    Mock::given(method("POST"))
        .and(path("/tasks/"))
        .and(header("authorization", "Bearer T1"))
        .and(body_json(json!({
            "title": "X",
            "description": "Y",
            "status": "pending",
            "due_date": "2024-01-01"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(task_json(42, "X", "pending")))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("taskdesk")
        .env("TASKDESK_HOME", home.path())
        .env("TASKDESK_API_URL", server.uri())
        .args([
            "tasks",
            "new",
            "--title",
            "X",
            "--description",
            "Y",
            "--due",
            "2024-01-01",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created task #42: X"));
}

async fn mount_editable_task(server: &MockServer) {
    let mut task = task_json(5, "Write report", "pending");
    task["description"] = json!("Quarterly numbers");
    Mock::given(method("GET"))
        .and(path("/tasks/5/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_edit_sends_only_changed_fields() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let (home, server) = signed_in().await;
    mount_editable_task(&server).await;

    let mut updated = task_json(5, "Write report", "completed");
    updated["description"] = json!("Quarterly numbers");
    Mock::given(method("PATCH"))
        .and(path("/tasks/5/"))
        .and(body_json(json!({"status": "completed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("taskdesk")
        .env("TASKDESK_HOME", home.path())
        .env("TASKDESK_API_URL", server.uri())
        .args(["tasks", "edit", "5", "--status", "completed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated task #5: Write report"));
}

#[tokio::test]
async fn test_edit_without_changes_sends_nothing() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let (home, server) = signed_in().await;
    mount_editable_task(&server).await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    cargo_bin_cmd!("taskdesk")
        .env("TASKDESK_HOME", home.path())
        .env("TASKDESK_API_URL", server.uri())
        .args(["tasks", "edit", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes to task #5."));
}

#[tokio::test]
async fn test_show_missing_task() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let (home, server) = signed_in().await;

    Mock::given(method("GET"))
        .and(path("/tasks/99/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&server)
        .await;

    cargo_bin_cmd!("taskdesk")
        .env("TASKDESK_HOME", home.path())
        .env("TASKDESK_API_URL", server.uri())
        .args(["tasks", "show", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("doesn't exist or has been deleted"));
}

#[tokio::test]
async fn test_delete_with_confirmation_flag() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let (home, server) = signed_in().await;
    mount_list(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/tasks/5/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("taskdesk")
        .env("TASKDESK_HOME", home.path())
        .env("TASKDESK_API_URL", server.uri())
        .args(["tasks", "delete", "5", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted task #5"));
}

#[tokio::test]
async fn test_declined_delete_sends_nothing() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let (home, server) = signed_in().await;
    mount_list(&server).await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    cargo_bin_cmd!("taskdesk")
        .env("TASKDESK_HOME", home.path())
        .env("TASKDESK_API_URL", server.uri())
        .args(["tasks", "delete", "5"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Delete cancelled."));
}

#[tokio::test]
async fn test_expired_token_is_refreshed_transparently() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    write_session(home.path(), "OLD", "R1", "a");
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tasks/"))
        .and(header("authorization", "Bearer OLD"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .and(body_json(json!({"refresh": "R1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "NEW"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/"))
        .and(header("authorization", "Bearer NEW"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([task_json(1, "Fresh", "pending")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("taskdesk")
        .env("TASKDESK_HOME", home.path())
        .env("TASKDESK_API_URL", server.uri())
        .args(["tasks", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fresh"))
        .stderr(predicate::str::contains("Session expired").not());

    let session = read_session(home.path());
    assert_eq!(session["access_token"], "NEW");
    assert_eq!(session["refresh_token"], "R1");
}
