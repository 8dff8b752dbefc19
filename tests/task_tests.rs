mod common;

use axum::http::StatusCode;
use common::{TestClient, create_test_app};
use serde_json::json;

async fn client_with_board(app: &axum::Router) -> (TestClient, String) {
    let mut client = TestClient::register(app, "alice1", None).await;
    let board_id = client.create_board("Main").await;
    (client, board_id)
}

fn ids(body: &serde_json::Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_create_task() {
    let app = create_test_app().await;
    let (mut client, board_id) = client_with_board(&app).await;

    let response = client
        .post(
            "/api/task",
            json!({
                "boardId": board_id,
                "column": 1,
                "title": "Write tests",
                "description": "All of them"
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["boardId"], board_id.as_str());
    assert_eq!(response.body["column"], 1);
    assert_eq!(response.body["order"], 0);
    assert_eq!(response.body["description"], "All of them");

    let task_id = response.body["id"].as_str().unwrap();
    assert_eq!(
        client.decoded_state().board_of_task(task_id),
        Some(board_id.as_str())
    );
}

#[tokio::test]
async fn test_create_task_validation() {
    let app = create_test_app().await;
    let (mut client, board_id) = client_with_board(&app).await;

    let bad_column = client
        .post(
            "/api/task",
            json!({ "boardId": board_id, "column": 4, "title": "Nope" }),
        )
        .await;
    assert_eq!(bad_column.status, StatusCode::BAD_REQUEST);

    let no_title = client
        .post("/api/task", json!({ "boardId": board_id, "column": 0 }))
        .await;
    assert_eq!(no_title.status, StatusCode::BAD_REQUEST);

    let unknown_board = client
        .post(
            "/api/task",
            json!({ "boardId": "not-mine", "column": 0, "title": "Nope" }),
        )
        .await;
    assert_eq!(unknown_board.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_tasks_sets_active_board() {
    let app = create_test_app().await;
    let (mut client, board_id) = client_with_board(&app).await;
    let first = client.create_task(&board_id, 0, "First").await;
    let second = client.create_task(&board_id, 0, "Second").await;
    let done = client.create_task(&board_id, 3, "Done").await;

    let response = client.get(&format!("/api/tasks?boardId={}", board_id)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(ids(&response.body), vec![&first, &second, &done]);
    assert_eq!(
        client.decoded_state().active_board.as_deref(),
        Some(board_id.as_str())
    );

    let team = client.get("/api/team").await;
    assert_eq!(team.body["activeBoard"], board_id.as_str());
}

#[tokio::test]
async fn test_teammate_tasks_become_accessible_after_listing() {
    let app = create_test_app().await;
    let (mut admin, board_id) = client_with_board(&app).await;
    let invite = admin.get("/api/team/invite").await;
    let invite_token = invite.body["inviteToken"].as_str().unwrap().to_string();
    let mut member = TestClient::register(&app, "bob123", Some(&invite_token)).await;

    let task_id = admin.create_task(&board_id, 0, "Shared").await;
    let edit_uri = format!("/api/task?id={}", task_id);

    let before = member.patch(&edit_uri, json!({ "title": "Edited" })).await;
    assert_eq!(before.status, StatusCode::FORBIDDEN);

    member.get(&format!("/api/tasks?boardId={}", board_id)).await;
    let after = member.patch(&edit_uri, json!({ "title": "Edited" })).await;
    assert_eq!(after.status, StatusCode::OK);
    assert_eq!(after.body["title"], "Edited");
}

#[tokio::test]
async fn test_move_tasks() {
    let app = create_test_app().await;
    let (mut client, board_id) = client_with_board(&app).await;
    let first = client.create_task(&board_id, 0, "First").await;
    let second = client.create_task(&board_id, 0, "Second").await;

    let response = client
        .patch(
            &format!("/api/tasks?boardId={}", board_id),
            json!([
                { "id": second, "column": 0, "order": 0 },
                { "id": first, "column": 2, "order": 0 }
            ]),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["moved"], 2);

    let list = client.get(&format!("/api/tasks?boardId={}", board_id)).await;
    assert_eq!(ids(&list.body), vec![&second, &first]);
    assert_eq!(list.body[1]["column"], 2);
}

#[tokio::test]
async fn test_move_rejects_unknown_task() {
    let app = create_test_app().await;
    let (mut client, board_id) = client_with_board(&app).await;
    let first = client.create_task(&board_id, 0, "First").await;

    let response = client
        .patch(
            &format!("/api/tasks?boardId={}", board_id),
            json!([
                { "id": first, "column": 1, "order": 0 },
                { "id": "somebody-elses", "column": 1, "order": 1 }
            ]),
        )
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let list = client.get(&format!("/api/tasks?boardId={}", board_id)).await;
    assert_eq!(list.body[0]["column"], 0);
}

#[tokio::test]
async fn test_edit_task() {
    let app = create_test_app().await;
    let (mut client, board_id) = client_with_board(&app).await;
    let task_id = client.create_task(&board_id, 0, "Draft").await;

    let response = client
        .patch(
            &format!("/api/task?id={}", task_id),
            json!({ "title": "Final", "description": "Done right" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["title"], "Final");
    assert_eq!(response.body["description"], "Done right");
}

#[tokio::test]
async fn test_delete_task_updates_state() {
    let app = create_test_app().await;
    let (mut client, board_id) = client_with_board(&app).await;
    let task_id = client.create_task(&board_id, 0, "Doomed").await;

    let response = client.delete(&format!("/api/task?id={}", task_id)).await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(client.decoded_state().board_of_task(&task_id), None);
    let list = client.get(&format!("/api/tasks?boardId={}", board_id)).await;
    assert!(list.body.as_array().unwrap().is_empty());

    let again = client.delete(&format!("/api/task?id={}", task_id)).await;
    assert_eq!(again.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_state_replayed_across_teams_is_ignored() {
    let app = create_test_app().await;
    let (mut alice, board_id) = client_with_board(&app).await;
    let task_id = alice.create_task(&board_id, 0, "Secret").await;
    let mut mallory = TestClient::register(&app, "mallory1", None).await;
    mallory.state = alice.state.clone();

    let list = mallory
        .get(&format!("/api/tasks?boardId={}", board_id))
        .await;
    assert_eq!(list.status, StatusCode::FORBIDDEN);

    mallory.state = alice.state.clone();
    let create = mallory
        .post(
            "/api/task",
            json!({ "boardId": board_id, "column": 0, "title": "Planted" }),
        )
        .await;
    assert_eq!(create.status, StatusCode::FORBIDDEN);

    mallory.state = alice.state.clone();
    let moved = mallory
        .patch(
            &format!("/api/tasks?boardId={}", board_id),
            json!([{ "id": task_id, "column": 3, "order": 0 }]),
        )
        .await;
    assert_eq!(moved.status, StatusCode::FORBIDDEN);

    let list = alice.get(&format!("/api/tasks?boardId={}", board_id)).await;
    assert_eq!(ids(&list.body), vec![task_id.as_str()]);
    assert_eq!(list.body[0]["column"], 0);
}

#[tokio::test]
async fn test_create_task_with_subtasks() {
    let app = create_test_app().await;
    let (mut client, board_id) = client_with_board(&app).await;

    let response = client
        .post(
            "/api/task",
            json!({
                "boardId": board_id,
                "column": 0,
                "title": "Release",
                "subtasks": ["Tag", " Publish "]
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let subtasks = response.body["subtasks"].as_array().unwrap();
    assert_eq!(subtasks.len(), 2);
    assert_eq!(subtasks[0]["title"], "Tag");
    assert_eq!(subtasks[1]["title"], "Publish");
    assert_eq!(subtasks[1]["order"], 1);
    assert_eq!(subtasks[1]["done"], false);

    let list = client.get(&format!("/api/tasks?boardId={}", board_id)).await;
    assert_eq!(list.body[0]["subtasks"][0]["title"], "Tag");
}

#[tokio::test]
async fn test_invalid_subtask_creates_nothing() {
    let app = create_test_app().await;
    let (mut client, board_id) = client_with_board(&app).await;

    let response = client
        .post(
            "/api/task",
            json!({
                "boardId": board_id,
                "column": 0,
                "title": "Release",
                "subtasks": ["Tag", ""]
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Subtask title cannot be empty.");
    let list = client.get(&format!("/api/tasks?boardId={}", board_id)).await;
    assert!(list.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_toggle_subtask() {
    let app = create_test_app().await;
    let (mut client, board_id) = client_with_board(&app).await;
    let created = client
        .post(
            "/api/task",
            json!({ "boardId": board_id, "column": 0, "title": "Release", "subtasks": ["Tag"] }),
        )
        .await;
    let subtask_id = created.body["subtasks"][0]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/subtask?id={}", subtask_id);

    let response = client.patch(&uri, json!({ "done": true })).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["done"], true);
    let list = client.get(&format!("/api/tasks?boardId={}", board_id)).await;
    assert_eq!(list.body[0]["subtasks"][0]["done"], true);

    let missing_done = client.patch(&uri, json!({})).await;
    assert_eq!(missing_done.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subtask_access_goes_through_parent_task() {
    let app = create_test_app().await;
    let (mut admin, board_id) = client_with_board(&app).await;
    let invite = admin.get("/api/team/invite").await;
    let invite_token = invite.body["inviteToken"].as_str().unwrap().to_string();
    let mut member = TestClient::register(&app, "bob123", Some(&invite_token)).await;
    let mut outsider = TestClient::register(&app, "carol1", None).await;

    let created = admin
        .post(
            "/api/task",
            json!({ "boardId": board_id, "column": 0, "title": "Release", "subtasks": ["Tag"] }),
        )
        .await;
    let uri = format!(
        "/api/subtask?id={}",
        created.body["subtasks"][0]["id"].as_str().unwrap()
    );

    let before = member.patch(&uri, json!({ "done": true })).await;
    assert_eq!(before.status, StatusCode::FORBIDDEN);

    member.get(&format!("/api/tasks?boardId={}", board_id)).await;
    let after = member.patch(&uri, json!({ "done": true })).await;
    assert_eq!(after.status, StatusCode::OK);

    outsider.state = admin.state.clone();
    let foreign = outsider.patch(&uri, json!({ "done": false })).await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_subtask_route_methods() {
    let app = create_test_app().await;
    let mut client = TestClient::register(&app, "alice1", None).await;

    let response = client.get("/api/subtask?id=x").await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers.get("allow").unwrap(), "PATCH");
}
