mod common;

use axum::http::StatusCode;
use common::{TestClient, create_test_app};
use serde_json::json;

async fn admin_and_member(app: &axum::Router) -> (TestClient, TestClient) {
    let mut admin = TestClient::register(app, "alice1", None).await;
    let invite = admin.get("/api/team/invite").await;
    let invite_token = invite.body["inviteToken"].as_str().unwrap().to_string();
    let member = TestClient::register(app, "bob123", Some(&invite_token)).await;
    (admin, member)
}

#[tokio::test]
async fn test_create_board_adds_it_to_state() {
    let app = create_test_app().await;
    let mut admin = TestClient::register(&app, "alice1", None).await;

    let response = admin
        .post("/api/team/board", json!({ "name": "  Sprint 1 " }))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["name"], "Sprint 1");
    let id = response.body["id"].as_str().unwrap();
    assert!(admin.decoded_state().has_board(id));

    let team = admin.get("/api/team").await;
    assert_eq!(team.body["boards"][0]["name"], "Sprint 1");
}

#[tokio::test]
async fn test_board_name_validation() {
    let app = create_test_app().await;
    let mut admin = TestClient::register(&app, "alice1", None).await;

    let empty = admin.post("/api/team/board", json!({ "name": "" })).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.body["error"], "Board name cannot be empty.");

    let long = admin
        .post(
            "/api/team/board",
            json!({ "name": "A Board Whose Name Is Just Too Long!" }),
        )
        .await;
    assert_eq!(long.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        long.body["error"],
        "Board name cannot be longer than 35 characters."
    );
}

#[tokio::test]
async fn test_team_board_limit() {
    let app = create_test_app().await;
    let mut admin = TestClient::register(&app, "alice1", None).await;
    for name in ["One", "Two", "Three"] {
        admin.create_board(name).await;
    }

    let response = admin.post("/api/team/board", json!({ "name": "Four" })).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(admin.decoded_state().boards.len(), 3);
}

#[tokio::test]
async fn test_member_cannot_manage_boards() {
    let app = create_test_app().await;
    let (mut admin, mut member) = admin_and_member(&app).await;
    let board_id = admin.create_board("Main").await;
    // Pick up the new board in the member's state.
    member.get("/api/team").await;

    let create = member.post("/api/team/board", json!({ "name": "Mine" })).await;
    assert_eq!(create.status, StatusCode::FORBIDDEN);

    let rename = member
        .patch(
            &format!("/api/team/board?id={}", board_id),
            json!({ "name": "Renamed" }),
        )
        .await;
    assert_eq!(rename.status, StatusCode::FORBIDDEN);

    let delete = member
        .delete(&format!("/api/team/board?id={}", board_id))
        .await;
    assert_eq!(delete.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rename_board() {
    let app = create_test_app().await;
    let mut admin = TestClient::register(&app, "alice1", None).await;
    let board_id = admin.create_board("Main").await;

    let response = admin
        .patch(
            &format!("/api/team/board?id={}", board_id),
            json!({ "name": "Renamed" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "Renamed");
    let team = admin.get("/api/team").await;
    assert_eq!(team.body["boards"][0]["name"], "Renamed");
}

#[tokio::test]
async fn test_delete_board_updates_state() {
    let app = create_test_app().await;
    let mut admin = TestClient::register(&app, "alice1", None).await;
    let board_id = admin.create_board("Main").await;
    admin.create_task(&board_id, 0, "Write tests").await;

    let response = admin
        .delete(&format!("/api/team/board?id={}", board_id))
        .await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(!admin.decoded_state().has_board(&board_id));
    let team = admin.get("/api/team").await;
    assert!(team.body["boards"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_board_outside_state_is_forbidden() {
    let app = create_test_app().await;
    let mut alice = TestClient::register(&app, "alice1", None).await;
    let mut carol = TestClient::register(&app, "carol1", None).await;
    let board_id = alice.create_board("Alice's").await;

    let response = carol
        .delete(&format!("/api/team/board?id={}", board_id))
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let team = alice.get("/api/team").await;
    assert_eq!(team.body["boards"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_state_of_other_team_is_ignored() {
    let app = create_test_app().await;
    let mut alice = TestClient::register(&app, "alice1", None).await;
    let mut carol = TestClient::register(&app, "carol1", None).await;
    let board_id = alice.create_board("Alice's").await;

    carol.state = alice.state.clone();
    let response = carol
        .delete(&format!("/api/team/board?id={}", board_id))
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let team = alice.get("/api/team").await;
    assert_eq!(team.body["boards"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_board_id() {
    let app = create_test_app().await;
    let mut admin = TestClient::register(&app, "alice1", None).await;

    let response = admin.delete("/api/team/board").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Board ID cannot be empty.");
}
