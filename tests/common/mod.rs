#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
    response::Response,
};
use serde_json::Value;
use teamboard::{ServerConfig, create_app, db::Database, token::TokenCodec};
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-at-least-32-characters";
pub const PASSWORD: &str = "Myp4ssword!";

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: JWT_SECRET.to_vec(),
        state_secret: None,
        client_origin: None,
        secure_cookies: false,
        auth_rate_limit: 1000,
        ip_header: None,
    }
}

pub async fn test_db() -> Database {
    Database::open(":memory:")
        .await
        .expect("Failed to open test database")
}

pub async fn create_test_app() -> Router {
    create_app(&test_config(test_db().await))
}

/// Codec signing with the same secret as the test app.
pub fn codec() -> TokenCodec {
    TokenCodec::new(JWT_SECRET)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&body).unwrap()
}

/// Full `Set-Cookie` value for the named cookie.
pub fn set_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", name)))
}

/// Token carried by the named `Set-Cookie`.
pub fn cookie_token(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = set_cookie(headers, name)?;
    let value = cookie.split(';').next()?;
    value.split_once('=').map(|(_, token)| token.to_string())
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// POST /api/user/register. Returns the response status, headers and body.
pub async fn register(
    app: &Router,
    username: &str,
    invite_token: Option<&str>,
) -> (StatusCode, HeaderMap, Value) {
    let uri = match invite_token {
        Some(token) => format!("/api/user/register?inviteToken={}", token),
        None => "/api/user/register".to_string(),
    };
    let response = send(
        app,
        json_request(
            Method::POST,
            &uri,
            &serde_json::json!({ "username": username, "password": PASSWORD }),
        ),
    )
    .await;
    let status = response.status();
    let headers = response.headers().clone();
    (status, headers, body_json(response).await)
}

/// A signed-in user that carries its auth and state tokens between requests,
/// the way the browser keeps cookies.
pub struct TestClient {
    pub app: Router,
    pub auth: String,
    pub state: Option<String>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestClient {
    /// Register a new user (founding a team unless invited) and load its state.
    pub async fn register(app: &Router, username: &str, invite_token: Option<&str>) -> Self {
        let (status, headers, _) = register(app, username, invite_token).await;
        assert_eq!(status, StatusCode::OK, "registration of {} failed", username);
        let auth = cookie_token(&headers, "auth-token").expect("auth cookie");

        let mut client = Self {
            app: app.clone(),
            auth,
            state: None,
        };
        let team = client.get("/api/team").await;
        assert_eq!(team.status, StatusCode::OK);
        client
    }

    pub async fn request(&mut self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.auth));
        if let Some(state) = &self.state {
            builder = builder.header(header::COOKIE, format!("state-token={}", state));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = send(&self.app, request).await;
        let status = response.status();
        let headers = response.headers().clone();
        if let Some(state) = cookie_token(&headers, "state-token") {
            self.state = Some(state);
        }
        TestResponse {
            status,
            headers,
            body: body_json(response).await,
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&mut self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None).await
    }

    /// Create a board and return its id.
    pub async fn create_board(&mut self, name: &str) -> String {
        let response = self
            .post("/api/team/board", serde_json::json!({ "name": name }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.body["id"].as_str().unwrap().to_string()
    }

    /// Create a task and return its id.
    pub async fn create_task(&mut self, board_id: &str, column: i64, title: &str) -> String {
        let response = self
            .post(
                "/api/task",
                serde_json::json!({ "boardId": board_id, "column": column, "title": title }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.body["id"].as_str().unwrap().to_string()
    }

    /// Decoded state claims of the current state cookie.
    pub fn decoded_state(&self) -> teamboard::token::StateClaims {
        let token = self.state.as_deref().expect("state cookie");
        codec().decode_state(token).unwrap().into_claims()
    }
}
