pub mod api;
pub mod auth;
pub mod cli;
pub mod cors;
pub mod db;
pub mod dispatch;
pub mod password;
pub mod rate_limit;
pub mod token;

use api::{AppState, create_api_router};
use axum::{Router, http::HeaderName, middleware};
use cors::{CorsConfig, cors_middleware};
use db::Database;
use std::net::SocketAddr;
use std::sync::Arc;
use token::TokenCodec;
use tokio::net::TcpListener;
use tracing::warn;
use url::Url;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing auth and invite tokens
    pub jwt_secret: Vec<u8>,
    /// Separate secret for state tokens; the JWT secret is used when unset
    pub state_secret: Option<Vec<u8>>,
    /// Web client origin allowed by CORS
    pub client_origin: Option<Url>,
    /// Whether to set Secure (and SameSite=None) on cookies
    pub secure_cookies: bool,
    /// Login/registration attempts per IP per minute
    pub auth_rate_limit: u32,
    /// Header carrying the client IP (requires running behind a proxy)
    pub ip_header: Option<HeaderName>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let mut tokens = TokenCodec::new(&config.jwt_secret);
    if let Some(secret) = &config.state_secret {
        tokens = tokens.with_state_secret(secret);
    }

    let app = AppState {
        db: config.db.clone(),
        tokens: Arc::new(tokens),
        secure_cookies: config.secure_cookies,
    };

    let router = Router::new().nest(
        "/api",
        create_api_router(app, config.auth_rate_limit, config.ip_header.clone()),
    );

    match config.client_origin.as_ref() {
        Some(origin) => match CorsConfig::new(origin) {
            Some(cors) => router.layer(middleware::from_fn_with_state(cors, cors_middleware)),
            None => {
                warn!(origin = %origin, "Client origin has no usable origin; CORS disabled");
                router
            }
        },
        None => router,
    }
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
