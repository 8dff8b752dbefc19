//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::rate_limit::DEFAULT_AUTH_PER_MINUTE;
use axum::http::HeaderName;
use clap::Parser;
use tracing::{error, info, warn};
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "teamboard", about = "Team task boards with token-based sessions")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "teamboard.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Origin of the web client (e.g. "https://board.example.com").
    /// An https origin enables secure cookies.
    #[arg(long, env = "CLIENT_ORIGIN", value_parser = validate_client_origin)]
    pub client_origin: Option<Url>,

    /// Header carrying the client IP when running behind a reverse proxy
    #[arg(long, value_parser = validate_ip_header)]
    pub ip_header: Option<HeaderName>,

    /// Login and registration attempts allowed per IP per minute
    #[arg(long, default_value_t = DEFAULT_AUTH_PER_MINUTE)]
    pub auth_rate_limit: u32,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn validate_client_origin(s: &str) -> Result<Url, String> {
    let url = Url::parse(s).map_err(|e| format!("Invalid client origin {}: {}", s, e))?;

    let is_https = url.scheme() == "https";
    let is_localhost = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));

    if !is_https && !is_localhost {
        return Err("Client origin must use HTTPS for non-localhost deployments".into());
    }

    Ok(url)
}

fn validate_ip_header(s: &str) -> Result<HeaderName, String> {
    HeaderName::try_from(s).map_err(|e| format!("Invalid header name {}: {}", s, e))
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Read a secret from the environment, then clear the variable to prevent leaking.
fn take_env_secret(name: &str) -> Option<String> {
    let secret = std::env::var(name).ok()?;
    // SAFETY: We're single-threaded at this point during startup,
    // and no other code is reading this environment variable.
    unsafe { std::env::remove_var(name) };
    Some(secret)
}

fn check_secret_length(name: &str, secret: String) -> Result<String, String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(format!(
            "{} is shorter than {} characters. Use a longer secret",
            name, MIN_JWT_SECRET_LENGTH
        ));
    }
    Ok(secret)
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Some(secret) = take_env_secret("JWT_SECRET") {
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    match check_secret_length("JWT secret", secret) {
        Ok(secret) => Some(secret),
        Err(msg) => {
            error!("{}", msg);
            None
        }
    }
}

/// Load the optional state token secret from `STATE_SECRET`.
/// `Ok(None)` means state tokens share the JWT secret.
pub fn load_state_secret() -> Result<Option<String>, String> {
    take_env_secret("STATE_SECRET")
        .map(|secret| check_secret_length("State secret", secret))
        .transpose()
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    jwt_secret: String,
    state_secret: Option<String>,
) -> ServerConfig {
    let secure_cookies = args
        .client_origin
        .as_ref()
        .is_some_and(|url| url.scheme() == "https");
    if !secure_cookies {
        warn!("Client origin is not HTTPS; cookies are sent without the Secure flag");
    }

    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        state_secret: state_secret.map(String::into_bytes),
        client_origin: args.client_origin.clone(),
        secure_cookies,
        auth_rate_limit: args.auth_rate_limit,
        ip_header: args.ip_header.clone(),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
