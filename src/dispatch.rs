//! Per-route method dispatch with centrally enforced authentication.
//!
//! Every API route is served by one [`ApiHandler`] that owns an immutable
//! table of [`MethodHandler`]s keyed by HTTP method. The dispatcher answers
//! `405` for unconfigured methods and `401` for failed authentication, so
//! those two responses look the same on every route. Everything else is up
//! to the handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{MethodRouter, any},
};
use tracing::{debug, info};

use crate::auth::{STATE_COOKIE_NAME, Unauthenticated, get_cookie, read_auth_token};
use crate::token::{AuthClaims, StateClaims, TokenCodec, TokenError, Verified};

/// HTTP methods a route can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(HttpMethod::Get),
            Method::POST => Some(HttpMethod::Post),
            Method::PUT => Some(HttpMethod::Put),
            Method::PATCH => Some(HttpMethod::Patch),
            Method::DELETE => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

/// Validates an auth token and returns its claims.
pub trait AuthValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<Verified<AuthClaims>, TokenError>;
}

/// Decodes a state token.
pub trait StateDecoder: Send + Sync {
    fn decode(&self, token: &str) -> Result<Verified<StateClaims>, TokenError>;
}

impl AuthValidator for TokenCodec {
    fn validate(&self, token: &str) -> Result<Verified<AuthClaims>, TokenError> {
        self.decode_auth(token)
    }
}

impl StateDecoder for TokenCodec {
    fn decode(&self, token: &str) -> Result<Verified<StateClaims>, TokenError> {
        self.decode_state(token)
    }
}

/// What the dispatcher established about the caller before invoking a handler.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Present whenever the route authenticates.
    pub auth: Option<Verified<AuthClaims>>,
    /// Decoded state cookie, or the empty state when the route does not
    /// consume state or the cookie is absent or invalid.
    pub state: StateClaims,
}

impl RequestContext {
    /// Authenticated username, empty on unauthenticated routes.
    pub fn subject(&self) -> &str {
        self.auth.as_ref().map(|a| a.sub.as_str()).unwrap_or("")
    }
}

/// Keep a decoded state only if it was issued to the caller's team.
fn own_state(state: StateClaims, auth: Option<&Verified<AuthClaims>>) -> StateClaims {
    match auth {
        Some(auth) if !state.belongs_to(&auth.team_id) => {
            debug!(
                subject = %auth.sub,
                state_team = %state.team_id,
                "Ignoring state token of another team"
            );
            StateClaims::default()
        }
        _ => state,
    }
}

/// Serves one HTTP method on one route.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(&self, request: Request, ctx: RequestContext) -> Response;
}

/// Front door for a single route.
#[derive(Default)]
pub struct ApiHandler {
    auth: Option<Arc<dyn AuthValidator>>,
    state: Option<Arc<dyn StateDecoder>>,
    methods: BTreeMap<HttpMethod, Box<dyn MethodHandler>>,
}

impl ApiHandler {
    /// A route that does not authenticate (e.g. login and registration).
    pub fn new() -> Self {
        Self::default()
    }

    /// A route whose every method requires a valid auth token.
    pub fn authenticated(validator: Arc<dyn AuthValidator>) -> Self {
        Self {
            auth: Some(validator),
            ..Self::default()
        }
    }

    /// Decode the state cookie and hand it to handlers.
    pub fn with_state(mut self, decoder: Arc<dyn StateDecoder>) -> Self {
        self.state = Some(decoder);
        self
    }

    /// Register the handler for a method. A later registration replaces an
    /// earlier one for the same method.
    pub fn on(mut self, method: HttpMethod, handler: impl MethodHandler + 'static) -> Self {
        self.methods.insert(method, Box::new(handler));
        self
    }

    /// Configured methods, comma-joined in a fixed order.
    pub fn allowed_methods(&self) -> String {
        self.methods
            .keys()
            .map(HttpMethod::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub async fn serve(&self, request: Request) -> Response {
        let handler = match HttpMethod::from_method(request.method())
            .and_then(|m| self.methods.get(&m))
        {
            Some(handler) => handler,
            None => return self.method_not_allowed(),
        };

        let auth = match &self.auth {
            Some(validator) => {
                let token = read_auth_token(request.headers());
                match validator.validate(&token) {
                    Ok(claims) => Some(claims),
                    Err(reason) => {
                        info!(
                            method = %request.method(),
                            path = %request.uri().path(),
                            reason = %reason,
                            "Rejected auth token"
                        );
                        return Unauthenticated::from(reason).into_response();
                    }
                }
            }
            None => None,
        };

        let state = match &self.state {
            Some(decoder) => match get_cookie(request.headers(), STATE_COOKIE_NAME) {
                Some(token) => match decoder.decode(token) {
                    Ok(state) => own_state(state.into_claims(), auth.as_ref()),
                    Err(reason) => {
                        debug!(reason = %reason, "Ignoring state token");
                        StateClaims::default()
                    }
                },
                None => StateClaims::default(),
            },
            None => StateClaims::default(),
        };

        handler.handle(request, RequestContext { auth, state }).await
    }

    fn method_not_allowed(&self) -> Response {
        let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
        if let Ok(value) = HeaderValue::from_str(&self.allowed_methods()) {
            let headers = response.headers_mut();
            headers.insert(header::ALLOW, value.clone());
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        response
    }

    /// Mount as an axum route that accepts every method, leaving method
    /// selection to the dispatcher.
    pub fn into_route(self) -> MethodRouter {
        let handler = Arc::new(self);
        any(move |request: Request| {
            let handler = handler.clone();
            async move { handler.serve(request).await }
        })
    }
}
