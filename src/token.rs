//! Signed, expiring tokens for identity and UI state.
//!
//! Every token is an HS256 JWS whose payload carries a `typ` tag naming its
//! kind. The tag is part of the signed payload, so a token minted as one kind
//! never decodes as another.

use std::ops::Deref;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Auth token lifetime: 1 hour
pub const AUTH_TOKEN_DURATION_SECS: i64 = 60 * 60;

/// State token lifetime: 1 hour
pub const STATE_TOKEN_DURATION_SECS: i64 = 60 * 60;

/// Invite token lifetime: 1 week
pub const INVITE_TOKEN_DURATION_SECS: i64 = 7 * 24 * 60 * 60;

/// Token kind embedded in the signed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Who is calling
    Auth,
    /// Which boards the caller may act on and which one is active
    State,
    /// Grants membership of an existing team at registration
    Invite,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Auth => "auth",
            TokenKind::State => "state",
            TokenKind::Invite => "invite",
        }
    }
}

/// Identity claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Username
    pub sub: String,
    pub is_admin: bool,
    pub team_id: String,
}

impl AuthClaims {
    pub fn new(sub: impl Into<String>, is_admin: bool, team_id: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            is_admin,
            team_id: team_id.into(),
        }
    }
}

/// A board the caller's team owns, with the tasks it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    pub id: String,
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// Transient UI selection context.
///
/// A state belongs to one team. It only grants access when `team_id`
/// matches the caller's auth token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateClaims {
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub active_board: Option<String>,
    #[serde(default)]
    pub boards: Vec<BoardState>,
}

impl StateClaims {
    pub fn new(
        team_id: impl Into<String>,
        active_board: Option<String>,
        boards: Vec<BoardState>,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            active_board,
            boards,
        }
    }

    pub fn for_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = team_id.into();
        self
    }

    pub fn belongs_to(&self, team_id: &str) -> bool {
        self.team_id == team_id
    }

    pub fn board(&self, board_id: &str) -> Option<&BoardState> {
        self.boards.iter().find(|b| b.id == board_id)
    }

    pub fn has_board(&self, board_id: &str) -> bool {
        self.board(board_id).is_some()
    }

    /// Board that holds the given task, if the task is known.
    pub fn board_of_task(&self, task_id: &str) -> Option<&str> {
        self.boards
            .iter()
            .find(|b| b.tasks.iter().any(|t| t == task_id))
            .map(|b| b.id.as_str())
    }

    pub fn with_board(mut self, board_id: impl Into<String>) -> Self {
        self.boards.push(BoardState {
            id: board_id.into(),
            tasks: Vec::new(),
        });
        self
    }

    pub fn without_board(mut self, board_id: &str) -> Self {
        self.boards.retain(|b| b.id != board_id);
        if self.active_board.as_deref() == Some(board_id) {
            self.active_board = None;
        }
        self
    }

    pub fn with_active_board(mut self, board_id: impl Into<String>) -> Self {
        self.active_board = Some(board_id.into());
        self
    }

    pub fn with_task(mut self, board_id: &str, task_id: impl Into<String>) -> Self {
        if let Some(board) = self.boards.iter_mut().find(|b| b.id == board_id) {
            board.tasks.push(task_id.into());
        }
        self
    }

    /// Replace the known tasks of a board.
    pub fn with_board_tasks(mut self, board_id: &str, tasks: Vec<String>) -> Self {
        if let Some(board) = self.boards.iter_mut().find(|b| b.id == board_id) {
            board.tasks = tasks;
        }
        self
    }

    pub fn without_task(mut self, task_id: &str) -> Self {
        for board in &mut self.boards {
            board.tasks.retain(|t| t != task_id);
        }
        self
    }
}

/// Invitation to join a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteClaims {
    pub team_id: String,
}

/// Claims of a token that passed signature, kind and expiry checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified<C> {
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub issued_at: i64,
    /// Expiration time (Unix timestamp)
    pub expires_at: i64,
    pub claims: C,
}

impl<C> Verified<C> {
    pub fn into_claims(self) -> C {
        self.claims
    }
}

impl<C> Deref for Verified<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.claims
    }
}

#[derive(Serialize)]
struct Envelope<'a, C> {
    typ: TokenKind,
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    claims: &'a C,
}

#[derive(Clone, Deserialize)]
struct RawEnvelope {
    typ: TokenKind,
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Encodes and decodes every token kind. Holds only immutable key material.
#[derive(Clone)]
pub struct TokenCodec {
    auth: KeyPair,
    state: KeyPair,
}

impl TokenCodec {
    /// Create a codec that signs every kind with the same secret.
    pub fn new(secret: &[u8]) -> Self {
        let keys = KeyPair::new(secret);
        Self {
            auth: keys.clone(),
            state: keys,
        }
    }

    /// Sign state tokens with their own secret.
    pub fn with_state_secret(mut self, secret: &[u8]) -> Self {
        self.state = KeyPair::new(secret);
        self
    }

    pub fn encode_auth(
        &self,
        expires_at: DateTime<Utc>,
        claims: &AuthClaims,
    ) -> Result<String, TokenError> {
        if claims.sub.is_empty() {
            return Err(TokenError::EmptySubject);
        }
        encode(&self.auth, TokenKind::Auth, expires_at, claims)
    }

    pub fn decode_auth(&self, token: &str) -> Result<Verified<AuthClaims>, TokenError> {
        self.decode_auth_at(token, Utc::now())
    }

    pub fn decode_auth_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Verified<AuthClaims>, TokenError> {
        let verified: Verified<AuthClaims> = decode(&self.auth, TokenKind::Auth, token, now)?;
        if verified.sub.is_empty() {
            return Err(TokenError::EmptySubject);
        }
        Ok(verified)
    }

    pub fn encode_state(
        &self,
        expires_at: DateTime<Utc>,
        claims: &StateClaims,
    ) -> Result<String, TokenError> {
        encode(&self.state, TokenKind::State, expires_at, claims)
    }

    pub fn decode_state(&self, token: &str) -> Result<Verified<StateClaims>, TokenError> {
        self.decode_state_at(token, Utc::now())
    }

    pub fn decode_state_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Verified<StateClaims>, TokenError> {
        decode(&self.state, TokenKind::State, token, now)
    }

    pub fn encode_invite(
        &self,
        expires_at: DateTime<Utc>,
        claims: &InviteClaims,
    ) -> Result<String, TokenError> {
        encode(&self.auth, TokenKind::Invite, expires_at, claims)
    }

    pub fn decode_invite(&self, token: &str) -> Result<Verified<InviteClaims>, TokenError> {
        decode(&self.auth, TokenKind::Invite, token, Utc::now())
    }
}

fn encode<C: Serialize>(
    keys: &KeyPair,
    kind: TokenKind,
    expires_at: DateTime<Utc>,
    claims: &C,
) -> Result<String, TokenError> {
    let envelope = Envelope {
        typ: kind,
        iat: Utc::now().timestamp(),
        exp: expires_at.timestamp(),
        claims,
    };
    jsonwebtoken::encode(&Header::default(), &envelope, &keys.encoding).map_err(TokenError::Encoding)
}

fn decode<C: DeserializeOwned>(
    keys: &KeyPair,
    kind: TokenKind,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Verified<C>, TokenError> {
    if token.is_empty() {
        return Err(TokenError::Missing);
    }

    // Expiry is checked below against `now` so that exp == now counts as expired.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = false;

    let raw = jsonwebtoken::decode::<RawEnvelope>(token, &keys.decoding, &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed(e),
        })?
        .claims;

    if raw.typ != kind {
        return Err(TokenError::WrongKind {
            expected: kind,
            found: raw.typ,
        });
    }

    if raw.exp <= now.timestamp() {
        return Err(TokenError::Expired);
    }

    let claims = serde_json::from_value(serde_json::Value::Object(raw.rest))
        .map_err(TokenError::Claims)?;

    Ok(Verified {
        kind: raw.typ,
        issued_at: raw.iat,
        expires_at: raw.exp,
        claims,
    })
}

/// Errors that can occur during token operations.
///
/// Every decoding variant means "unauthenticated" to the client; the variant
/// itself is for server-side logs.
#[derive(Debug)]
pub enum TokenError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// No token was supplied
    Missing,
    /// Not a well-formed token of this scheme
    Malformed(jsonwebtoken::errors::Error),
    /// Signature does not verify with the server secret
    BadSignature,
    /// Token is past its expiry
    Expired,
    /// Token was minted for a different purpose
    WrongKind {
        expected: TokenKind,
        found: TokenKind,
    },
    /// Claims do not match the shape of their kind
    Claims(serde_json::Error),
    /// Auth token without a subject
    EmptySubject,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Missing => write!(f, "No token"),
            TokenError::Malformed(e) => write!(f, "Malformed token: {}", e),
            TokenError::BadSignature => write!(f, "Invalid token signature"),
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::WrongKind { expected, found } => write!(
                f,
                "Wrong token kind: expected {}, found {}",
                expected.as_str(),
                found.as_str()
            ),
            TokenError::Claims(e) => write!(f, "Invalid token claims: {}", e),
            TokenError::EmptySubject => write!(f, "Token subject is empty"),
        }
    }
}

impl std::error::Error for TokenError {}
