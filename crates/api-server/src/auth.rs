use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ApiResponse;

#[cfg(test)]
#[path = "auth_tests.rs"]
mod auth_tests;

/// Bearer tokens embed an expiry of 60 minutes from issuance.
const TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    password_hash: String,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("A user with this email is already registered.")]
    AlreadyExists,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Credential processing failed")]
    Internal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::AlreadyExists | AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::MissingToken | AuthError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ApiResponse::failure(self.to_string()))).into_response()
    }
}

/// The credential service: account creation, password verification, and
/// signed bearer tokens. Accounts live in a process-local store keyed by
/// email; real persistence sits behind this seam.
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    users: DashMap<String, UserRecord>,
}

impl AuthService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            users: DashMap::new(),
        }
    }

    pub fn create_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AuthError> {
        if username.trim().is_empty() {
            return Err(AuthError::InvalidInput("Username must not be empty".into()));
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidInput("Invalid email address".into()));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("Password must not be empty".into()));
        }

        let password_hash =
            bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|_| AuthError::Internal)?;

        let record = UserRecord {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        };

        match self.users.entry(email.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AuthError::AlreadyExists),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record.clone());
                tracing::info!("created account for {}", record.username);
                Ok(record)
            }
        }
    }

    /// Unknown email and wrong password collapse into one invalid outcome.
    pub fn verify_credentials(&self, email: &str, password: &str) -> Result<UserRecord, AuthError> {
        let user = self
            .users
            .get(email)
            .ok_or(AuthError::InvalidCredentials)?;

        if bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
            Ok(user.clone())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    pub fn issue_token(&self, sub: &str) -> Result<String, AuthError> {
        self.issue_token_with_ttl(sub, TOKEN_TTL_MINUTES)
    }

    pub(crate) fn issue_token_with_ttl(
        &self,
        sub: &str,
        ttl_minutes: i64,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (Utc::now() + chrono::Duration::minutes(ttl_minutes)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|_| AuthError::Internal)
    }

    /// Signature and expiry check.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

/// Bearer-token middleware for the protected market-data routes. The
/// validated claims land in request extensions for downstream handlers.
pub async fn auth_middleware(
    State(state): State<crate::AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_bearer_token(&headers)?;
    let claims = state.auth.validate_token(token)?;

    tracing::debug!("authenticated request for {}", claims.sub);
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}
