use std::time::{Duration, SystemTime, UNIX_EPOCH};

use argon2::{
    Argon2,
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
};
use axum::http::{
    HeaderMap,
    header::{AUTHORIZATION, COOKIE},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::store::OwnerId;

pub const AUTH_COOKIE: &str = "auth-token";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const MIN_SECRET_LEN: usize = 32;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Vec<u8>,
    pub token_ttl: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("not authenticated")]
    Unauthorized,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
}

/// Issues and verifies bearer tokens and password hashes.
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    // Verified against when the email is unknown, so both login paths cost one Argon2 run.
    dummy_hash: String,
}

impl AuthManager {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        let dummy_hash = hash_with_random_salt(&Uuid::new_v4().to_string())?;
        Ok(Self {
            encoding_key: EncodingKey::from_secret(&config.jwt_secret),
            decoding_key: DecodingKey::from_secret(&config.jwt_secret),
            validation,
            token_ttl: config.token_ttl,
            dummy_hash,
        })
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        hash_with_random_salt(password)
    }

    pub fn verify_password(&self, candidate: &str, stored_hash: &str) -> Result<(), AuthError> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| AuthError::Internal(format!("Invalid stored password hash: {e}")))?;
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .map_err(|err| match err {
                PasswordHashError::Password => AuthError::InvalidCredentials,
                other => AuthError::Internal(format!("Password verification failed: {other}")),
            })
    }

    /// Checks a login attempt. `stored_hash` is `None` when no account has
    /// the submitted email; the candidate is then checked against a dummy hash
    /// and the attempt is always rejected.
    pub fn verify_login(
        &self,
        candidate: &str,
        stored_hash: Option<&str>,
    ) -> Result<(), AuthError> {
        match stored_hash {
            Some(hash) => self.verify_password(candidate, hash),
            None => {
                let _ = self.verify_password(candidate, &self.dummy_hash);
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    pub fn issue_token(&self, owner: OwnerId) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| AuthError::Internal("System clock is before UNIX_EPOCH".into()))?;
        let expires = now
            .checked_add(self.token_ttl)
            .ok_or_else(|| AuthError::Internal("Token lifetime overflows the clock".into()))?;
        let claims = Claims {
            sub: owner.to_string(),
            iat: now.as_secs(),
            exp: expires.as_secs(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Resolves a token to the owner it was issued for. Every failure to
    /// parse, verify or decode the subject is reported as `Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<OwnerId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AuthError::Unauthorized)?;
        Uuid::parse_str(&data.claims.sub)
            .map(OwnerId)
            .map_err(|_| AuthError::Unauthorized)
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{AUTH_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            self.token_ttl.as_secs()
        )
    }
}

fn hash_with_random_salt(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("Failed to hash password: {e}")))
}

pub fn clear_session_cookie() -> String {
    format!("{AUTH_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// Bearer header first, then the session cookie.
pub fn credential_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        let mut parts = value.splitn(2, ' ');
        if let (Some(scheme), Some(token)) = (parts.next(), parts.next()) {
            if scheme.eq_ignore_ascii_case("Bearer") && !token.trim().is_empty() {
                return Some(token.trim());
            }
        }
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == AUTH_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

pub fn decode_secret_key(raw: &str) -> Result<Vec<u8>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("JWT secret cannot be empty".to_string());
    }

    let bytes = match BASE64.decode(trimmed) {
        Ok(bytes) if bytes.len() >= MIN_SECRET_LEN => bytes,
        _ => trimmed.as_bytes().to_vec(),
    };
    if bytes.len() < MIN_SECRET_LEN {
        return Err(format!(
            "JWT secret must be at least {MIN_SECRET_LEN} bytes (raw or base64 encoded)"
        ));
    }
    Ok(bytes)
}
