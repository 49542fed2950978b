//! User registration, password login and bearer token verification.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{DbPool, User};

use super::error::{is_unique_violation, ServiceError, ServiceResult, ValidationErrors};

lazy_static! {
    /// Deliberately loose: something@something.tld without whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_NAME_LEN: usize = 100;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(name: &str, email: &str, password: &str) -> ServiceResult<()> {
    let mut errors = ValidationErrors::new();

    let name = name.trim();
    if name.is_empty() {
        errors.add("name", "Name is required");
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.add(
            "name",
            format!("Name is too long (max {} characters)", MAX_NAME_LEN),
        );
    }

    if !EMAIL_REGEX.is_match(email) {
        errors.add("email", "Invalid email address");
    }

    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        );
    } else if len > MAX_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at most {} characters", MAX_PASSWORD_LEN),
        );
    }

    errors.finish()
}

/// JWT claims carried by every bearer token
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User ID
    sub: String,
    iat: i64,
    exp: i64,
}

/// A freshly issued bearer token and the user it identifies
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub user: User,
}

#[derive(Clone)]
pub struct IdentityService {
    db: DbPool,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: chrono::Duration,
}

impl IdentityService {
    pub fn new(db: DbPool, secret: &str, token_ttl: chrono::Duration) -> Self {
        Self {
            db,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl,
        }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> ServiceResult<User> {
        let email = normalize_email(email);
        validate_registration(name, &email, password)?;

        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::DuplicateEmail);
        }

        let password_hash = hash_password(password)
            .map_err(|e| ServiceError::Internal(format!("Failed to hash password: {}", e)))?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email,
            password_hash,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| {
            // Lost a race with a concurrent registration
            if is_unique_violation(&e) {
                ServiceError::DuplicateEmail
            } else {
                ServiceError::Persistence(e)
            }
        })?;

        info!(user_id = %user.id, "Registered user {}", user.email);
        Ok(user)
    }

    /// Check credentials and issue a bearer token
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<IssuedToken> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.db)
            .await?;

        let user = user.ok_or(ServiceError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            debug!(user_id = %user.id, "Password mismatch");
            return Err(ServiceError::InvalidCredentials);
        }

        let token = self.issue_token(&user.id)?;
        Ok(IssuedToken { token, user })
    }

    fn issue_token(&self, user_id: &str) -> ServiceResult<String> {
        let now = chrono::Utc::now();
        let expires_at = now
            .checked_add_signed(self.token_ttl)
            .ok_or_else(|| ServiceError::Internal("Token lifetime out of range".to_string()))?;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Resolve a bearer token to the user ID it was issued for
    pub fn verify_token(&self, token: &str) -> ServiceResult<String> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!("Rejected token: {}", e);
                ServiceError::InvalidToken
            })?;
        Ok(data.claims.sub)
    }

    pub async fn get_user(&self, user_id: &str) -> ServiceResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }
}
