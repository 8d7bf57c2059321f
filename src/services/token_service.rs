use std::fmt;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::ConnectionTrait;
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::errors::AuthError;
use crate::services::crypto;
use crate::stores::RefreshTokenStore;
use crate::types::internal::auth::{Claims, Principal, RefreshClaims, TokenPair};

const FALLBACK_EXPIRATION_SECS: i64 = 900;

/// Parses a duration string of the form `<number><unit>` with unit `s`, `m`,
/// `h`, or `d`.
///
/// An unrecognized unit or unparsable number falls back to 900 seconds
/// (15 minutes); callers rely on that exact fallback.
pub fn parse_expiration_secs(expiration: &str) -> i64 {
    let unit = match expiration.chars().last() {
        Some(c) => c,
        None => return FALLBACK_EXPIRATION_SECS,
    };
    let value_part = &expiration[..expiration.len() - unit.len_utf8()];
    let value: i64 = match value_part.parse() {
        Ok(v) => v,
        Err(_) => return FALLBACK_EXPIRATION_SECS,
    };

    match unit {
        's' => value,
        'm' => value * 60,
        'h' => value * 60 * 60,
        'd' => value * 60 * 60 * 24,
        _ => FALLBACK_EXPIRATION_SECS,
    }
}

/// Issues and verifies the two JWT kinds.
///
/// Access tokens are stateless and verified by signature only. Refresh tokens
/// are additionally persisted as an HMAC hash so they can be revoked; the raw
/// token never touches the database.
pub struct TokenService {
    access_secret: String,
    refresh_secret: String,
    access_expiration_secs: i64,
    refresh_expiration_secs: i64,
    refresh_token_store: RefreshTokenStore,
}

impl TokenService {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            access_secret: settings.access_secret.clone(),
            refresh_secret: settings.refresh_secret.clone(),
            access_expiration_secs: parse_expiration_secs(&settings.access_expiration),
            refresh_expiration_secs: parse_expiration_secs(&settings.refresh_expiration),
            refresh_token_store: RefreshTokenStore::new(),
        }
    }

    /// Signs a fresh access/refresh pair for the principal and persists the
    /// refresh token's hash.
    ///
    /// Runs on whatever connection the caller passes, so login and rotation
    /// can fold the persistence into their own transactions.
    pub async fn issue(
        &self,
        conn: &impl ConnectionTrait,
        principal: &Principal,
    ) -> Result<TokenPair, AuthError> {
        let now = Utc::now().timestamp();

        let claims = Claims {
            sub: principal.id.clone(),
            email: principal.email.clone(),
            username: principal.username.clone(),
            roles: principal.roles.clone(),
            permissions: principal.permissions.clone(),
            exp: now + self.access_expiration_secs,
            iat: now,
        };
        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.access_secret.as_bytes()),
        )
        .map_err(|e| AuthError::internal_error(format!("Failed to sign access token: {}", e)))?;

        // The jti keeps two refresh tokens minted in the same second from
        // colliding at rest
        let refresh_claims = RefreshClaims {
            sub: principal.id.clone(),
            jti: Uuid::new_v4().to_string(),
            exp: now + self.refresh_expiration_secs,
            iat: now,
        };
        let refresh_token = encode(
            &Header::new(Algorithm::HS256),
            &refresh_claims,
            &EncodingKey::from_secret(self.refresh_secret.as_bytes()),
        )
        .map_err(|e| AuthError::internal_error(format!("Failed to sign refresh token: {}", e)))?;

        let refresh_hash = self.hash_refresh_token(&refresh_token);
        self.refresh_token_store
            .insert(
                conn,
                &refresh_hash,
                &principal.id,
                now + self.refresh_expiration_secs,
                now,
            )
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_expiration_secs,
            token_type: "Bearer".to_string(),
        })
    }

    /// Verifies an access token's signature and expiry.
    pub fn decode_access(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.access_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(token_data.claims)
    }

    /// Verifies a refresh token's signature and expiry. Revocation state
    /// lives in the store and is checked separately during rotation.
    pub fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        let token_data = decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(self.refresh_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(token_data.claims)
    }

    /// Hashes a refresh token for storage and lookup.
    pub fn hash_refresh_token(&self, token: &str) -> String {
        crypto::hmac_sha256_token(&self.refresh_secret, token)
    }

    pub fn access_expiration_secs(&self) -> i64 {
        self.access_expiration_secs
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_expiration_secs", &self.access_expiration_secs)
            .field("refresh_expiration_secs", &self.refresh_expiration_secs)
            .finish()
    }
}

impl fmt::Display for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TokenService {{ access_expiration: {}s, refresh_expiration: {}s }}",
            self.access_expiration_secs, self.refresh_expiration_secs
        )
    }
}
