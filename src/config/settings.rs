use std::env;
use std::fmt;

/// JWT signing configuration. Access and refresh tokens use independent
/// secrets and independent expirations.
///
/// Expirations are duration strings (`"15m"`, `"7d"`); parsing happens in the
/// token service so its documented fallback applies in one place.
#[derive(Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_expiration: String,
    pub refresh_expiration: String,
}

impl JwtSettings {
    pub fn from_env() -> Self {
        Self {
            access_secret: env::var("JWT_ACCESS_SECRET")
                .unwrap_or_else(|_| "dev-access-secret-change-me".to_string()),
            refresh_secret: env::var("JWT_REFRESH_SECRET")
                .unwrap_or_else(|_| "dev-refresh-secret-change-me".to_string()),
            access_expiration: env::var("JWT_ACCESS_EXPIRATION")
                .unwrap_or_else(|_| "15m".to_string()),
            refresh_expiration: env::var("JWT_REFRESH_EXPIRATION")
                .unwrap_or_else(|_| "7d".to_string()),
        }
    }
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            access_secret: "dev-access-secret-change-me".to_string(),
            refresh_secret: "dev-refresh-secret-change-me".to_string(),
            access_expiration: "15m".to_string(),
            refresh_expiration: "7d".to_string(),
        }
    }
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_expiration", &self.access_expiration)
            .field("refresh_expiration", &self.refresh_expiration)
            .finish()
    }
}

/// Account-security knobs: hashing cost, one-time token sizing and lifetimes,
/// lockout thresholds.
#[derive(Debug, Clone)]
pub struct SecuritySettings {
    pub bcrypt_rounds: u32,
    pub token_bytes: usize,
    pub email_verification_hours: i64,
    pub password_reset_minutes: i64,
    pub max_login_attempts: i32,
    pub lockout_duration_minutes: i64,
}

impl SecuritySettings {
    pub fn from_env() -> Self {
        Self {
            bcrypt_rounds: env::var("BCRYPT_ROUNDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            token_bytes: env::var("TOKEN_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(32),
            email_verification_hours: env::var("EMAIL_VERIFICATION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            password_reset_minutes: env::var("PASSWORD_RESET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            max_login_attempts: env::var("MAX_LOGIN_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            lockout_duration_minutes: env::var("LOCKOUT_DURATION_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            bcrypt_rounds: 10,
            token_bytes: 32,
            email_verification_hours: 1,
            password_reset_minutes: 20,
            max_login_attempts: 5,
            lockout_duration_minutes: 30,
        }
    }
}

/// Email-quality validation toggle and provider selection.
#[derive(Debug, Clone)]
pub struct EmailValidationSettings {
    pub enabled: bool,
    pub provider: String,
}

impl EmailValidationSettings {
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("EMAIL_VALIDATION_ENABLED")
                .map(|v| matches!(v.as_str(), "true" | "1"))
                .unwrap_or(false),
            provider: env::var("EMAIL_VALIDATION_PROVIDER")
                .unwrap_or_else(|_| "basic".to_string()),
        }
    }
}

impl Default for EmailValidationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "basic".to_string(),
        }
    }
}

/// Aggregated application settings.
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub jwt: JwtSettings,
    pub security: SecuritySettings,
    pub email_validation: EmailValidationSettings,
}

impl AuthSettings {
    pub fn from_env() -> Self {
        Self {
            jwt: JwtSettings::from_env(),
            security: SecuritySettings::from_env(),
            email_validation: EmailValidationSettings::from_env(),
        }
    }
}
