use thiserror::Error;

/// Infrastructure-level database failures, tagged with the operation that hit them.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {operation} failed: {source}")]
    Operation {
        operation: String,
        #[source]
        source: sea_orm::DbErr,
    },

    #[error("Starting transaction failed: {source}")]
    TransactionBegin {
        #[source]
        source: sea_orm::DbErr,
    },

    #[error("Committing transaction failed: {source}")]
    TransactionCommit {
        #[source]
        source: sea_orm::DbErr,
    },
}

/// Service-facing error taxonomy for authentication, token, and RBAC flows.
///
/// Every variant is a stable kind callers can match on. Enumeration-sensitive
/// failures (unknown email vs. wrong password) are merged into
/// `InvalidCredentials` before they leave the service layer.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email address is not verified")]
    EmailNotVerified,

    /// Account is temporarily locked. `locked_until` is a unix timestamp;
    /// callers derive the remaining duration from it.
    #[error("Account is locked until {locked_until}")]
    AccountLocked { locked_until: i64 },

    /// Covers refresh, email-verification, and password-reset tokens that are
    /// unknown, already consumed/revoked, or past their expiry.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    /// Infrastructure faults with no caller-actionable cause, such as a
    /// token signing failure.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl AuthError {
    pub fn database(operation: &str, source: sea_orm::DbErr) -> Self {
        AuthError::Database(DatabaseError::Operation {
            operation: operation.to_string(),
            source,
        })
    }

    pub fn txn_begin(source: sea_orm::DbErr) -> Self {
        AuthError::Database(DatabaseError::TransactionBegin { source })
    }

    pub fn txn_commit(source: sea_orm::DbErr) -> Self {
        AuthError::Database(DatabaseError::TransactionCommit { source })
    }

    pub fn user_not_found(id: &str) -> Self {
        AuthError::NotFound(format!("User {}", id))
    }

    pub fn role_not_found(name: &str) -> Self {
        AuthError::NotFound(format!("Role {}", name))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AuthError::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AuthError::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AuthError::Validation(message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        AuthError::Internal(message.into())
    }
}
