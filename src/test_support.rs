// Test utilities shared across unit and integration tests
// Only compiled when running tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use crate::mail::{MailDispatcher, MailError};
use crate::services::crypto;
use crate::stores::UserStore;
use crate::types::db::user;

/// Bcrypt minimum cost, fast enough for tests.
pub const TEST_BCRYPT_COST: u32 = 4;

/// Creates an in-memory database with all migrations applied.
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Inserts a user with a real bcrypt hash of `password`.
///
/// Uses the minimum bcrypt cost so tests stay fast; the hash still verifies
/// through the normal login path.
pub async fn insert_test_user(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
) -> user::Model {
    let hash = crypto::hash_password(password, TEST_BCRYPT_COST).expect("Failed to hash password");
    UserStore::new()
        .insert_user(db, &Uuid::new_v4().to_string(), username, email, &hash, now())
        .await
        .expect("Failed to insert test user")
}

/// A mail sent through a [`RecordingMailer`].
#[derive(Debug, Clone, PartialEq)]
pub enum SentMail {
    Verification {
        email: String,
        token: String,
    },
    PasswordReset {
        email: String,
        token: String,
    },
    AccountLocked {
        email: String,
        username: String,
        duration_minutes: i64,
        ip: String,
    },
}

/// Mail dispatcher that records every send for later assertions.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

#[async_trait]
impl MailDispatcher for RecordingMailer {
    async fn send_verification_email(&self, email: &str, token: &str) -> Result<(), MailError> {
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(SentMail::Verification {
                email: email.to_owned(),
                token: token.to_owned(),
            });
        Ok(())
    }

    async fn send_password_reset_email(&self, email: &str, token: &str) -> Result<(), MailError> {
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(SentMail::PasswordReset {
                email: email.to_owned(),
                token: token.to_owned(),
            });
        Ok(())
    }

    async fn send_account_locked_email(
        &self,
        email: &str,
        username: &str,
        duration_minutes: i64,
        ip: &str,
    ) -> Result<(), MailError> {
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(SentMail::AccountLocked {
                email: email.to_owned(),
                username: username.to_owned(),
                duration_minutes,
                ip: ip.to_owned(),
            });
        Ok(())
    }
}

/// Mail dispatcher that always fails, for exercising fire-and-forget paths.
pub struct FailingMailer;

#[async_trait]
impl MailDispatcher for FailingMailer {
    async fn send_verification_email(&self, _email: &str, _token: &str) -> Result<(), MailError> {
        Err(MailError::Dispatch("mailer offline".to_string()))
    }

    async fn send_password_reset_email(&self, _email: &str, _token: &str) -> Result<(), MailError> {
        Err(MailError::Dispatch("mailer offline".to_string()))
    }

    async fn send_account_locked_email(
        &self,
        _email: &str,
        _username: &str,
        _duration_minutes: i64,
        _ip: &str,
    ) -> Result<(), MailError> {
        Err(MailError::Dispatch("mailer offline".to_string()))
    }
}
