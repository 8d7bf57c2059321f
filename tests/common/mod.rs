// Common test utilities for integration tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};

use credence::config::{EmailValidationSettings, JwtSettings, SecuritySettings};
use credence::mail::validation::EmailValidationService;
use credence::mail::{MailDispatcher, MailError};
use credence::services::{AuthService, LockoutService, TokenService, UserService};
use credence::stores::RbacStore;

/// Bcrypt minimum cost keeps the flow tests fast.
pub const TEST_BCRYPT_COST: u32 = 4;

/// Creates an in-memory database with migrations applied and the role
/// catalog seeded, matching what the bootstrap binary does to a real one.
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    RbacStore::new()
        .seed_defaults(&db, chrono::Utc::now().timestamp())
        .await
        .expect("Failed to seed role catalog");

    db
}

/// Mail dispatcher that keeps the latest token of each kind so flows can
/// redeem them, plus the addresses that received lock notices.
#[derive(Default)]
pub struct CapturingMailer {
    verification_token: Mutex<Option<String>>,
    reset_token: Mutex<Option<String>>,
    locked_notices: Mutex<Vec<String>>,
}

impl CapturingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn verification_token(&self) -> Option<String> {
        self.verification_token
            .lock()
            .expect("mailer mutex poisoned")
            .clone()
    }

    pub fn reset_token(&self) -> Option<String> {
        self.reset_token.lock().expect("mailer mutex poisoned").clone()
    }

    /// Email addresses that received an account-locked notice, in order.
    pub fn locked_notices(&self) -> Vec<String> {
        self.locked_notices
            .lock()
            .expect("mailer mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl MailDispatcher for CapturingMailer {
    async fn send_verification_email(&self, _email: &str, token: &str) -> Result<(), MailError> {
        *self.verification_token.lock().expect("mailer mutex poisoned") = Some(token.to_owned());
        Ok(())
    }

    async fn send_password_reset_email(&self, _email: &str, token: &str) -> Result<(), MailError> {
        *self.reset_token.lock().expect("mailer mutex poisoned") = Some(token.to_owned());
        Ok(())
    }

    async fn send_account_locked_email(
        &self,
        email: &str,
        _username: &str,
        _duration_minutes: i64,
        _ip: &str,
    ) -> Result<(), MailError> {
        self.locked_notices
            .lock()
            .expect("mailer mutex poisoned")
            .push(email.to_owned());
        Ok(())
    }
}

/// The full service stack wired together the way an embedding application
/// would assemble it.
pub struct TestBackend {
    pub db: DatabaseConnection,
    pub users: UserService,
    pub auth: Arc<AuthService>,
    pub lockout: Arc<LockoutService>,
    pub tokens: Arc<TokenService>,
    pub mailer: Arc<CapturingMailer>,
}

pub fn test_settings() -> SecuritySettings {
    SecuritySettings {
        bcrypt_rounds: TEST_BCRYPT_COST,
        ..SecuritySettings::default()
    }
}

pub async fn setup_backend() -> TestBackend {
    let db = setup_test_db().await;
    let mailer = CapturingMailer::new();
    let tokens = Arc::new(TokenService::new(&JwtSettings::default()));
    let lockout = Arc::new(LockoutService::new(
        db.clone(),
        test_settings(),
        mailer.clone(),
    ));
    let auth = Arc::new(AuthService::new(
        db.clone(),
        test_settings(),
        tokens.clone(),
        lockout.clone(),
        mailer.clone(),
    ));
    let users = UserService::new(
        db.clone(),
        test_settings(),
        auth.clone(),
        EmailValidationService::new(&EmailValidationSettings::default()),
    );

    TestBackend {
        db,
        users,
        auth,
        lockout,
        tokens,
        mailer,
    }
}

/// Grants a seeded role directly through the store, the way bootstrap
/// provisioning creates the first administrator.
pub async fn grant_role(db: &DatabaseConnection, user_id: &str, role_name: &str) {
    let store = RbacStore::new();
    let role = store
        .find_role_by_name(db, role_name)
        .await
        .expect("Failed to look up role")
        .expect("Role not seeded");
    store
        .assign_role(db, user_id, &role.id)
        .await
        .expect("Failed to assign role");
}
