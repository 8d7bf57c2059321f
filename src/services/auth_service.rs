use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};

use crate::config::SecuritySettings;
use crate::errors::AuthError;
use crate::mail::MailDispatcher;
use crate::services::crypto;
use crate::services::lockout_service::LockoutService;
use crate::services::token_service::TokenService;
use crate::services::validation;
use crate::stores::{OneTimeTokenStore, RefreshTokenStore, UserStore};
use crate::types::db::user;
use crate::types::internal::auth::{Principal, TokenPair};

/// Authentication service that orchestrates login, token refresh, email
/// verification, and the password reset flows.
///
/// Unknown email addresses are indistinguishable from wrong passwords at
/// login, and from known addresses in the forgot-password and
/// resend-verification flows.
pub struct AuthService {
    db: DatabaseConnection,
    settings: SecuritySettings,
    token_service: Arc<TokenService>,
    lockout: Arc<LockoutService>,
    mailer: Arc<dyn MailDispatcher>,
    user_store: UserStore,
    refresh_tokens: RefreshTokenStore,
    one_time_tokens: OneTimeTokenStore,
}

impl AuthService {
    pub fn new(
        db: DatabaseConnection,
        settings: SecuritySettings,
        token_service: Arc<TokenService>,
        lockout: Arc<LockoutService>,
        mailer: Arc<dyn MailDispatcher>,
    ) -> Self {
        Self {
            db,
            settings,
            token_service,
            lockout,
            mailer,
            user_store: UserStore::new(),
            refresh_tokens: RefreshTokenStore::new(),
            one_time_tokens: OneTimeTokenStore::new(),
        }
    }

    /// Perform a complete login flow.
    ///
    /// Order matters: the lock check runs before password verification so an
    /// attempt against a locked account reports `AccountLocked` without
    /// touching the failure counter, and a wrong password is recorded with
    /// the lockout engine before the caller sees `InvalidCredentials`.
    ///
    /// # Arguments
    /// * `email` - Email address to authenticate
    /// * `password` - Password to verify
    /// * `ip_address` - Client IP, recorded with the login attempt
    ///
    /// # Returns
    /// * `Result<TokenPair, AuthError>` - Signed access/refresh pair or error
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip_address: &str,
    ) -> Result<TokenPair, AuthError> {
        let user = self
            .user_store
            .find_by_email(&self.db, email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let status = self.lockout.check_account_status(&user.id).await?;
        if status.is_locked {
            return Err(AuthError::AccountLocked {
                locked_until: status.locked_until.unwrap_or_default(),
            });
        }

        if !crypto::verify_password(password, &user.password_hash)? {
            self.lockout
                .record_failed_attempt(&user.id, ip_address)
                .await?;
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        self.lockout
            .record_successful_attempt(&user.id, ip_address)
            .await?;

        let principal = self.principal_for(&self.db, &user).await?;
        self.token_service.issue(&self.db, &principal).await
    }

    /// Redeem a refresh token for a fresh pair, revoking the presented one.
    ///
    /// Lookup, revocation, and issuance run in one transaction; the
    /// revocation is conditional, so of two concurrent redemptions of the
    /// same token exactly one wins and the other gets `InvalidToken`.
    ///
    /// # Arguments
    /// * `refresh_token` - The refresh token to rotate
    ///
    /// # Returns
    /// * `Result<TokenPair, AuthError>` - Replacement pair or error
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        self.token_service.decode_refresh(refresh_token)?;

        let token_hash = self.token_service.hash_refresh_token(refresh_token);
        let now = Utc::now().timestamp();

        let txn = self.db.begin().await.map_err(AuthError::txn_begin)?;

        let stored = self
            .refresh_tokens
            .find_active(&txn, &token_hash, now)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !self.refresh_tokens.revoke(&txn, &token_hash).await? {
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .user_store
            .find_by_id(&txn, &stored.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let principal = self.principal_for(&txn, &user).await?;
        let pair = self.token_service.issue(&txn, &principal).await?;

        txn.commit().await.map_err(AuthError::txn_commit)?;
        Ok(pair)
    }

    /// Issues a fresh email verification token and dispatches it.
    ///
    /// Earlier tokens stay on record; expiry and the used flag govern their
    /// validity.
    pub async fn send_verification_email(&self, user_id: &str) -> Result<(), AuthError> {
        let user = self
            .user_store
            .find_by_id(&self.db, user_id)
            .await?
            .ok_or_else(|| AuthError::user_not_found(user_id))?;

        let now = Utc::now().timestamp();
        let token = crypto::generate_token_hex(self.settings.token_bytes);
        let expires_at = now + self.settings.email_verification_hours * 3600;

        self.one_time_tokens
            .insert_verification(&self.db, &token, &user.id, expires_at, now)
            .await?;

        if let Err(e) = self.mailer.send_verification_email(&user.email, &token).await {
            tracing::error!("Failed to send verification email: {}", e);
        }

        Ok(())
    }

    /// Redeems a verification token and marks the owning user verified.
    ///
    /// Consumption and the user update commit together, and the conditional
    /// used-flag update means a token redeems at most once even under
    /// concurrent requests.
    pub async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        let now = Utc::now().timestamp();

        let txn = self.db.begin().await.map_err(AuthError::txn_begin)?;

        let record = self
            .one_time_tokens
            .find_unused_verification(&txn, token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if now > record.expires_at {
            return Err(AuthError::InvalidToken);
        }

        if !self.one_time_tokens.consume_verification(&txn, token).await? {
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .user_store
            .find_by_id(&txn, &record.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        self.user_store.mark_email_verified(&txn, user, now).await?;

        txn.commit().await.map_err(AuthError::txn_commit)?;
        Ok(())
    }

    /// Re-issues a verification token for an unverified account.
    ///
    /// An unknown email returns success without sending anything.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let user = match self.user_store.find_by_email(&self.db, email).await? {
            Some(user) => user,
            None => return Ok(()),
        };

        if user.is_email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        self.send_verification_email(&user.id).await
    }

    /// Issues a password reset token and dispatches it.
    ///
    /// An unknown email returns success without sending anything.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let user = match self.user_store.find_by_email(&self.db, email).await? {
            Some(user) => user,
            None => return Ok(()),
        };

        let now = Utc::now().timestamp();
        let token = crypto::generate_token_hex(self.settings.token_bytes);
        let expires_at = now + self.settings.password_reset_minutes * 60;

        self.one_time_tokens
            .insert_reset(&self.db, &token, &user.id, expires_at, now)
            .await?;

        if let Err(e) = self
            .mailer
            .send_password_reset_email(&user.email, &token)
            .await
        {
            tracing::error!("Failed to send password reset email: {}", e);
        }

        Ok(())
    }

    /// Redeems a reset token and replaces the user's password hash, both in
    /// one transaction.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        validation::validate_password(new_password)?;

        let now = Utc::now().timestamp();

        let txn = self.db.begin().await.map_err(AuthError::txn_begin)?;

        let record = self
            .one_time_tokens
            .find_unused_reset(&txn, token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if now > record.expires_at {
            return Err(AuthError::InvalidToken);
        }

        if !self.one_time_tokens.consume_reset(&txn, token).await? {
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .user_store
            .find_by_id(&txn, &record.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let hash = crypto::hash_password(new_password, self.settings.bcrypt_rounds)?;
        self.user_store
            .set_password_hash(&txn, user, &hash, now)
            .await?;

        txn.commit().await.map_err(AuthError::txn_commit)?;
        Ok(())
    }

    /// Replaces the password for a logged-in user after re-verifying the
    /// current one.
    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validation::validate_password(new_password)?;

        let user = self
            .user_store
            .find_by_id(&self.db, user_id)
            .await?
            .ok_or_else(|| AuthError::user_not_found(user_id))?;

        if !crypto::verify_password(old_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now().timestamp();
        let hash = crypto::hash_password(new_password, self.settings.bcrypt_rounds)?;
        self.user_store
            .set_password_hash(&self.db, user, &hash, now)
            .await?;

        Ok(())
    }

    async fn principal_for(
        &self,
        conn: &impl ConnectionTrait,
        user: &user::Model,
    ) -> Result<Principal, AuthError> {
        let (roles, permissions) = self.user_store.load_access(conn, user).await?;
        Ok(Principal {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            roles,
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtSettings;
    use crate::test_support::{
        insert_test_user, now, setup_test_db, FailingMailer, RecordingMailer, SentMail,
        TEST_BCRYPT_COST,
    };

    const IP: &str = "10.0.0.1";

    fn test_settings() -> SecuritySettings {
        SecuritySettings {
            bcrypt_rounds: TEST_BCRYPT_COST,
            ..SecuritySettings::default()
        }
    }

    fn build_service(
        db: &DatabaseConnection,
        mailer: Arc<dyn MailDispatcher>,
    ) -> (AuthService, Arc<TokenService>, Arc<LockoutService>) {
        let token_service = Arc::new(TokenService::new(&JwtSettings::default()));
        let lockout = Arc::new(LockoutService::new(
            db.clone(),
            test_settings(),
            mailer.clone(),
        ));
        let service = AuthService::new(
            db.clone(),
            test_settings(),
            token_service.clone(),
            lockout.clone(),
            mailer,
        );
        (service, token_service, lockout)
    }

    fn recording_service(
        db: &DatabaseConnection,
    ) -> (
        AuthService,
        Arc<TokenService>,
        Arc<LockoutService>,
        Arc<RecordingMailer>,
    ) {
        let mailer = RecordingMailer::new();
        let (service, tokens, lockout) = build_service(db, mailer.clone());
        (service, tokens, lockout, mailer)
    }

    async fn insert_verified_user(
        db: &DatabaseConnection,
        username: &str,
        email: &str,
        password: &str,
    ) -> user::Model {
        let user = insert_test_user(db, username, email, password).await;
        UserStore::new()
            .mark_email_verified(db, user, now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_returns_tokens_for_verified_user() {
        let db = setup_test_db().await;
        let (service, tokens, _, _) = recording_service(&db);
        let user = insert_verified_user(&db, "alice", "alice@example.com", "password123").await;

        let pair = service.login("alice@example.com", "password123", IP).await.unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        let claims = tokens.decode_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.username, "alice");
        assert!(claims.roles.is_empty());
        assert!(claims.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_login_rejects_unknown_email() {
        let db = setup_test_db().await;
        let (service, _, _, _) = recording_service(&db);

        let err = service.login("ghost@example.com", "password123", IP).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_wrong_password_records_failed_attempt() {
        let db = setup_test_db().await;
        let (service, _, lockout, _) = recording_service(&db);
        let user = insert_verified_user(&db, "bob", "bob@example.com", "password123").await;

        let err = service.login("bob@example.com", "wrong-password", IP).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let status = lockout.check_account_status(&user.id).await.unwrap();
        assert_eq!(status.remaining_attempts, 4);
    }

    #[tokio::test]
    async fn test_login_rejects_unverified_email_without_counting() {
        let db = setup_test_db().await;
        let (service, _, lockout, _) = recording_service(&db);
        let user = insert_test_user(&db, "carol", "carol@example.com", "password123").await;

        let err = service.login("carol@example.com", "password123", IP).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailNotVerified));

        // A correct password against an unverified account is not a failure
        let status = lockout.check_account_status(&user.id).await.unwrap();
        assert_eq!(status.remaining_attempts, 5);
    }

    #[tokio::test]
    async fn test_login_locks_after_max_failures_and_rejects_while_locked() {
        let db = setup_test_db().await;
        let (service, _, _, mailer) = recording_service(&db);
        let user = insert_verified_user(&db, "dave", "dave@example.com", "password123").await;

        for _ in 0..5 {
            let err = service.login("dave@example.com", "wrong", IP).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        // Even the correct password is rejected while locked, and the
        // counter stays where the lock left it
        let err = service.login("dave@example.com", "password123", IP).await.unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { .. }));

        let stored = UserStore::new().find_by_id(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 5);
        assert!(stored.is_locked);

        let locked_mails = mailer
            .sent()
            .into_iter()
            .filter(|m| matches!(m, SentMail::AccountLocked { .. }))
            .count();
        assert_eq!(locked_mails, 1);
    }

    #[tokio::test]
    async fn test_login_success_resets_failure_counter() {
        let db = setup_test_db().await;
        let (service, _, lockout, _) = recording_service(&db);
        let user = insert_verified_user(&db, "erin", "erin@example.com", "password123").await;

        for _ in 0..3 {
            let _ = service.login("erin@example.com", "wrong", IP).await;
        }
        service.login("erin@example.com", "password123", IP).await.unwrap();

        let stored = UserStore::new().find_by_id(&db, &user.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 0);

        let history = lockout.login_history(&user.id, None).await.unwrap();
        assert_eq!(history.len(), 4);
        assert!(history[0].successful);
    }

    #[tokio::test]
    async fn test_login_allowed_again_after_lock_expires() {
        let db = setup_test_db().await;
        let (service, _, _, _) = recording_service(&db);
        let user = insert_verified_user(&db, "frank", "frank@example.com", "password123").await;

        for _ in 0..5 {
            let _ = service.login("frank@example.com", "wrong", IP).await;
        }

        // Rewind the lock so it has already expired
        UserStore::new().apply_lock(&db, &user.id, now() - 10, now()).await.unwrap();

        service.login("frank@example.com", "password123", IP).await.unwrap();

        let stored = UserStore::new().find_by_id(&db, &user.id).await.unwrap().unwrap();
        assert!(!stored.is_locked);
        assert_eq!(stored.failed_login_attempts, 0);
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_replay() {
        let db = setup_test_db().await;
        let (service, tokens, _, _) = recording_service(&db);
        let user = insert_verified_user(&db, "grace", "grace@example.com", "password123").await;

        let first = service.login("grace@example.com", "password123", IP).await.unwrap();
        let second = service.refresh(&first.refresh_token).await.unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
        let claims = tokens.decode_access(&second.access_token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "grace");

        // The rotated-out token is spent
        let err = service.refresh(&first.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        // The replacement still works
        service.refresh(&second.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_rejects_garbage_and_access_tokens() {
        let db = setup_test_db().await;
        let (service, _, _, _) = recording_service(&db);
        insert_verified_user(&db, "heidi", "heidi@example.com", "password123").await;

        let err = service.refresh("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let pair = service.login("heidi@example.com", "password123", IP).await.unwrap();
        let err = service.refresh(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_refresh_fails_after_user_deleted() {
        let db = setup_test_db().await;
        let (service, _, _, _) = recording_service(&db);
        let user = insert_verified_user(&db, "ivan", "ivan@example.com", "password123").await;

        let pair = service.login("ivan@example.com", "password123", IP).await.unwrap();
        UserStore::new().delete_user(&db, user).await.unwrap();

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_send_verification_email_stores_token_and_dispatches() {
        let db = setup_test_db().await;
        let (service, _, _, mailer) = recording_service(&db);
        let user = insert_test_user(&db, "judy", "judy@example.com", "password123").await;

        let before = now();
        service.send_verification_email(&user.id).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        let token = match &sent[0] {
            SentMail::Verification { email, token } => {
                assert_eq!(email, "judy@example.com");
                token.clone()
            }
            other => panic!("expected verification mail, got {:?}", other),
        };
        // 32 random bytes, hex-encoded
        assert_eq!(token.len(), 64);

        let record = OneTimeTokenStore::new()
            .find_unused_verification(&db, &token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.user_id, user.id);
        assert!(record.expires_at >= before + 3600);
    }

    #[tokio::test]
    async fn test_send_verification_email_unknown_user() {
        let db = setup_test_db().await;
        let (service, _, _, _) = recording_service(&db);

        let err = service.send_verification_email("no-such-id").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_verify_email_marks_user_and_consumes_token() {
        let db = setup_test_db().await;
        let (service, _, _, mailer) = recording_service(&db);
        let user = insert_test_user(&db, "kate", "kate@example.com", "password123").await;

        service.send_verification_email(&user.id).await.unwrap();
        let token = match &mailer.sent()[0] {
            SentMail::Verification { token, .. } => token.clone(),
            other => panic!("expected verification mail, got {:?}", other),
        };

        service.verify_email(&token).await.unwrap();

        let stored = UserStore::new().find_by_id(&db, &user.id).await.unwrap().unwrap();
        assert!(stored.is_email_verified);
        assert!(stored.email_verified_at.is_some());

        let err = service.verify_email(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_verify_email_rejects_unknown_and_expired_tokens() {
        let db = setup_test_db().await;
        let (service, _, _, _) = recording_service(&db);
        let user = insert_test_user(&db, "liam", "liam@example.com", "password123").await;

        let err = service.verify_email("no-such-token").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        OneTimeTokenStore::new()
            .insert_verification(&db, "stale-token", &user.id, now() - 10, now() - 3700)
            .await
            .unwrap();
        let err = service.verify_email("stale-token").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        let stored = UserStore::new().find_by_id(&db, &user.id).await.unwrap().unwrap();
        assert!(!stored.is_email_verified);
    }

    #[tokio::test]
    async fn test_resend_verification_silent_for_unknown_email() {
        let db = setup_test_db().await;
        let (service, _, _, mailer) = recording_service(&db);

        service.resend_verification("ghost@example.com").await.unwrap();
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_resend_verification_rejects_verified_account() {
        let db = setup_test_db().await;
        let (service, _, _, _) = recording_service(&db);
        insert_verified_user(&db, "mia", "mia@example.com", "password123").await;

        let err = service.resend_verification("mia@example.com").await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyVerified));
    }

    #[tokio::test]
    async fn test_resend_verification_leaves_earlier_tokens_valid() {
        let db = setup_test_db().await;
        let (service, _, _, mailer) = recording_service(&db);
        let user = insert_test_user(&db, "nina", "nina@example.com", "password123").await;

        service.send_verification_email(&user.id).await.unwrap();
        service.resend_verification("nina@example.com").await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        let first_token = match &sent[0] {
            SentMail::Verification { token, .. } => token.clone(),
            other => panic!("expected verification mail, got {:?}", other),
        };

        // The superseded token still redeems until it expires
        service.verify_email(&first_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_forgot_password_silent_for_unknown_email() {
        let db = setup_test_db().await;
        let (service, _, _, mailer) = recording_service(&db);

        service.forgot_password("ghost@example.com").await.unwrap();
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_forgot_password_issues_reset_token() {
        let db = setup_test_db().await;
        let (service, _, _, mailer) = recording_service(&db);
        let user = insert_verified_user(&db, "olga", "olga@example.com", "password123").await;

        let before = now();
        service.forgot_password("olga@example.com").await.unwrap();

        let token = match &mailer.sent()[0] {
            SentMail::PasswordReset { email, token } => {
                assert_eq!(email, "olga@example.com");
                token.clone()
            }
            other => panic!("expected reset mail, got {:?}", other),
        };

        let record = OneTimeTokenStore::new()
            .find_unused_reset(&db, &token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.user_id, user.id);
        assert!(record.expires_at >= before + 20 * 60);
    }

    #[tokio::test]
    async fn test_reset_password_replaces_hash_and_consumes_token() {
        let db = setup_test_db().await;
        let (service, _, _, mailer) = recording_service(&db);
        insert_verified_user(&db, "pete", "pete@example.com", "oldpassword1").await;

        service.forgot_password("pete@example.com").await.unwrap();
        let token = match &mailer.sent()[0] {
            SentMail::PasswordReset { token, .. } => token.clone(),
            other => panic!("expected reset mail, got {:?}", other),
        };

        service.reset_password(&token, "newpassword1").await.unwrap();

        service.login("pete@example.com", "newpassword1", IP).await.unwrap();
        let err = service.login("pete@example.com", "oldpassword1", IP).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        // Single use
        let err = service.reset_password(&token, "anotherpass1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_reset_password_rejects_weak_password_before_consuming() {
        let db = setup_test_db().await;
        let (service, _, _, mailer) = recording_service(&db);
        insert_verified_user(&db, "quinn", "quinn@example.com", "password123").await;

        service.forgot_password("quinn@example.com").await.unwrap();
        let token = match &mailer.sent()[0] {
            SentMail::PasswordReset { token, .. } => token.clone(),
            other => panic!("expected reset mail, got {:?}", other),
        };

        let err = service.reset_password(&token, "tiny").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        // The token survives the rejected attempt
        service.reset_password(&token, "longenough1").await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_password_rejects_expired_token() {
        let db = setup_test_db().await;
        let (service, _, _, _) = recording_service(&db);
        let user = insert_verified_user(&db, "rita", "rita@example.com", "password123").await;

        OneTimeTokenStore::new()
            .insert_reset(&db, "stale-reset", &user.id, now() - 10, now() - 1300)
            .await
            .unwrap();

        let err = service.reset_password("stale-reset", "newpassword1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_change_password_verifies_current_password() {
        let db = setup_test_db().await;
        let (service, _, _, _) = recording_service(&db);
        let user = insert_verified_user(&db, "sam", "sam@example.com", "oldpassword1").await;

        let err = service
            .change_password(&user.id, "wrong-old", "newpassword1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        service
            .change_password(&user.id, "oldpassword1", "newpassword1")
            .await
            .unwrap();
        service.login("sam@example.com", "newpassword1", IP).await.unwrap();
    }

    #[tokio::test]
    async fn test_change_password_unknown_user_and_weak_password() {
        let db = setup_test_db().await;
        let (service, _, _, _) = recording_service(&db);
        let user = insert_verified_user(&db, "tina", "tina@example.com", "password123").await;

        let err = service
            .change_password("no-such-id", "password123", "newpassword1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));

        let err = service
            .change_password(&user.id, "password123", "tiny")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn test_verification_mail_failure_does_not_fail_caller() {
        use sea_orm::EntityTrait;

        let db = setup_test_db().await;
        let (service, _, _) = build_service(&db, Arc::new(FailingMailer));
        let user = insert_test_user(&db, "uma", "uma@example.com", "password123").await;

        service.send_verification_email(&user.id).await.unwrap();

        // The token row exists even though the mail never went out
        let rows = crate::types::db::email_verification_token::Entity::find()
            .all(&db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, user.id);
    }
}
