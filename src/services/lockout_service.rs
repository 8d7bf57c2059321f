use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};

use crate::config::SecuritySettings;
use crate::errors::AuthError;
use crate::mail::MailDispatcher;
use crate::stores::{AttemptStore, UserStore};
use crate::types::db::login_attempt;
use crate::types::internal::lockout::LockoutStatus;

const DEFAULT_HISTORY_LIMIT: u64 = 10;

/// Failed-login bookkeeping and the lock state machine.
///
/// Accounts move Active -> Locked when the failure counter reaches the
/// configured maximum, and back to Active on successful login, explicit
/// unlock, or lazily once `locked_until` passes.
///
/// For an unknown user id every path reports "not locked, full attempts
/// remaining" instead of an error, so login cannot be used to probe which
/// accounts exist.
pub struct LockoutService {
    db: DatabaseConnection,
    settings: SecuritySettings,
    mailer: Arc<dyn MailDispatcher>,
    user_store: UserStore,
    attempt_store: AttemptStore,
}

impl LockoutService {
    pub fn new(
        db: DatabaseConnection,
        settings: SecuritySettings,
        mailer: Arc<dyn MailDispatcher>,
    ) -> Self {
        Self {
            db,
            settings,
            mailer,
            user_store: UserStore::new(),
            attempt_store: AttemptStore::new(),
        }
    }

    /// Records a failed attempt and locks the account when the counter
    /// reaches the maximum.
    ///
    /// Attempt row, counter increment, and the possible lock transition are
    /// one transaction; the increment happens in the database so two
    /// concurrent failures cannot both read the same count and skip the
    /// lock. The locked-account mail goes out after commit and its failure
    /// is logged, never propagated.
    pub async fn record_failed_attempt(
        &self,
        user_id: &str,
        ip_address: &str,
    ) -> Result<LockoutStatus, AuthError> {
        let now = Utc::now().timestamp();

        let txn = self.db.begin().await.map_err(AuthError::txn_begin)?;

        let user = match self.user_store.find_by_id(&txn, user_id).await? {
            Some(user) => user,
            None => return Ok(LockoutStatus::clear(self.settings.max_login_attempts)),
        };

        self.attempt_store
            .record(&txn, user_id, ip_address, false, now)
            .await?;
        self.user_store
            .increment_failed_attempts(&txn, user_id, now)
            .await?;

        // Re-read inside the transaction to observe the serialized count
        let updated = match self.user_store.find_by_id(&txn, user_id).await? {
            Some(user) => user,
            None => return Ok(LockoutStatus::clear(self.settings.max_login_attempts)),
        };

        if updated.failed_login_attempts >= self.settings.max_login_attempts {
            let locked_until = now + self.settings.lockout_duration_minutes * 60;
            self.user_store
                .apply_lock(&txn, user_id, locked_until, now)
                .await?;
            txn.commit().await.map_err(AuthError::txn_commit)?;

            tracing::warn!(
                user_id = user_id,
                locked_until = locked_until,
                "Account locked after repeated failed logins"
            );
            if let Err(e) = self
                .mailer
                .send_account_locked_email(
                    &user.email,
                    &user.username,
                    self.settings.lockout_duration_minutes,
                    ip_address,
                )
                .await
            {
                tracing::error!("Failed to send account locked email: {}", e);
            }

            return Ok(LockoutStatus {
                is_locked: true,
                remaining_attempts: 0,
                locked_until: Some(locked_until),
            });
        }

        txn.commit().await.map_err(AuthError::txn_commit)?;

        let remaining =
            (self.settings.max_login_attempts - updated.failed_login_attempts).max(0);
        Ok(LockoutStatus {
            is_locked: false,
            remaining_attempts: remaining,
            locked_until: None,
        })
    }

    /// Records a successful attempt and resets the failure counter and lock
    /// flags in the same transaction.
    pub async fn record_successful_attempt(
        &self,
        user_id: &str,
        ip_address: &str,
    ) -> Result<(), AuthError> {
        let now = Utc::now().timestamp();

        let txn = self.db.begin().await.map_err(AuthError::txn_begin)?;
        self.attempt_store
            .record(&txn, user_id, ip_address, true, now)
            .await?;
        self.user_store.clear_lockout(&txn, user_id, now).await?;
        txn.commit().await.map_err(AuthError::txn_commit)?;

        Ok(())
    }

    /// Reports the account's lock state.
    ///
    /// A lock whose `locked_until` has passed is cleared here, lazily, and
    /// reported as unlocked; otherwise the call has no side effects.
    pub async fn check_account_status(&self, user_id: &str) -> Result<LockoutStatus, AuthError> {
        let user = match self.user_store.find_by_id(&self.db, user_id).await? {
            Some(user) => user,
            None => return Ok(LockoutStatus::clear(self.settings.max_login_attempts)),
        };

        if user.is_locked {
            if let Some(locked_until) = user.locked_until {
                if Utc::now().timestamp() > locked_until {
                    self.unlock_account(user_id).await?;
                    return Ok(LockoutStatus::clear(self.settings.max_login_attempts));
                }

                return Ok(LockoutStatus {
                    is_locked: true,
                    remaining_attempts: 0,
                    locked_until: Some(locked_until),
                });
            }
        }

        let remaining =
            (self.settings.max_login_attempts - user.failed_login_attempts).max(0);
        Ok(LockoutStatus {
            is_locked: false,
            remaining_attempts: remaining,
            locked_until: None,
        })
    }

    /// Clears the lock and failure counter. Idempotent; used by expiry-driven
    /// unlock and by administrative unlock.
    pub async fn unlock_account(&self, user_id: &str) -> Result<(), AuthError> {
        self.user_store
            .clear_lockout(&self.db, user_id, Utc::now().timestamp())
            .await?;
        tracing::info!(user_id = user_id, "Account unlocked");
        Ok(())
    }

    /// Recent login attempts, newest first. `None` limit means the default
    /// of ten entries.
    pub async fn login_history(
        &self,
        user_id: &str,
        limit: Option<u64>,
    ) -> Result<Vec<login_attempt::Model>, AuthError> {
        self.attempt_store
            .history(&self.db, user_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await
    }
}
