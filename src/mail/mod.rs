use async_trait::async_trait;

pub mod validation;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail dispatch failed: {0}")]
    Dispatch(String),
}

/// Outbound mail collaborator.
///
/// All dispatches are fire-and-forget from the caller's point of view:
/// services log failures and never propagate them or roll back the
/// transaction that triggered the mail.
#[async_trait]
pub trait MailDispatcher: Send + Sync {
    async fn send_verification_email(&self, email: &str, token: &str) -> Result<(), MailError>;

    async fn send_password_reset_email(&self, email: &str, token: &str) -> Result<(), MailError>;

    async fn send_account_locked_email(
        &self,
        email: &str,
        username: &str,
        duration_minutes: i64,
        ip: &str,
    ) -> Result<(), MailError>;
}

/// Default dispatcher that writes mail events to the log instead of a
/// transport. Deployments plug a real transport in behind the same trait.
/// Token values are withheld from the log.
pub struct LogMailer;

#[async_trait]
impl MailDispatcher for LogMailer {
    async fn send_verification_email(&self, email: &str, _token: &str) -> Result<(), MailError> {
        tracing::info!(email = %email, "Dispatching verification email");
        Ok(())
    }

    async fn send_password_reset_email(&self, email: &str, _token: &str) -> Result<(), MailError> {
        tracing::info!(email = %email, "Dispatching password reset email");
        Ok(())
    }

    async fn send_account_locked_email(
        &self,
        email: &str,
        username: &str,
        duration_minutes: i64,
        ip: &str,
    ) -> Result<(), MailError> {
        tracing::info!(
            email = %email,
            username = %username,
            duration_minutes,
            ip = %ip,
            "Dispatching account locked email"
        );
        Ok(())
    }
}
