// Database entities - SeaORM models
pub mod email_verification_token;
pub mod login_attempt;
pub mod password_reset_token;
pub mod permission;
pub mod refresh_token;
pub mod role;
pub mod role_permission;
pub mod user;
pub mod user_role;
