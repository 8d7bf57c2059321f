//! Field-level input checks shared by registration, profile updates, and the
//! password flows.

use crate::errors::AuthError;
use crate::mail::validation::format_is_valid;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 8;

pub fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if len < USERNAME_MIN_LEN || len > USERNAME_MAX_LEN {
        return Err(AuthError::validation(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if !format_is_valid(email) {
        return Err(AuthError::validation("Invalid email format"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AuthError::validation(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }
    Ok(())
}
