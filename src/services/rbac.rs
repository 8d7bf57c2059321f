//! Pure RBAC decisions. No I/O; callers pass the flattened role and
//! permission names they already loaded.

use crate::errors::AuthError;
use crate::types::internal::rbac::{roles, PRIVILEGED_ROLES};

/// Passes when the granted set intersects the required set. An empty
/// required set always passes.
pub fn check_permissions(granted: &[String], required: &[&str]) -> Result<(), AuthError> {
    if required.is_empty() {
        return Ok(());
    }
    if required.iter().any(|r| granted.iter().any(|g| g == r)) {
        Ok(())
    } else {
        Err(AuthError::forbidden("Insufficient permissions"))
    }
}

/// Role-mode variant of [`check_permissions`], same OR semantics.
pub fn check_roles(granted: &[String], required: &[&str]) -> Result<(), AuthError> {
    if required.is_empty() {
        return Ok(());
    }
    if required.iter().any(|r| granted.iter().any(|g| g == r)) {
        Ok(())
    } else {
        Err(AuthError::forbidden("Insufficient role"))
    }
}

pub fn is_admin(role_names: &[String]) -> bool {
    role_names.iter().any(|r| r == roles::ADMIN)
}

/// ADMIN or MANAGER; the roles allowed to act on other users' accounts.
pub fn is_privileged(role_names: &[String]) -> bool {
    role_names
        .iter()
        .any(|r| PRIVILEGED_ROLES.contains(&r.as_str()))
}
