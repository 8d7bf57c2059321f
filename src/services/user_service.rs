use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use uuid::Uuid;

use crate::config::SecuritySettings;
use crate::errors::AuthError;
use crate::mail::validation::EmailValidationService;
use crate::services::auth_service::AuthService;
use crate::services::crypto;
use crate::services::rbac;
use crate::services::validation;
use crate::stores::{RbacStore, UserStore};
use crate::types::db::user;
use crate::types::internal::auth::Principal;
use crate::types::internal::rbac::{permissions, roles};
use crate::types::internal::user::{NewUser, UserProfile, UserUpdate};

/// User management service: registration, profile reads and updates,
/// deletion, and role assignment.
///
/// Every operation that acts on another account takes the caller's resolved
/// identity and enforces the role hierarchy: ADMIN may act on anyone, a
/// MANAGER on non-privileged targets and on themself, everyone else only on
/// their own account.
pub struct UserService {
    db: DatabaseConnection,
    settings: SecuritySettings,
    auth_service: Arc<AuthService>,
    email_validation: EmailValidationService,
    user_store: UserStore,
    rbac_store: RbacStore,
}

impl UserService {
    pub fn new(
        db: DatabaseConnection,
        settings: SecuritySettings,
        auth_service: Arc<AuthService>,
        email_validation: EmailValidationService,
    ) -> Self {
        Self {
            db,
            settings,
            auth_service,
            email_validation,
            user_store: UserStore::new(),
            rbac_store: RbacStore::new(),
        }
    }

    /// Register a new account.
    ///
    /// Checks field validity and uniqueness, runs the configured
    /// email-quality gate, then stores the user with a hashed password and
    /// kicks off email verification. The new account starts unverified and
    /// without roles.
    ///
    /// # Arguments
    /// * `new_user` - Username, email, and plaintext password
    ///
    /// # Returns
    /// * `Result<user::Model, AuthError>` - The stored user or error
    pub async fn register(&self, new_user: NewUser) -> Result<user::Model, AuthError> {
        validation::validate_username(&new_user.username)?;
        validation::validate_email(&new_user.email)?;
        validation::validate_password(&new_user.password)?;

        if self
            .user_store
            .find_by_username(&self.db, &new_user.username)
            .await?
            .is_some()
        {
            return Err(AuthError::conflict("Username already exists"));
        }
        if self
            .user_store
            .find_by_email(&self.db, &new_user.email)
            .await?
            .is_some()
        {
            return Err(AuthError::conflict("Email already exists"));
        }

        if let Some(reason) = self.email_validation.check(&new_user.email).await {
            return Err(AuthError::validation(reason));
        }

        let now = Utc::now().timestamp();
        let hash = crypto::hash_password(&new_user.password, self.settings.bcrypt_rounds)?;
        let user = self
            .user_store
            .insert_user(
                &self.db,
                &Uuid::new_v4().to_string(),
                &new_user.username,
                &new_user.email,
                &hash,
                now,
            )
            .await?;

        self.auth_service.send_verification_email(&user.id).await?;

        Ok(user)
    }

    /// List all users with their flattened role and permission names.
    ///
    /// # Authorization
    /// Requires the READ_USERS permission.
    pub async fn find_all(&self, caller: &Principal) -> Result<Vec<UserProfile>, AuthError> {
        rbac::check_permissions(&caller.permissions, &[permissions::READ_USERS])?;

        let users = self.user_store.find_all(&self.db).await?;
        let mut profiles = Vec::with_capacity(users.len());
        for user in users {
            let (roles, permissions) = self.user_store.load_access(&self.db, &user).await?;
            profiles.push(UserProfile::from_parts(user, roles, permissions));
        }
        Ok(profiles)
    }

    /// Fetch one user's profile.
    ///
    /// Non-privileged callers may only fetch their own; the ownership check
    /// runs before the lookup so it cannot be used to probe which ids exist.
    pub async fn find_one(&self, id: &str, caller: &Principal) -> Result<UserProfile, AuthError> {
        if !rbac::is_privileged(&caller.roles) && caller.id != id {
            return Err(AuthError::forbidden("You can only view your own profile"));
        }

        let user = self
            .user_store
            .find_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AuthError::user_not_found(id))?;

        let (roles, permissions) = self.user_store.load_access(&self.db, &user).await?;
        Ok(UserProfile::from_parts(user, roles, permissions))
    }

    /// Update a user's profile.
    ///
    /// # Authorization
    /// ADMIN may update anyone. A MANAGER may update non-privileged users
    /// and themself. Everyone else may update only their own account, and
    /// only the username and email fields; a self-service update carrying
    /// any other field is rejected wholesale.
    pub async fn update(
        &self,
        id: &str,
        update: UserUpdate,
        caller: &Principal,
    ) -> Result<user::Model, AuthError> {
        if let Some(username) = &update.username {
            validation::validate_username(username)?;
        }
        if let Some(email) = &update.email {
            validation::validate_email(email)?;
        }
        if let Some(password) = &update.password {
            validation::validate_password(password)?;
        }

        if !rbac::is_privileged(&caller.roles) && caller.id != id {
            return Err(AuthError::forbidden("You can only update your own profile"));
        }

        let user = self
            .user_store
            .find_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AuthError::user_not_found(id))?;

        if rbac::is_privileged(&caller.roles) && !rbac::is_admin(&caller.roles) && caller.id != id {
            let target_roles = self.role_names(&self.db, &user).await?;
            if rbac::is_privileged(&target_roles) {
                return Err(AuthError::forbidden(
                    "Managers cannot update other managers or admins",
                ));
            }
        }

        if !rbac::is_privileged(&caller.roles) && update.password.is_some() {
            return Err(AuthError::forbidden("You can only update username and email"));
        }

        if update.is_empty() {
            return Ok(user);
        }

        // Uniqueness re-checks only when the value actually changes
        if let Some(username) = &update.username {
            if username != &user.username
                && self
                    .user_store
                    .find_by_username(&self.db, username)
                    .await?
                    .is_some()
            {
                return Err(AuthError::conflict("Username already exists"));
            }
        }
        if let Some(email) = &update.email {
            if email != &user.email
                && self.user_store.find_by_email(&self.db, email).await?.is_some()
            {
                return Err(AuthError::conflict("Email already exists"));
            }
        }

        let password_hash = match &update.password {
            Some(password) => Some(crypto::hash_password(password, self.settings.bcrypt_rounds)?),
            None => None,
        };

        self.user_store
            .update_profile(
                &self.db,
                user,
                update.username,
                update.email,
                password_hash,
                Utc::now().timestamp(),
            )
            .await
    }

    /// Delete a user. Attempts, tokens, and role assignments cascade.
    ///
    /// # Authorization
    /// ADMIN may delete anyone. A MANAGER may delete non-privileged users
    /// and themself. Everyone else may delete only their own account.
    pub async fn remove(&self, id: &str, caller: &Principal) -> Result<(), AuthError> {
        let user = self
            .user_store
            .find_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AuthError::user_not_found(id))?;

        if rbac::is_admin(&caller.roles) {
            // Admins may delete anyone
        } else if rbac::is_privileged(&caller.roles) {
            if caller.id != id {
                let target_roles = self.role_names(&self.db, &user).await?;
                if rbac::is_privileged(&target_roles) {
                    return Err(AuthError::forbidden(
                        "Managers cannot delete other managers or admins",
                    ));
                }
            }
        } else if caller.id != id {
            return Err(AuthError::forbidden("You can only delete your own account"));
        }

        self.user_store.delete_user(&self.db, user).await?;

        tracing::info!("User {} deleted by {}", id, caller.id);
        Ok(())
    }

    /// Grant a role to a user.
    ///
    /// Lookup, rule checks, and the grant run in one transaction; the
    /// composite primary key on the assignment makes a repeated grant a
    /// `Conflict` even under concurrent callers.
    ///
    /// # Authorization
    /// Follows the same hierarchy as update/delete for the target. On top of
    /// that, only ADMIN may grant the ADMIN or MANAGER roles, and a
    /// non-ADMIN caller may not assign roles to themself.
    ///
    /// # Arguments
    /// * `user_id` - Target user
    /// * `role_name` - Role to grant, by name
    /// * `caller` - The caller's resolved identity
    ///
    /// # Returns
    /// * `Result<UserProfile, AuthError>` - The target's profile after the grant
    pub async fn assign_role(
        &self,
        user_id: &str,
        role_name: &str,
        caller: &Principal,
    ) -> Result<UserProfile, AuthError> {
        let txn = self.db.begin().await.map_err(AuthError::txn_begin)?;

        let user = self
            .user_store
            .find_by_id(&txn, user_id)
            .await?
            .ok_or_else(|| AuthError::user_not_found(user_id))?;

        let role = self
            .rbac_store
            .find_role_by_name(&txn, role_name)
            .await?
            .ok_or_else(|| AuthError::role_not_found(role_name))?;

        if !rbac::is_admin(&caller.roles) {
            if rbac::is_privileged(&caller.roles) {
                if caller.id != user_id {
                    let target_roles = self.role_names(&txn, &user).await?;
                    if rbac::is_privileged(&target_roles) {
                        return Err(AuthError::forbidden(
                            "Managers cannot modify roles of other managers or admins",
                        ));
                    }
                }
            } else if caller.id != user_id {
                return Err(AuthError::forbidden("You cannot assign roles to other users"));
            }

            if role.name == roles::ADMIN || role.name == roles::MANAGER {
                return Err(AuthError::forbidden(
                    "Only administrators can assign ADMIN or MANAGER roles",
                ));
            }

            if caller.id == user_id {
                return Err(AuthError::forbidden("You cannot assign roles to yourself"));
            }
        }

        if self.rbac_store.user_has_role(&txn, &user.id, &role.id).await? {
            return Err(AuthError::conflict(format!(
                "User already has the {} role",
                role_name
            )));
        }

        self.rbac_store.assign_role(&txn, &user.id, &role.id).await?;

        let (role_list, permission_list) = self.user_store.load_access(&txn, &user).await?;

        txn.commit().await.map_err(AuthError::txn_commit)?;

        tracing::info!("Role {} assigned to user {} by {}", role_name, user_id, caller.id);

        Ok(UserProfile::from_parts(user, role_list, permission_list))
    }

    async fn role_names(
        &self,
        conn: &impl ConnectionTrait,
        user: &user::Model,
    ) -> Result<Vec<String>, AuthError> {
        let roles = self.user_store.load_roles(conn, user).await?;
        Ok(roles.into_iter().map(|role| role.name).collect())
    }
}

#[cfg(test)]
#[path = "user_service_tests.rs"]
mod user_service_tests;
