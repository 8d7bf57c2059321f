use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::errors::AuthError;
use crate::types::db::{permission, role, user};

/// Data access for user rows, their lockout columns, and their flattened
/// role/permission view.
///
/// Methods take any [`ConnectionTrait`] so services can run them inside a
/// transaction or straight on the pool.
pub struct UserStore {}

impl UserStore {
    pub fn new() -> Self {
        Self {}
    }

    pub async fn find_by_id(
        &self,
        conn: &impl ConnectionTrait,
        id: &str,
    ) -> Result<Option<user::Model>, AuthError> {
        user::Entity::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AuthError::database("find_user_by_id", e))
    }

    pub async fn find_by_email(
        &self,
        conn: &impl ConnectionTrait,
        email: &str,
    ) -> Result<Option<user::Model>, AuthError> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(conn)
            .await
            .map_err(|e| AuthError::database("find_user_by_email", e))
    }

    pub async fn find_by_username(
        &self,
        conn: &impl ConnectionTrait,
        username: &str,
    ) -> Result<Option<user::Model>, AuthError> {
        user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(conn)
            .await
            .map_err(|e| AuthError::database("find_user_by_username", e))
    }

    pub async fn find_all(
        &self,
        conn: &impl ConnectionTrait,
    ) -> Result<Vec<user::Model>, AuthError> {
        user::Entity::find()
            .order_by_asc(user::Column::CreatedAt)
            .order_by_asc(user::Column::Id)
            .all(conn)
            .await
            .map_err(|e| AuthError::database("find_all_users", e))
    }

    pub async fn insert_user(
        &self,
        conn: &impl ConnectionTrait,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        now: i64,
    ) -> Result<user::Model, AuthError> {
        let new_user = user::ActiveModel {
            id: Set(id.to_owned()),
            username: Set(username.to_owned()),
            email: Set(email.to_owned()),
            password_hash: Set(password_hash.to_owned()),
            is_email_verified: Set(false),
            email_verified_at: Set(None),
            failed_login_attempts: Set(0),
            is_locked: Set(false),
            locked_until: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        new_user.insert(conn).await.map_err(|e| {
            // Unique constraint violations surface as conflicts; the service
            // layer pre-checks, this covers the race between check and insert
            if is_unique_violation(&e) {
                AuthError::conflict("Username or email already in use")
            } else {
                AuthError::database("insert_user", e)
            }
        })
    }

    /// Applies the given profile fields, leaving `None` fields untouched.
    /// `password_hash` must already be hashed by the caller.
    pub async fn update_profile(
        &self,
        conn: &impl ConnectionTrait,
        user: user::Model,
        username: Option<String>,
        email: Option<String>,
        password_hash: Option<String>,
        now: i64,
    ) -> Result<user::Model, AuthError> {
        let mut active: user::ActiveModel = user.into();
        if let Some(username) = username {
            active.username = Set(username);
        }
        if let Some(email) = email {
            active.email = Set(email);
        }
        if let Some(password_hash) = password_hash {
            active.password_hash = Set(password_hash);
        }
        active.updated_at = Set(now);

        active.update(conn).await.map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::conflict("Username or email already in use")
            } else {
                AuthError::database("update_user_profile", e)
            }
        })
    }

    pub async fn set_password_hash(
        &self,
        conn: &impl ConnectionTrait,
        user: user::Model,
        password_hash: &str,
        now: i64,
    ) -> Result<user::Model, AuthError> {
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(password_hash.to_owned());
        active.updated_at = Set(now);

        active
            .update(conn)
            .await
            .map_err(|e| AuthError::database("set_password_hash", e))
    }

    pub async fn mark_email_verified(
        &self,
        conn: &impl ConnectionTrait,
        user: user::Model,
        now: i64,
    ) -> Result<user::Model, AuthError> {
        let mut active: user::ActiveModel = user.into();
        active.is_email_verified = Set(true);
        active.email_verified_at = Set(Some(now));
        active.updated_at = Set(now);

        active
            .update(conn)
            .await
            .map_err(|e| AuthError::database("mark_email_verified", e))
    }

    /// Deletes the user row. Tokens, attempts, and role assignments go with
    /// it through the foreign key cascades.
    pub async fn delete_user(
        &self,
        conn: &impl ConnectionTrait,
        user: user::Model,
    ) -> Result<(), AuthError> {
        user.delete(conn)
            .await
            .map_err(|e| AuthError::database("delete_user", e))?;
        Ok(())
    }

    pub async fn load_roles(
        &self,
        conn: &impl ConnectionTrait,
        user: &user::Model,
    ) -> Result<Vec<role::Model>, AuthError> {
        user.find_related(role::Entity)
            .order_by_asc(role::Column::Name)
            .all(conn)
            .await
            .map_err(|e| AuthError::database("load_user_roles", e))
    }

    /// Role names plus the union of their permission names.
    ///
    /// Permissions are flattened across roles and deduplicated in first-seen
    /// order, so overlapping bundles never repeat a name.
    pub async fn load_access(
        &self,
        conn: &impl ConnectionTrait,
        user: &user::Model,
    ) -> Result<(Vec<String>, Vec<String>), AuthError> {
        let roles = self.load_roles(conn, user).await?;

        let mut permissions: Vec<String> = Vec::new();
        for role_model in &roles {
            let perms = role_model
                .find_related(permission::Entity)
                .order_by_asc(permission::Column::Name)
                .all(conn)
                .await
                .map_err(|e| AuthError::database("load_role_permissions", e))?;
            for perm in perms {
                if !permissions.contains(&perm.name) {
                    permissions.push(perm.name);
                }
            }
        }

        let role_names = roles.into_iter().map(|r| r.name).collect();
        Ok((role_names, permissions))
    }

    /// Bumps the failure counter in the database so concurrent failures
    /// serialize on the row instead of overwriting each other.
    pub async fn increment_failed_attempts(
        &self,
        conn: &impl ConnectionTrait,
        user_id: &str,
        now: i64,
    ) -> Result<(), AuthError> {
        user::Entity::update_many()
            .col_expr(
                user::Column::FailedLoginAttempts,
                Expr::col(user::Column::FailedLoginAttempts).add(1),
            )
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .filter(user::Column::Id.eq(user_id))
            .exec(conn)
            .await
            .map_err(|e| AuthError::database("increment_failed_attempts", e))?;
        Ok(())
    }

    pub async fn apply_lock(
        &self,
        conn: &impl ConnectionTrait,
        user_id: &str,
        locked_until: i64,
        now: i64,
    ) -> Result<(), AuthError> {
        user::Entity::update_many()
            .set(user::ActiveModel {
                is_locked: Set(true),
                locked_until: Set(Some(locked_until)),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(user::Column::Id.eq(user_id))
            .exec(conn)
            .await
            .map_err(|e| AuthError::database("apply_lock", e))?;
        Ok(())
    }

    /// Resets the failure counter and clears any lock. Used on successful
    /// login and on expiry-driven unlock, so it is idempotent.
    pub async fn clear_lockout(
        &self,
        conn: &impl ConnectionTrait,
        user_id: &str,
        now: i64,
    ) -> Result<(), AuthError> {
        user::Entity::update_many()
            .set(user::ActiveModel {
                failed_login_attempts: Set(0),
                is_locked: Set(false),
                locked_until: Set(None),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(user::Column::Id.eq(user_id))
            .exec(conn)
            .await
            .map_err(|e| AuthError::database("clear_lockout", e))?;
        Ok(())
    }
}

fn is_unique_violation(e: &sea_orm::DbErr) -> bool {
    let message = e.to_string();
    message.contains("UNIQUE") || message.contains("duplicate key")
}
