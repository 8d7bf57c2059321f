use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::errors::AuthError;
use crate::types::db::{permission, role, role_permission, user_role};
use crate::types::internal::rbac::{PERMISSION_CATALOG, ROLE_BUNDLES};

/// Data access for roles, permissions, and role assignments.
pub struct RbacStore {}

impl RbacStore {
    pub fn new() -> Self {
        Self {}
    }

    /// Seeds the default permission catalog and role bundles.
    ///
    /// Safe to run on every startup: names that already exist are left
    /// untouched, including their permission links.
    pub async fn seed_defaults(
        &self,
        conn: &impl ConnectionTrait,
        now: i64,
    ) -> Result<(), AuthError> {
        for (name, description) in PERMISSION_CATALOG {
            let existing = self.find_permission_by_name(conn, name).await?;
            if existing.is_none() {
                permission::ActiveModel {
                    id: Set(Uuid::new_v4().to_string()),
                    name: Set((*name).to_string()),
                    description: Set(Some((*description).to_string())),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(conn)
                .await
                .map_err(|e| AuthError::database("insert_permission", e))?;
                tracing::info!(permission = *name, "Created permission");
            }
        }

        for bundle in ROLE_BUNDLES {
            if self.find_role_by_name(conn, bundle.name).await?.is_some() {
                tracing::debug!(role = bundle.name, "Role already seeded");
                continue;
            }

            let role_id = Uuid::new_v4().to_string();
            role::ActiveModel {
                id: Set(role_id.clone()),
                name: Set(bundle.name.to_string()),
                description: Set(Some(bundle.description.to_string())),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(conn)
            .await
            .map_err(|e| AuthError::database("insert_role", e))?;

            for perm_name in bundle.permissions {
                let perm = self
                    .find_permission_by_name(conn, perm_name)
                    .await?
                    .ok_or_else(|| AuthError::NotFound(format!("Permission {}", perm_name)))?;
                role_permission::ActiveModel {
                    role_id: Set(role_id.clone()),
                    permission_id: Set(perm.id),
                }
                .insert(conn)
                .await
                .map_err(|e| AuthError::database("insert_role_permission", e))?;
            }
            tracing::info!(
                role = bundle.name,
                permissions = bundle.permissions.len(),
                "Created role"
            );
        }

        Ok(())
    }

    pub async fn find_role_by_name(
        &self,
        conn: &impl ConnectionTrait,
        name: &str,
    ) -> Result<Option<role::Model>, AuthError> {
        role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .one(conn)
            .await
            .map_err(|e| AuthError::database("find_role_by_name", e))
    }

    pub async fn find_permission_by_name(
        &self,
        conn: &impl ConnectionTrait,
        name: &str,
    ) -> Result<Option<permission::Model>, AuthError> {
        permission::Entity::find()
            .filter(permission::Column::Name.eq(name))
            .one(conn)
            .await
            .map_err(|e| AuthError::database("find_permission_by_name", e))
    }

    pub async fn user_has_role(
        &self,
        conn: &impl ConnectionTrait,
        user_id: &str,
        role_id: &str,
    ) -> Result<bool, AuthError> {
        let existing = user_role::Entity::find_by_id((user_id.to_owned(), role_id.to_owned()))
            .one(conn)
            .await
            .map_err(|e| AuthError::database("find_user_role", e))?;
        Ok(existing.is_some())
    }

    pub async fn assign_role(
        &self,
        conn: &impl ConnectionTrait,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), AuthError> {
        user_role::ActiveModel {
            user_id: Set(user_id.to_owned()),
            role_id: Set(role_id.to_owned()),
        }
        .insert(conn)
        .await
        .map_err(|e| {
            // Composite primary key turns a repeat grant into a conflict
            if e.to_string().contains("UNIQUE") || e.to_string().contains("duplicate key") {
                AuthError::conflict("User already has this role")
            } else {
                AuthError::database("insert_user_role", e)
            }
        })?;
        Ok(())
    }
}
