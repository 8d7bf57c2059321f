use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};

use crate::errors::AuthError;
use crate::types::db::{email_verification_token, password_reset_token};

/// Data access for the two single-use token tables: email verification and
/// password reset.
///
/// Consumption flips `is_used` with a conditional update, so two racing
/// consumers cannot both succeed on the same token.
pub struct OneTimeTokenStore {}

impl OneTimeTokenStore {
    pub fn new() -> Self {
        Self {}
    }

    pub async fn insert_verification(
        &self,
        conn: &impl ConnectionTrait,
        token: &str,
        user_id: &str,
        expires_at: i64,
        created_at: i64,
    ) -> Result<(), AuthError> {
        let record = email_verification_token::ActiveModel {
            token: Set(token.to_owned()),
            user_id: Set(user_id.to_owned()),
            is_used: Set(false),
            expires_at: Set(expires_at),
            created_at: Set(created_at),
        };

        record
            .insert(conn)
            .await
            .map_err(|e| AuthError::database("insert_verification_token", e))?;
        Ok(())
    }

    pub async fn find_unused_verification(
        &self,
        conn: &impl ConnectionTrait,
        token: &str,
    ) -> Result<Option<email_verification_token::Model>, AuthError> {
        email_verification_token::Entity::find()
            .filter(email_verification_token::Column::Token.eq(token))
            .filter(email_verification_token::Column::IsUsed.eq(false))
            .one(conn)
            .await
            .map_err(|e| AuthError::database("find_verification_token", e))
    }

    /// Marks a verification token used. Returns whether this call consumed
    /// it; `false` means it was unknown or already used.
    pub async fn consume_verification(
        &self,
        conn: &impl ConnectionTrait,
        token: &str,
    ) -> Result<bool, AuthError> {
        let result = email_verification_token::Entity::update_many()
            .set(email_verification_token::ActiveModel {
                is_used: Set(true),
                ..Default::default()
            })
            .filter(email_verification_token::Column::Token.eq(token))
            .filter(email_verification_token::Column::IsUsed.eq(false))
            .exec(conn)
            .await
            .map_err(|e| AuthError::database("consume_verification_token", e))?;

        Ok(result.rows_affected == 1)
    }

    pub async fn insert_reset(
        &self,
        conn: &impl ConnectionTrait,
        token: &str,
        user_id: &str,
        expires_at: i64,
        created_at: i64,
    ) -> Result<(), AuthError> {
        let record = password_reset_token::ActiveModel {
            token: Set(token.to_owned()),
            user_id: Set(user_id.to_owned()),
            is_used: Set(false),
            expires_at: Set(expires_at),
            created_at: Set(created_at),
        };

        record
            .insert(conn)
            .await
            .map_err(|e| AuthError::database("insert_reset_token", e))?;
        Ok(())
    }

    pub async fn find_unused_reset(
        &self,
        conn: &impl ConnectionTrait,
        token: &str,
    ) -> Result<Option<password_reset_token::Model>, AuthError> {
        password_reset_token::Entity::find()
            .filter(password_reset_token::Column::Token.eq(token))
            .filter(password_reset_token::Column::IsUsed.eq(false))
            .one(conn)
            .await
            .map_err(|e| AuthError::database("find_reset_token", e))
    }

    /// Marks a reset token used. Returns whether this call consumed it.
    pub async fn consume_reset(
        &self,
        conn: &impl ConnectionTrait,
        token: &str,
    ) -> Result<bool, AuthError> {
        let result = password_reset_token::Entity::update_many()
            .set(password_reset_token::ActiveModel {
                is_used: Set(true),
                ..Default::default()
            })
            .filter(password_reset_token::Column::Token.eq(token))
            .filter(password_reset_token::Column::IsUsed.eq(false))
            .exec(conn)
            .await
            .map_err(|e| AuthError::database("consume_reset_token", e))?;

        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_test_user, now, setup_test_db};

    #[tokio::test]
    async fn test_verification_token_roundtrip() {
        let db = setup_test_db().await;
        let store = OneTimeTokenStore::new();
        let user = insert_test_user(&db, "alice", "alice@example.com", "password123").await;
        let ts = now();

        store
            .insert_verification(&db, "verify-1", &user.id, ts + 3600, ts)
            .await
            .unwrap();

        let found = store.find_unused_verification(&db, "verify-1").await.unwrap();
        assert_eq!(found.map(|t| t.user_id), Some(user.id));

        let missing = store.find_unused_verification(&db, "verify-2").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_consume_verification_is_single_use() {
        let db = setup_test_db().await;
        let store = OneTimeTokenStore::new();
        let user = insert_test_user(&db, "bob", "bob@example.com", "password123").await;
        let ts = now();

        store
            .insert_verification(&db, "verify-1", &user.id, ts + 3600, ts)
            .await
            .unwrap();

        assert!(store.consume_verification(&db, "verify-1").await.unwrap());
        assert!(!store.consume_verification(&db, "verify-1").await.unwrap());

        // Consumed tokens no longer show up as unused
        let found = store.find_unused_verification(&db, "verify-1").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_consume_unknown_verification_returns_false() {
        let db = setup_test_db().await;
        let store = OneTimeTokenStore::new();

        assert!(!store.consume_verification(&db, "no-such-token").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_token_roundtrip_and_consume() {
        let db = setup_test_db().await;
        let store = OneTimeTokenStore::new();
        let user = insert_test_user(&db, "carol", "carol@example.com", "password123").await;
        let ts = now();

        store.insert_reset(&db, "reset-1", &user.id, ts + 1200, ts).await.unwrap();

        let found = store.find_unused_reset(&db, "reset-1").await.unwrap();
        assert_eq!(found.map(|t| t.user_id), Some(user.id.clone()));

        assert!(store.consume_reset(&db, "reset-1").await.unwrap());
        assert!(!store.consume_reset(&db, "reset-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_verification_and_reset_tables_are_distinct() {
        let db = setup_test_db().await;
        let store = OneTimeTokenStore::new();
        let user = insert_test_user(&db, "dave", "dave@example.com", "password123").await;
        let ts = now();

        store
            .insert_verification(&db, "same-token", &user.id, ts + 3600, ts)
            .await
            .unwrap();

        // A verification token must not be consumable as a reset token
        assert!(store.find_unused_reset(&db, "same-token").await.unwrap().is_none());
        assert!(!store.consume_reset(&db, "same-token").await.unwrap());
        assert!(store.consume_verification(&db, "same-token").await.unwrap());
    }
}
