use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};

use crate::errors::AuthError;
use crate::types::db::refresh_token;

/// Data access for stored refresh tokens. Only the HMAC hash of a token is
/// ever written; the raw token exists solely in the response to the client.
pub struct RefreshTokenStore {}

impl RefreshTokenStore {
    pub fn new() -> Self {
        Self {}
    }

    pub async fn insert(
        &self,
        conn: &impl ConnectionTrait,
        token_hash: &str,
        user_id: &str,
        expires_at: i64,
        created_at: i64,
    ) -> Result<(), AuthError> {
        let new_token = refresh_token::ActiveModel {
            token_hash: Set(token_hash.to_owned()),
            user_id: Set(user_id.to_owned()),
            is_revoked: Set(false),
            expires_at: Set(expires_at),
            created_at: Set(created_at),
        };

        new_token
            .insert(conn)
            .await
            .map_err(|e| AuthError::database("insert_refresh_token", e))?;
        Ok(())
    }

    /// Finds a stored token that is neither revoked nor expired.
    pub async fn find_active(
        &self,
        conn: &impl ConnectionTrait,
        token_hash: &str,
        now: i64,
    ) -> Result<Option<refresh_token::Model>, AuthError> {
        refresh_token::Entity::find()
            .filter(refresh_token::Column::TokenHash.eq(token_hash))
            .filter(refresh_token::Column::IsRevoked.eq(false))
            .filter(refresh_token::Column::ExpiresAt.gt(now))
            .one(conn)
            .await
            .map_err(|e| AuthError::database("find_active_refresh_token", e))
    }

    /// Flips `is_revoked` on a not-yet-revoked row.
    ///
    /// Returns whether this call did the flip. A `false` return means the
    /// token was already revoked, which rotation treats as a replay.
    pub async fn revoke(
        &self,
        conn: &impl ConnectionTrait,
        token_hash: &str,
    ) -> Result<bool, AuthError> {
        let result = refresh_token::Entity::update_many()
            .set(refresh_token::ActiveModel {
                is_revoked: Set(true),
                ..Default::default()
            })
            .filter(refresh_token::Column::TokenHash.eq(token_hash))
            .filter(refresh_token::Column::IsRevoked.eq(false))
            .exec(conn)
            .await
            .map_err(|e| AuthError::database("revoke_refresh_token", e))?;

        Ok(result.rows_affected == 1)
    }
}
