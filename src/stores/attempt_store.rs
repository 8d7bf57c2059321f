use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::errors::AuthError;
use crate::types::db::login_attempt;

/// Data access for the login attempt audit trail. Rows are insert-only.
pub struct AttemptStore {}

impl AttemptStore {
    pub fn new() -> Self {
        Self {}
    }

    pub async fn record(
        &self,
        conn: &impl ConnectionTrait,
        user_id: &str,
        ip_address: &str,
        successful: bool,
        attempted_at: i64,
    ) -> Result<login_attempt::Model, AuthError> {
        let attempt = login_attempt::ActiveModel {
            user_id: Set(user_id.to_owned()),
            ip_address: Set(ip_address.to_owned()),
            successful: Set(successful),
            attempted_at: Set(attempted_at),
            ..Default::default()
        };

        attempt
            .insert(conn)
            .await
            .map_err(|e| AuthError::database("insert_login_attempt", e))
    }

    /// Most recent attempts first. Ties on the same second break by insert
    /// order through the autoincrement id.
    pub async fn history(
        &self,
        conn: &impl ConnectionTrait,
        user_id: &str,
        limit: u64,
    ) -> Result<Vec<login_attempt::Model>, AuthError> {
        login_attempt::Entity::find()
            .filter(login_attempt::Column::UserId.eq(user_id))
            .order_by_desc(login_attempt::Column::AttemptedAt)
            .order_by_desc(login_attempt::Column::Id)
            .limit(limit)
            .all(conn)
            .await
            .map_err(|e| AuthError::database("load_login_history", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_test_user, now, setup_test_db};

    #[tokio::test]
    async fn test_record_and_history_newest_first() {
        let db = setup_test_db().await;
        let store = AttemptStore::new();
        let user = insert_test_user(&db, "alice", "alice@example.com", "password123").await;
        let base = now();

        store.record(&db, &user.id, "10.0.0.1", false, base - 20).await.unwrap();
        store.record(&db, &user.id, "10.0.0.2", false, base - 10).await.unwrap();
        store.record(&db, &user.id, "10.0.0.3", true, base).await.unwrap();

        let history = store.history(&db, &user.id, 10).await.unwrap();

        assert_eq!(history.len(), 3);
        assert_eq!(history[0].ip_address, "10.0.0.3");
        assert!(history[0].successful);
        assert_eq!(history[1].ip_address, "10.0.0.2");
        assert_eq!(history[2].ip_address, "10.0.0.1");
    }

    #[tokio::test]
    async fn test_history_honors_limit() {
        let db = setup_test_db().await;
        let store = AttemptStore::new();
        let user = insert_test_user(&db, "bob", "bob@example.com", "password123").await;
        let base = now();

        for i in 0..5 {
            store.record(&db, &user.id, "10.0.0.1", false, base + i).await.unwrap();
        }

        let history = store.history(&db, &user.id, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].attempted_at, base + 4);
        assert_eq!(history[1].attempted_at, base + 3);
    }

    #[tokio::test]
    async fn test_history_scoped_to_user() {
        let db = setup_test_db().await;
        let store = AttemptStore::new();
        let alice = insert_test_user(&db, "alice", "alice@example.com", "password123").await;
        let bob = insert_test_user(&db, "bob", "bob@example.com", "password123").await;

        store.record(&db, &alice.id, "10.0.0.1", true, now()).await.unwrap();

        let history = store.history(&db, &bob.id, 10).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_same_second_ties_break_by_insert_order() {
        let db = setup_test_db().await;
        let store = AttemptStore::new();
        let user = insert_test_user(&db, "carol", "carol@example.com", "password123").await;
        let ts = now();

        store.record(&db, &user.id, "first", false, ts).await.unwrap();
        store.record(&db, &user.id, "second", false, ts).await.unwrap();

        let history = store.history(&db, &user.id, 10).await.unwrap();
        assert_eq!(history[0].ip_address, "second");
        assert_eq!(history[1].ip_address, "first");
    }
}
