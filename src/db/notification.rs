use super::{DBClient, offset};
use crate::models::{Notification, NotificationData};
use sqlx::types::Json;
use uuid::Uuid;

/// Notification database operations trait. Every read and write is scoped to
/// the owner and skips soft-deleted rows.
pub trait NotificationExt {
    /// Store a notification; type, title and message are derived from the payload
    async fn create_notification(
        &self,
        user_id: Uuid,
        data: &NotificationData,
    ) -> Result<Notification, sqlx::Error>;

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error>;

    async fn count_notifications(&self, user_id: Uuid, unread_only: bool)
    -> Result<i64, sqlx::Error>;

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, sqlx::Error>;

    /// Returns false when the notification is not the user's or is deleted
    async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error>;

    /// Returns how many notifications changed
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, sqlx::Error>;

    async fn soft_delete(&self, notification_id: Uuid, user_id: Uuid)
    -> Result<bool, sqlx::Error>;
}

impl NotificationExt for DBClient {
    async fn create_notification(
        &self,
        user_id: Uuid,
        data: &NotificationData,
    ) -> Result<Notification, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, notification_type, title, message, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(data.notification_type())
        .bind(data.title())
        .bind(data.message())
        .bind(Json(data))
        .fetch_one(&self.pool)
        .await
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND NOT is_deleted AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset(page, limit))
        .fetch_all(&self.pool)
        .await
    }

    async fn count_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE user_id = $1 AND NOT is_deleted AND (NOT $2 OR NOT is_read)
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        self.count_notifications(user_id, true).await
    }

    async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        // matches already-read rows too, so repeating the call is not a 404
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = true, updated_at = NOW()
            WHERE user_id = $1 AND NOT is_deleted AND NOT is_read
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn soft_delete(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_deleted = true, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
