use super::DBClient;
use crate::models::User;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password, verified, verification_code, \
     reset_password_token, reset_password_expires, created_at, updated_at";

/// User database operations trait
pub trait UserExt {
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;

    /// Find the (unverified) user holding a verification code
    async fn get_user_by_verification_code(&self, code: &str)
    -> Result<Option<User>, sqlx::Error>;

    /// Find the user owning a reset token that has not expired at `now`
    async fn get_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Create new unverified user holding a verification code
    async fn save_user(
        &self,
        email: &str,
        password: &str,
        verification_code: &str,
    ) -> Result<User, sqlx::Error>;

    /// Mark the user holding `code` as verified and consume the code
    async fn verify_user(&self, code: &str) -> Result<Option<User>, sqlx::Error>;

    /// Store a password reset token and its expiry
    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    /// Replace the password hash and consume the reset token.
    /// Returns false when the token was already used or has expired at `now`.
    async fn reset_password(
        &self,
        user_id: Uuid,
        token: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>;
}

impl UserExt for DBClient {
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_user_by_verification_code(
        &self,
        code: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE verification_code = $1 LIMIT 1"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE reset_password_token = $1 AND reset_password_expires > $2"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
    }

    async fn save_user(
        &self,
        email: &str,
        password: &str,
        verification_code: &str,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, password, verification_code) \
             VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .bind(password)
            .bind(verification_code)
            .fetch_one(&self.pool)
            .await
    }

    async fn verify_user(&self, code: &str) -> Result<Option<User>, sqlx::Error> {
        // the subquery pins a single row if two users ever drew the same code
        let query = format!(
            "UPDATE users \
             SET verified = true, verification_code = NULL, updated_at = NOW() \
             WHERE id = (SELECT id FROM users WHERE verification_code = $1 LIMIT 1) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_password_token = $1, reset_password_expires = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reset_password(
        &self,
        user_id: Uuid,
        token: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password = $1,
                reset_password_token = NULL,
                reset_password_expires = NULL,
                updated_at = NOW()
            WHERE id = $2
              AND reset_password_token = $3
              AND reset_password_expires > $4
            "#,
        )
        .bind(password)
        .bind(user_id)
        .bind(token)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::{Pool, Postgres};

    #[sqlx::test(migrations = "./migrations")]
    async fn reset_token_is_single_use(pool: Pool<Postgres>) {
        let db = DBClient::new(pool);
        let user = db
            .save_user("reset@example.com", "old-hash", "123456")
            .await
            .unwrap();
        let now = Utc::now();
        db.set_reset_token(user.id, "reset-token", now + Duration::hours(1))
            .await
            .unwrap();

        assert!(
            db.reset_password(user.id, "reset-token", "new-hash", now)
                .await
                .unwrap()
        );
        // the same token cannot be replayed
        assert!(
            !db.reset_password(user.id, "reset-token", "other-hash", now)
                .await
                .unwrap()
        );

        let stored = db.get_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password, "new-hash");
        assert_eq!(stored.reset_password_token, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn expired_reset_token_is_refused(pool: Pool<Postgres>) {
        let db = DBClient::new(pool);
        let user = db
            .save_user("late@example.com", "old-hash", "654321")
            .await
            .unwrap();
        let now = Utc::now();
        db.set_reset_token(user.id, "stale-token", now - Duration::minutes(1))
            .await
            .unwrap();

        assert!(
            db.get_user_by_reset_token("stale-token", now)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            !db.reset_password(user.id, "stale-token", "new-hash", now)
                .await
                .unwrap()
        );
    }
}
