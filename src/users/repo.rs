use crate::users::repo_types::User;
use sqlx::PgPool;
use uuid::Uuid;

impl User {
    /// Find a user by (normalized) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, is_admin, reset_token, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, is_admin, reset_token, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with a hashed password.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, is_admin, reset_token, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Self-service profile update; the hash is only replaced when a new
    /// password was supplied.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $1, email = $2,
                password_hash = COALESCE($3, password_hash),
                updated_at = now()
            WHERE id = $4
            RETURNING id, name, email, password_hash, is_admin, reset_token, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn admin_update(
        db: &PgPool,
        id: Uuid,
        name: &str,
        email: &str,
        is_admin: bool,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $1, email = $2, is_admin = $3, updated_at = now()
            WHERE id = $4
            RETURNING id, name, email, password_hash, is_admin, reset_token, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(is_admin)
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn delete_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn count(db: &PgPool) -> anyhow::Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await?;
        Ok(total)
    }

    pub async fn list_page(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, is_admin, reset_token, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, is_admin, reset_token, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Persist a freshly minted reset token, replacing any outstanding one.
    /// Last write wins keeps a single active token per user.
    pub async fn set_reset_token(db: &PgPool, id: Uuid, token: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET reset_token = $1, updated_at = now() WHERE id = $2")
            .bind(token)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Redeem a reset token: set the new hash and clear the token in one
    /// update, conditioned on the stored token still matching. Returns
    /// `None` when the token was already redeemed or superseded.
    pub async fn redeem_reset_token(
        db: &PgPool,
        token: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password_hash = $1, reset_token = NULL, updated_at = now()
            WHERE reset_token = $2
            RETURNING id, name, email, password_hash, is_admin, reset_token, created_at, updated_at
            "#,
        )
        .bind(password_hash)
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}
