use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Soft-delete predicate shared by every user query below. Lookups must
/// never see a soft-deleted row, so the filter lives in one place
/// rather than being repeated (and eventually forgotten) per call site.
const LIVE: &str = "deleted_at IS NULL";

/// User record. The password hash never leaves this module except for
/// verification inside the auth service.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

const USER_COLUMNS: &str =
    "id, email, username, password_hash, created_at, updated_at, deleted_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND {LIVE}");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND {LIVE}");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND {LIVE}");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let sql = format!(
            "INSERT INTO users (email, username, password_hash)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(username)
            .bind(password_hash)
            .fetch_one(db)
            .await?;
        Ok(user)
    }

    pub async fn update_username(
        db: &PgPool,
        id: Uuid,
        username: &str,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET username = $2, updated_at = now()
             WHERE id = $1 AND {LIVE}
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(username)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Returns false when the user was already gone.
    pub async fn soft_delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let sql = format!("UPDATE users SET deleted_at = now() WHERE id = $1 AND {LIVE}");
        let result = sqlx::query(&sql).bind(id).execute(db).await?;
        Ok(result.rows_affected() > 0)
    }
}

/// One row per issued refresh token, keyed by jti.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    pub jti: Uuid,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub consumed_at: Option<OffsetDateTime>,
}

impl RefreshTokenRecord {
    pub async fn insert(
        db: &PgPool,
        jti: Uuid,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (jti, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Atomically claim a jti. At most one concurrent caller gets the
    /// owning user id back; everyone else sees `None`. This single
    /// UPDATE is the whole rotation race guard, so it must stay one
    /// statement (handlers may run in separate processes).
    pub async fn consume(db: &PgPool, jti: Uuid) -> anyhow::Result<Option<Uuid>> {
        let user_id: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE refresh_tokens
            SET consumed_at = now()
            WHERE jti = $1 AND consumed_at IS NULL AND expires_at > now()
            RETURNING user_id
            "#,
        )
        .bind(jti)
        .fetch_optional(db)
        .await?;
        Ok(user_id.map(|(id,)| id))
    }

    /// Delete rows past expiry; replay detection no longer needs them.
    pub async fn sweep_expired(db: &PgPool) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= now()")
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}

/// True when `err` wraps a Postgres unique constraint violation, which
/// is how a lost registration race surfaces.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}
