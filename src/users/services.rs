use axum::extract::FromRef;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{
        repo::User,
        services::is_valid_username,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Profile operations for the authenticated user.
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.db.clone())
    }
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get(&self, user_id: Uuid) -> ApiResult<User> {
        User::find_by_id(&self.db, user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User not found".into()))
    }

    pub async fn update_username(&self, user_id: Uuid, username: &str) -> ApiResult<User> {
        if !is_valid_username(username) {
            return Err(ApiError::Validation(
                "Username must be 3-30 characters of letters, digits, or underscores".into(),
            ));
        }

        // Taken by a different live user?
        if let Some(existing) = User::find_by_username(&self.db, username).await? {
            if existing.id != user_id {
                return Err(ApiError::Conflict("Username already taken".into()));
            }
        }

        let user = User::update_username(&self.db, user_id, username)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
        info!(user_id = %user.id, "username updated");
        Ok(user)
    }

    pub async fn soft_delete(&self, user_id: Uuid) -> ApiResult<()> {
        if !User::soft_delete(&self.db, user_id).await? {
            return Err(ApiError::Unauthorized("User not found".into()));
        }
        info!(user_id = %user_id, "user account deleted");
        Ok(())
    }
}
