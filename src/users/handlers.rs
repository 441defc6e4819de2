use axum::{
    extract::{FromRef, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::ApiResult,
    response::ApiResponse,
    state::AppState,
    users::{
        dto::{UpdateUserRequest, UserResponse},
        services::UserService,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new().route(
        "/users/me",
        get(get_me).patch(update_me).delete(delete_me),
    )
}

#[instrument(skip(state))]
async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    let users = UserService::from_ref(&state);
    let user = users.get(user_id).await?;
    Ok(Json(ApiResponse::ok(UserResponse::from(user))))
}

#[instrument(skip(state, payload))]
async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    let users = UserService::from_ref(&state);
    let user = match payload.username {
        Some(ref username) => users.update_username(user_id, username).await?,
        None => users.get(user_id).await?,
    };
    Ok(Json(ApiResponse::ok(UserResponse::from(user))))
}

#[instrument(skip(state))]
async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    let users = UserService::from_ref(&state);
    users.soft_delete(user_id).await?;
    Ok(Json(ApiResponse::ok_empty()))
}
