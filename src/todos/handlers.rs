use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::ApiResult,
    response::{ApiResponse, Paginated},
    state::AppState,
    todos::{
        dto::{CreateTodoRequest, ListParams, TodoResponse, UpdateTodoRequest},
        services::TodoService,
    },
};

pub fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
}

#[instrument(skip(state, params))]
async fn list_todos(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ApiResponse<Paginated<TodoResponse>>>> {
    let todos = TodoService::from_ref(&state);
    let page = todos.list(user_id, &params).await?;
    let page = Paginated {
        items: page.items.into_iter().map(TodoResponse::from).collect(),
        page: page.page,
        per_page: page.per_page,
        total: page.total,
        total_pages: page.total_pages,
    };
    Ok(Json(ApiResponse::ok(page)))
}

#[instrument(skip(state, payload))]
async fn create_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateTodoRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TodoResponse>>)> {
    let todos = TodoService::from_ref(&state);
    let todo = todos.create(user_id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(TodoResponse::from(todo))),
    ))
}

#[instrument(skip(state))]
async fn get_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<TodoResponse>>> {
    let todos = TodoService::from_ref(&state);
    let todo = todos.get(user_id, id).await?;
    Ok(Json(ApiResponse::ok(TodoResponse::from(todo))))
}

#[instrument(skip(state, payload))]
async fn update_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTodoRequest>,
) -> ApiResult<Json<ApiResponse<TodoResponse>>> {
    let todos = TodoService::from_ref(&state);
    let todo = todos.update(user_id, id, payload).await?;
    Ok(Json(ApiResponse::ok(TodoResponse::from(todo))))
}

#[instrument(skip(state))]
async fn delete_todo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let todos = TodoService::from_ref(&state);
    todos.soft_delete(user_id, id).await?;
    Ok(Json(ApiResponse::ok_empty()))
}
