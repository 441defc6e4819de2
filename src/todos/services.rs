use axum::extract::FromRef;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    response::Paginated,
    state::AppState,
    todos::{
        dto::{CreateTodoRequest, ListParams, UpdateTodoRequest},
        repo::{NewTodo, Todo, TodoChanges, TodoFilter},
    },
};

const MAX_TITLE_LEN: usize = 255;
const MAX_PER_PAGE: i64 = 100;

fn validate_title(title: &str) -> ApiResult<()> {
    if title.trim().is_empty() {
        return Err(ApiError::Validation("Title must not be empty".into()));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(ApiError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

/// CRUD over user-owned todos. Every operation takes the requester's
/// id from a verified access token; a row owned by someone else is
/// reported exactly like a row that does not exist.
#[derive(Clone)]
pub struct TodoService {
    db: PgPool,
}

impl FromRef<AppState> for TodoService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.db.clone())
    }
}

impl TodoService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn not_found() -> ApiError {
        ApiError::NotFound("Todo not found".into())
    }

    pub async fn create(&self, user_id: Uuid, req: CreateTodoRequest) -> ApiResult<Todo> {
        validate_title(&req.title)?;

        let new = NewTodo {
            title: req.title,
            description: req.description,
            status: req.status.unwrap_or_default(),
            priority: req.priority.unwrap_or_default(),
            due_date: req.due_date,
            tags: req.tags,
        };
        let todo = Todo::insert(&self.db, user_id, &new).await?;
        info!(user_id = %user_id, todo_id = %todo.id, "todo created");
        Ok(todo)
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> ApiResult<Todo> {
        Todo::find(&self.db, user_id, id)
            .await?
            .ok_or_else(Self::not_found)
    }

    pub async fn list(&self, user_id: Uuid, params: &ListParams) -> ApiResult<Paginated<Todo>> {
        if params.page < 1 {
            return Err(ApiError::Validation("page must be at least 1".into()));
        }
        if params.per_page < 1 || params.per_page > MAX_PER_PAGE {
            return Err(ApiError::Validation(format!(
                "per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }

        let filter = TodoFilter {
            status: params.status,
            priority: params.priority,
            due: params.due,
        };
        let total = Todo::count(&self.db, user_id, &filter).await?;
        let offset = (params.page - 1) * params.per_page;
        let items = Todo::list(
            &self.db,
            user_id,
            &filter,
            params.sort_by,
            params.sort_order,
            params.per_page,
            offset,
        )
        .await?;

        Ok(Paginated::new(items, params.page, params.per_page, total))
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        req: UpdateTodoRequest,
    ) -> ApiResult<Todo> {
        if let Some(ref title) = req.title {
            validate_title(title)?;
        }

        let changes = TodoChanges {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
            tags: req.tags,
        };
        let todo = Todo::update(&self.db, user_id, id, &changes)
            .await?
            .ok_or_else(Self::not_found)?;
        info!(user_id = %user_id, todo_id = %todo.id, "todo updated");
        Ok(todo)
    }

    /// Deleting an already-deleted (or foreign, or absent) todo is
    /// `NotFound`; the row is excluded from lookup either way.
    pub async fn soft_delete(&self, user_id: Uuid, id: Uuid) -> ApiResult<()> {
        if !Todo::soft_delete(&self.db, user_id, id).await? {
            return Err(Self::not_found());
        }
        info!(user_id = %user_id, todo_id = %id, "todo deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_validation() {
        assert!(validate_title("Buy milk").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"a".repeat(MAX_TITLE_LEN)).is_ok());
        assert!(validate_title(&"a".repeat(MAX_TITLE_LEN + 1)).is_err());
    }
}
