use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::todos::repo::{DueFilter, Priority, SortBy, SortOrder, Todo, TodoStatus};

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<Priority>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<Priority>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct TodoResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub priority: Priority,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Todo> for TodoResponse {
    fn from(todo: Todo) -> Self {
        Self {
            id: todo.id,
            user_id: todo.user_id,
            title: todo.title,
            description: todo.description,
            status: todo.status,
            priority: todo.priority,
            due_date: todo.due_date,
            tags: todo.tags.0,
            created_at: todo.created_at,
            updated_at: todo.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    pub status: Option<TodoStatus>,
    pub priority: Option<Priority>,
    pub due: Option<DueFilter>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_apply_defaults() {
        let params: ListParams = serde_json::from_value(serde_json::json!({})).expect("parse");
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 20);
        assert_eq!(params.sort_by, SortBy::CreatedAt);
        assert_eq!(params.sort_order, SortOrder::Desc);
        assert!(params.status.is_none());
        assert!(params.due.is_none());
    }

    #[test]
    fn create_request_accepts_minimal_body() {
        let req: CreateTodoRequest =
            serde_json::from_value(serde_json::json!({"title": "Buy milk"})).expect("parse");
        assert_eq!(req.title, "Buy milk");
        assert!(req.status.is_none());
        assert!(req.tags.is_empty());
        assert!(req.due_date.is_none());
    }

    #[test]
    fn create_request_parses_rfc3339_due_date() {
        let req: CreateTodoRequest = serde_json::from_value(serde_json::json!({
            "title": "Dentist",
            "due_date": "2026-09-01T09:00:00Z",
            "priority": "high"
        }))
        .expect("parse");
        assert!(req.due_date.is_some());
        assert_eq!(req.priority, Some(Priority::High));
    }
}
