use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

/// Soft-delete predicate shared by every todo query below; deleted rows
/// are invisible to all lookups, same as for users.
const LIVE: &str = "deleted_at IS NULL";

const TODO_COLUMNS: &str =
    "id, user_id, title, description, status, priority, due_date, tags, created_at, updated_at, deleted_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "todo_status", rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    #[serde(alias = "in-progress")]
    InProgress,
    Completed,
}

impl Default for TodoStatus {
    fn default() -> Self {
        TodoStatus::Pending
    }
}

/// Declaration order doubles as sort order (the Postgres enum sorts the
/// same way).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "todo_priority", rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueFilter {
    Today,
    Upcoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    DueDate,
    Priority,
}

impl SortBy {
    fn column(self) -> &'static str {
        match self {
            SortBy::CreatedAt => "created_at",
            SortBy::DueDate => "due_date",
            SortBy::Priority => "priority",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TodoFilter {
    pub status: Option<TodoStatus>,
    pub priority: Option<Priority>,
    pub due: Option<DueFilter>,
}

/// Fields for a new todo; defaults already applied by the service.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub priority: Priority,
    pub due_date: Option<OffsetDateTime>,
    pub tags: Vec<String>,
}

/// Partial update; `None` means "leave unchanged".
#[derive(Debug, Clone, Default)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<OffsetDateTime>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub priority: Priority,
    pub due_date: Option<OffsetDateTime>,
    pub tags: Json<Vec<String>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

/// Owner + liveness predicate used by every per-row query. Existence
/// and ownership are checked in the same WHERE clause so a foreign id
/// and a missing id are indistinguishable to the caller.
fn push_scope<'a>(qb: &mut QueryBuilder<'a, Postgres>, user_id: Uuid, filter: &TodoFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    qb.push(" AND ").push(LIVE);
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ").push_bind(priority);
    }
    match filter.due {
        Some(DueFilter::Today) => {
            qb.push(
                " AND due_date >= date_trunc('day', now()) \
                 AND due_date < date_trunc('day', now()) + interval '1 day'",
            );
        }
        Some(DueFilter::Upcoming) => {
            qb.push(" AND due_date >= date_trunc('day', now()) + interval '1 day'");
        }
        None => {}
    }
}

impl Todo {
    pub async fn insert(db: &PgPool, user_id: Uuid, new: &NewTodo) -> anyhow::Result<Todo> {
        let sql = format!(
            "INSERT INTO todos (user_id, title, description, status, priority, due_date, tags)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {TODO_COLUMNS}"
        );
        let todo = sqlx::query_as::<_, Todo>(&sql)
            .bind(user_id)
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.status)
            .bind(new.priority)
            .bind(new.due_date)
            .bind(Json(&new.tags))
            .fetch_one(db)
            .await?;
        Ok(todo)
    }

    pub async fn find(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Todo>> {
        let sql = format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE id = $1 AND user_id = $2 AND {LIVE}"
        );
        let todo = sqlx::query_as::<_, Todo>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(db)
            .await?;
        Ok(todo)
    }

    pub async fn list(
        db: &PgPool,
        user_id: Uuid,
        filter: &TodoFilter,
        sort_by: SortBy,
        sort_order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Todo>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {TODO_COLUMNS} FROM todos"));
        push_scope(&mut qb, user_id, filter);
        qb.push(" ORDER BY ")
            .push(sort_by.column())
            .push(" ")
            .push(sort_order.sql());
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);

        let rows = qb.build_query_as::<Todo>().fetch_all(db).await?;
        Ok(rows)
    }

    pub async fn count(db: &PgPool, user_id: Uuid, filter: &TodoFilter) -> anyhow::Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM todos");
        push_scope(&mut qb, user_id, filter);
        let total: i64 = qb.build_query_scalar().fetch_one(db).await?;
        Ok(total)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        changes: &TodoChanges,
    ) -> anyhow::Result<Option<Todo>> {
        let sql = format!(
            "UPDATE todos SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                status = COALESCE($5, status),
                priority = COALESCE($6, priority),
                due_date = COALESCE($7, due_date),
                tags = COALESCE($8, tags),
                updated_at = now()
             WHERE id = $1 AND user_id = $2 AND {LIVE}
             RETURNING {TODO_COLUMNS}"
        );
        let todo = sqlx::query_as::<_, Todo>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(&changes.title)
            .bind(&changes.description)
            .bind(changes.status)
            .bind(changes.priority)
            .bind(changes.due_date)
            .bind(changes.tags.as_ref().map(Json))
            .fetch_optional(db)
            .await?;
        Ok(todo)
    }

    /// Returns false when nothing matched (absent, foreign, or already
    /// deleted — the caller cannot tell which).
    pub async fn soft_delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let sql = format!(
            "UPDATE todos SET deleted_at = now() WHERE id = $1 AND user_id = $2 AND {LIVE}"
        );
        let result = sqlx::query(&sql).bind(id).bind(user_id).execute(db).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_snake_and_hyphen_forms() {
        let s: TodoStatus = serde_json::from_str("\"in_progress\"").expect("parse");
        assert_eq!(s, TodoStatus::InProgress);
        let s: TodoStatus = serde_json::from_str("\"in-progress\"").expect("parse alias");
        assert_eq!(s, TodoStatus::InProgress);
        assert!(serde_json::from_str::<TodoStatus>("\"done\"").is_err());
    }

    #[test]
    fn defaults_match_policy() {
        assert_eq!(TodoStatus::default(), TodoStatus::Pending);
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(SortBy::default(), SortBy::CreatedAt);
        assert_eq!(SortOrder::default(), SortOrder::Desc);
    }

    #[test]
    fn sort_columns_are_whitelisted() {
        assert_eq!(SortBy::CreatedAt.column(), "created_at");
        assert_eq!(SortBy::DueDate.column(), "due_date");
        assert_eq!(SortBy::Priority.column(), "priority");
        assert_eq!(SortOrder::Asc.sql(), "ASC");
        assert_eq!(SortOrder::Desc.sql(), "DESC");
    }
}
