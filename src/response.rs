use serde::Serialize;
use time::OffsetDateTime;

/// Uniform response envelope. Every endpoint, success or failure,
/// returns this shape.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Success with no payload (`data: null`).
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Pagination wrapper nested inside `data` on list endpoints.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = if total > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };
        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
        }
    }
}
