//! The success/data/message/status envelope every caller-facing operation
//! returns, plus pagination metadata.

use serde::{Deserialize, Serialize};

use crate::TallymartError;

/// Caller-facing response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub status_code: u16,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            status_code: 200,
        }
    }

    #[must_use]
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            status_code,
        }
    }

    /// Fold a core result into the envelope.
    pub fn from_result(result: crate::Result<T>, message: &str) -> Self {
        match result {
            Ok(data) => Self::ok_with_message(data, message),
            Err(err) => Self::from(err),
        }
    }
}

impl<T> From<TallymartError> for ApiResponse<T> {
    fn from(err: TallymartError) -> Self {
        Self::failure(err.to_string(), err.status_code())
    }
}

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Slice a fully ordered result set. `page` is 1-based; zero is treated
    /// as the first page, `limit` is clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn from_sorted(items: Vec<T>, page: usize, limit: usize) -> Self {
        let limit = limit.clamp(1, crate::constants::MAX_PAGE_LIMIT);
        let page = page.max(1);
        let total = items.len();
        let items = items
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();
        Self {
            items,
            pagination: Pagination {
                page,
                limit,
                total,
                pages: total.div_ceil(limit),
            },
        }
    }
}
