//! Common API utilities and shared types

use serde::{Deserialize, Serialize};

/// Successful response envelope: `{success: true, data}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Default page number for admin APIs
pub fn default_page() -> i64 {
    1
}

/// Default page size for admin APIs
pub fn default_per_page() -> i64 {
    20
}

/// Admin pagination query parameters
#[derive(Debug, Deserialize)]
pub struct AdminPaginationQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}
