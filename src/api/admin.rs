//! Admin API endpoints
//!
//! Mounted under /api/admin behind `require_admin`.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::auth::UserResponse;
use crate::api::common::{AdminPaginationQuery, ApiResponse};
use crate::api::middleware::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new().route("/users", get(list_users))
}

/// GET /api/admin/users?page=&per_page=
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<AdminPaginationQuery>,
) -> Result<Json<ApiResponse<UserListResponse>>, ApiError> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 100);

    let (users, total) = state.account_service.list_users(page, per_page).await?;

    Ok(Json(ApiResponse::ok(UserListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        total,
        page,
        per_page,
    })))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{bearer, body_json, create_user, test_app};
    use crate::models::Role;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_admin_lists_users() {
        let app = test_app().await;
        for i in 0..3 {
            create_user(&app.state, &format!("p{}@phc.id", i), "rahasia123", Role::Participant).await;
        }
        let token = bearer(&app.state, "1", Role::Admin);

        let response = app
            .router
            .oneshot(get("/api/admin/users?page=1&per_page=2", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["data"]["total"], 3);
        assert_eq!(json["data"]["users"].as_array().unwrap().len(), 2);
        assert_eq!(json["data"]["per_page"], 2);
    }

    #[tokio::test]
    async fn test_non_admin_forbidden() {
        let app = test_app().await;
        for role in [Role::Staff, Role::Doctor, Role::Participant] {
            let token = bearer(&app.state, "9", role);
            let response = app
                .router
                .clone()
                .oneshot(get("/api/admin/users", &token))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{:?}", role);
            assert_eq!(body_json(response).await["success"], false);
        }
    }

    #[tokio::test]
    async fn test_huge_page_number_returns_empty_page() {
        let app = test_app().await;
        let token = bearer(&app.state, "1", Role::Admin);

        let response = app
            .router
            .oneshot(get(
                "/api/admin/users?page=9223372036854775807&per_page=100",
                &token,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert!(json["data"]["users"].as_array().unwrap().is_empty());
        assert_eq!(json["data"]["page"], i64::MAX);
    }
}
