//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/auth/login - Start a session (sets both session cookies)
//! - POST /api/auth/register - Participant registration
//! - GET /api/auth/check-email - Whether an email is already registered
//! - POST /api/auth/logout - End the session
//! - GET /api/auth/me - Current user and its capabilities
//!
//! The first three are public; the session gate guards the rest.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::ApiResponse;
use crate::api::gate::ClientIp;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{AuthenticatedSession, User};
use crate::services::{capabilities, Capability, RegisterInput};

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for participant registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckEmailQuery {
    #[serde(default)]
    pub email: String,
}

/// Response for user info
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct MePayload {
    pub user: UserResponse,
    pub capabilities: Vec<Capability>,
}

#[derive(Debug, Serialize)]
pub struct EmailExistsPayload {
    pub exists: bool,
}

#[derive(Debug, Serialize)]
pub struct MessagePayload {
    pub message: String,
}

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/check-email", get(check_email))
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

/// POST /api/auth/login
///
/// Issues a fresh credential and pins it to the caller's address.
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .account_service
        .login(&body.email, &body.password)
        .await?;

    let token = state
        .tokens
        .issue(&user.subject_id(), user.role)
        .map_err(|e| {
            tracing::error!("Failed to issue credential: {}", e);
            ApiError::internal_error("Gagal membuat sesi")
        })?;

    let mut headers = HeaderMap::new();
    state.cookies.write_session(&mut headers, &token, &ip);

    tracing::info!(user_id = user.id, role = %user.role, client_ip = %ip, "User logged in");

    Ok((headers, Json(ApiResponse::ok(UserPayload { user: user.into() }))))
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .account_service
        .register(RegisterInput::new(body.name, body.email, body.password))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserPayload { user: user.into() })),
    ))
}

/// GET /api/auth/check-email?email=
async fn check_email(
    State(state): State<AppState>,
    Query(query): Query<CheckEmailQuery>,
) -> Result<Json<ApiResponse<EmailExistsPayload>>, ApiError> {
    if query.email.trim().is_empty() {
        return Err(ApiError::validation_error("Email wajib diisi"));
    }
    let exists = state.account_service.email_exists(&query.email).await?;
    Ok(Json(ApiResponse::ok(EmailExistsPayload { exists })))
}

/// POST /api/auth/logout
///
/// The credential itself stays valid until it expires; only the cookies go.
async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<AuthenticatedSession>,
) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    state.cookies.clear_session(&mut headers);

    tracing::info!(subject = session.subject_id(), "User logged out");

    (
        headers,
        Json(ApiResponse::ok(MessagePayload {
            message: "Berhasil logout".to_string(),
        })),
    )
}

/// GET /api/auth/me
async fn get_current_user(
    State(state): State<AppState>,
    Extension(session): Extension<AuthenticatedSession>,
) -> Result<Json<ApiResponse<MePayload>>, ApiError> {
    let id: i64 = session
        .subject_id()
        .parse()
        .map_err(|_| ApiError::unauthorized("Sesi tidak valid"))?;

    let user = state
        .account_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Pengguna tidak ditemukan"))?;

    Ok(Json(ApiResponse::ok(MePayload {
        user: user.into(),
        capabilities: capabilities(session.role()),
    })))
}
