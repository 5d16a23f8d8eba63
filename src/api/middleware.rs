//! API middleware
//!
//! Contains:
//! - Application state shared by every handler
//! - `ApiError`, the JSON error body used by handlers
//! - Authorization (role checking) for admin routes
//!
//! Authentication itself happens in the session gate (`api::gate`), which
//! attaches an `AuthenticatedSession` to every request it lets through.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::SqlxUserRepository;
use crate::db::DynDatabasePool;
use crate::models::{AuthenticatedSession, Role};
use crate::services::{
    has_role, AccountError, AccountService, SessionCookies, TokenCodec, UploadError, UploadStore,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub account_service: Arc<AccountService>,
    pub tokens: Arc<TokenCodec>,
    pub cookies: Arc<SessionCookies>,
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    /// Wire services from configuration. The codec is passed in so the
    /// caller decides where the signing secret comes from.
    pub fn new(pool: DynDatabasePool, config: &Config, tokens: TokenCodec) -> Self {
        let cookies = SessionCookies::new(config.server.secure_cookies(), tokens.ttl_seconds());
        Self {
            account_service: Arc::new(AccountService::new(SqlxUserRepository::boxed(
                pool.clone(),
            ))),
            pool,
            tokens: Arc::new(tokens),
            cookies: Arc::new(cookies),
            uploads: Arc::new(UploadStore::new(config.upload.clone())),
        }
    }
}

/// Error response for API errors: `{success: false, error}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ApiErrorBody<'a> {
    success: bool,
    error: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            success: false,
            error: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(msg) => ApiError::validation_error(msg),
            AccountError::EmailTaken => ApiError::conflict("Email sudah terdaftar"),
            AccountError::InvalidCredentials => {
                ApiError::unauthorized("Email atau password salah")
            }
            AccountError::Internal(e) => {
                tracing::error!("Account operation failed: {:#}", e);
                ApiError::internal_error("Terjadi kesalahan pada server")
            }
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        let status = match &err {
            UploadError::Unauthorized => StatusCode::UNAUTHORIZED,
            UploadError::Io(e) => {
                tracing::error!("Upload write failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            UploadError::MissingFile
            | UploadError::InvalidKind(_)
            | UploadError::UnsupportedType(_)
            | UploadError::TooLarge { .. }
            | UploadError::Read(_) => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, err.to_string())
    }
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let session = request
        .extensions()
        .get::<AuthenticatedSession>()
        .ok_or_else(|| ApiError::unauthorized("Sesi tidak ditemukan. Silakan login kembali."))?;

    if !has_role(session.role(), Role::Admin) {
        tracing::debug!(
            subject = session.subject_id(),
            role = %session.role(),
            "Admin route refused"
        );
        return Err(ApiError::forbidden("Akses ditolak. Hanya untuk admin."));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_api_error_body() {
        let response = ApiError::conflict("Email sudah terdaftar").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Email sudah terdaftar");
    }

    #[test]
    fn test_upload_error_status_mapping() {
        let cases = [
            (UploadError::Unauthorized, StatusCode::UNAUTHORIZED),
            (UploadError::MissingFile, StatusCode::BAD_REQUEST),
            (
                UploadError::UnsupportedType("image/gif".into()),
                StatusCode::BAD_REQUEST,
            ),
            (UploadError::TooLarge { limit: 1 }, StatusCode::BAD_REQUEST),
            (
                UploadError::Io(std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_account_error_status_mapping() {
        assert_eq!(
            ApiError::from(AccountError::Validation("x".into())).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AccountError::EmailTaken).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(AccountError::InvalidCredentials).status,
            StatusCode::UNAUTHORIZED
        );
        let internal = ApiError::from(AccountError::Internal(anyhow::anyhow!("db down")));
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!internal.message.contains("db down"));
    }
}
