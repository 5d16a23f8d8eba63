//! Upload API endpoints
//!
//! - POST /api/upload - General and article images
//! - POST /api/upload/settings - Site logo and hero banner
//!
//! Both take a multipart form with a `file` part and an optional `type`
//! field, and both require an admin credential.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, FromRequestParts, Multipart, State},
    http::request::Parts,
    routing::post,
    Json, Router,
};

use crate::api::common::ApiResponse;
use crate::api::credentials::presented_credentials;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Credential, Role};
use crate::services::{has_role, StoredFile, UploadError, UploadKind};

/// Build the upload router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upload_image))
        .route("/settings", post(upload_setting_image))
}

/// Admin credential taken from the first presented credential that carries
/// the admin role. Anything else is refused with 401.
#[derive(Debug, Clone)]
pub struct UploadAdmin(pub Credential);

impl FromRequestParts<AppState> for UploadAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        presented_credentials(&parts.headers, &state.tokens, &state.cookies)
            .into_iter()
            .filter_map(|(_, result)| result.ok())
            .find(|credential| has_role(credential.role, Role::Admin))
            .map(UploadAdmin)
            .ok_or_else(|| {
                tracing::warn!(path = %parts.uri.path(), "Upload refused: no admin credential");
                UploadError::Unauthorized.into()
            })
    }
}

struct FilePart {
    original_name: String,
    content_type: String,
    data: Bytes,
}

#[derive(Default)]
struct UploadForm {
    kind: Option<String>,
    file: Option<FilePart>,
}

fn read_error(e: MultipartError) -> UploadError {
    UploadError::Read(e.body_text())
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                // Only the declared type counts; the filename is never inspected.
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(read_error)?;
                form.file = Some(FilePart {
                    original_name,
                    content_type,
                    data,
                });
            }
            Some("type") => {
                form.kind = Some(field.text().await.map_err(read_error)?);
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn store(
    state: &AppState,
    admin: &Credential,
    kind: UploadKind,
    file: Option<FilePart>,
) -> Result<Json<ApiResponse<StoredFile>>, ApiError> {
    let file = file.ok_or(UploadError::MissingFile)?;

    let stored = state
        .uploads
        .store(kind, &file.original_name, &file.content_type, &file.data)
        .await
        .map_err(|e| {
            tracing::warn!(
                kind = kind.as_str(),
                content_type = %file.content_type,
                size = file.data.len(),
                "Upload rejected: {}",
                e
            );
            e
        })?;

    tracing::info!(
        subject = %admin.subject_id,
        url = %stored.url,
        size = stored.size,
        "Image uploaded"
    );
    Ok(Json(ApiResponse::ok(stored)))
}

/// POST /api/upload
async fn upload_image(
    UploadAdmin(admin): UploadAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<StoredFile>>, ApiError> {
    let form = read_form(multipart).await?;
    let raw_kind = form.kind.unwrap_or_default();
    let kind: UploadKind = raw_kind.parse()?;
    if kind.is_setting() {
        return Err(UploadError::InvalidKind(raw_kind).into());
    }

    store(&state, &admin, kind, form.file).await
}

/// POST /api/upload/settings
async fn upload_setting_image(
    UploadAdmin(admin): UploadAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<StoredFile>>, ApiError> {
    let form = read_form(multipart).await?;
    let raw_kind = form.kind.unwrap_or_default();
    let kind: UploadKind = raw_kind.parse()?;
    if !kind.is_setting() {
        return Err(UploadError::InvalidKind(raw_kind).into());
    }

    store(&state, &admin, kind, form.file).await
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{bearer, body_json, test_app};
    use crate::models::Role;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    const BOUNDARY: &str = "phc-test-boundary";
    const MB: usize = 1024 * 1024;

    struct Part<'a> {
        kind: Option<&'a str>,
        filename: &'a str,
        content_type: &'a str,
        data: Vec<u8>,
    }

    fn multipart_body(part: &Part) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(kind) = part.kind {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"type\"\r\n\r\n{}\r\n",
                    BOUNDARY, kind
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, part.filename, part.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&part.data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(uri: &str, token: &str, part: &Part) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(part)))
            .unwrap()
    }

    fn png(size: usize) -> Vec<u8> {
        vec![0x89; size]
    }

    #[tokio::test]
    async fn test_admin_uploads_general_image() {
        let app = test_app().await;
        let token = bearer(&app.state, "1", Role::Admin);
        let part = Part {
            kind: None,
            filename: "foto.png",
            content_type: "image/png",
            data: png(1024),
        };

        let response = app
            .router
            .clone()
            .oneshot(upload_request("/api/upload", &token, &part))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["originalName"], "foto.png");
        assert_eq!(json["data"]["type"], "general");
        assert_eq!(json["data"]["size"], 1024);

        let url = json["data"]["url"].as_str().unwrap();
        assert!(url.starts_with("/uploads/general-"));
        let filename = url.rsplit('/').next().unwrap();
        assert!(app.upload_dir().join(filename).exists());
    }

    #[tokio::test]
    async fn test_spoofed_extension_rejected_by_mime() {
        let app = test_app().await;
        let token = bearer(&app.state, "1", Role::Admin);
        let part = Part {
            kind: Some("article"),
            filename: "innocent.png",
            content_type: "text/html",
            data: b"<script>alert(1)</script>".to_vec(),
        };

        let response = app
            .router
            .oneshot(upload_request("/api/upload", &token, &part))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_logo_ceiling_is_two_megabytes() {
        let app = test_app().await;
        let token = bearer(&app.state, "1", Role::Admin);

        let too_big = Part {
            kind: Some("logo"),
            filename: "logo.png",
            content_type: "image/png",
            data: png(2 * MB + 1),
        };
        let response = app
            .router
            .clone()
            .oneshot(upload_request("/api/upload/settings", &token, &too_big))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("2 MB"));

        let hero = Part {
            kind: Some("hero"),
            filename: "hero.webp",
            content_type: "image/webp",
            data: png(3 * MB),
        };
        let response = app
            .router
            .oneshot(upload_request("/api/upload/settings", &token, &hero))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["data"]["url"]
            .as_str()
            .unwrap()
            .starts_with("/uploads/settings/hero-"));
    }

    #[tokio::test]
    async fn test_settings_requires_setting_kind() {
        let app = test_app().await;
        let token = bearer(&app.state, "1", Role::Admin);
        let part = Part {
            kind: None,
            filename: "x.png",
            content_type: "image/png",
            data: png(10),
        };

        let response = app
            .router
            .oneshot(upload_request("/api/upload/settings", &token, &part))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_admin_refused() {
        let app = test_app().await;
        let token = bearer(&app.state, "2", Role::Staff);
        let part = Part {
            kind: None,
            filename: "x.png",
            content_type: "image/png",
            data: png(10),
        };

        let response = app
            .router
            .oneshot(upload_request("/api/upload", &token, &part))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("admin"));
    }

    #[tokio::test]
    async fn test_anonymous_upload_stopped_at_gate() {
        let app = test_app().await;
        let part = Part {
            kind: None,
            filename: "x.png",
            content_type: "image/png",
            data: png(10),
        };
        let request = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(&part)))
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["authenticated"], false);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_file_part() {
        let app = test_app().await;
        let token = bearer(&app.state, "1", Role::Admin);
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"type\"\r\n\r\narticle\r\n--{b}--\r\n",
            b = BOUNDARY
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Tidak ada file yang diunggah"
        );
    }
}
