//! API layer - HTTP handlers and routing
//!
//! It includes:
//! - The session gate in front of every route
//! - Auth API endpoints
//! - Admin API endpoints
//! - Upload API endpoints
//! - Public API endpoints
//! - Static serving of uploads and site pages

pub mod admin;
pub mod auth;
pub mod common;
pub mod credentials;
pub mod gate;
pub mod middleware;
pub mod public;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::Config;

pub use credentials::{authenticate, AuthFailure};
pub use gate::{is_api_path, is_public_path, session_gate, ClientIp};
pub use middleware::{ApiError, AppState};

/// Build the `/api` router
pub fn build_api_router(upload_body_limit: usize) -> Router<AppState> {
    // Admin routes (need admin role; the gate has already authenticated)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin));

    Router::new()
        .nest("/auth", auth::router())
        .nest("/public", public::router())
        // Oversized files must reach the per-kind size check
        .nest(
            "/upload",
            upload::router().layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .merge(admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, config: &Config) -> Router {
    let upload_body_limit = usize::try_from(config.upload.largest_ceiling().saturating_mul(2))
        .unwrap_or(usize::MAX);
    let uploads_prefix = config.upload.public_prefix.trim_end_matches('/');

    Router::new()
        .nest("/api", build_api_router(upload_body_limit))
        .nest_service(uploads_prefix, ServeDir::new(&config.upload.path))
        // Site pages
        .fallback_service(ServeDir::new(&config.server.public_dir))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            gate::session_gate,
        ))
        .layer(cors_layer(&config.server.cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS with credentials for the configured origin
fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    match origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!("Invalid CORS origin {:?}, cross-origin requests disabled: {}", origin, e);
            cors
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Role, User};
    use crate::services::{hash_password, TokenCodec};
    use axum::response::Response;
    use std::path::PathBuf;
    use tempfile::TempDir;

    pub struct TestApp {
        pub router: Router,
        pub state: AppState,
        pub config: Config,
        _dir: TempDir,
    }

    impl TestApp {
        pub fn upload_dir(&self) -> PathBuf {
            self.config.upload.path.clone()
        }
    }

    /// Full router over an in-memory database and a scratch directory
    pub async fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.upload.path = dir.path().join("uploads");
        config.server.public_dir = dir.path().join("public");
        std::fs::create_dir_all(&config.server.public_dir).unwrap();
        std::fs::write(config.server.public_dir.join("index.html"), "<h1>PHC</h1>").unwrap();
        std::fs::write(config.server.public_dir.join("dashboard.html"), "<h1>Dasbor</h1>").unwrap();

        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let state = AppState::new(pool, &config, TokenCodec::new(b"api-test-secret", 1800));
        let router = build_router(state.clone(), &config);

        TestApp {
            router,
            state,
            config,
            _dir: dir,
        }
    }

    pub fn bearer(state: &AppState, subject: &str, role: Role) -> String {
        state.tokens.issue(subject, role).unwrap()
    }

    pub async fn create_user(state: &AppState, email: &str, password: &str, role: Role) -> User {
        let repo = SqlxUserRepository::new(state.pool.clone());
        let user = User::new(
            "Pengguna Uji".to_string(),
            email.to_string(),
            hash_password(password).unwrap(),
            role,
        );
        repo.create(&user).await.unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    /// Value of `name` among `Set-Cookie` lines
    pub fn cookie_value(set_cookies: &[String], name: &str) -> Option<String> {
        set_cookies.iter().find_map(|c| {
            c.strip_prefix(&format!("{}=", name))
                .and_then(|rest| rest.split(';').next())
                .map(str::to_string)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use crate::models::Role;
    use crate::services::{IP_COOKIE, TOKEN_COOKIE};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn get(uri: &str, cookie: Option<&str>, ip: &str) -> Request<Body> {
        let mut builder = Request::builder().uri(uri).header("x-forwarded-for", ip);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_login_session_and_ip_change() {
        let app = test_app().await;
        create_user(&app.state, "admin@phc.id", "rahasia123", Role::Admin).await;

        let login = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::from(
                serde_json::json!({"email": "admin@phc.id", "password": "rahasia123"}).to_string(),
            ))
            .unwrap();
        let response = app.router.clone().oneshot(login).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookies = set_cookies(&response);
        let token = cookie_value(&cookies, TOKEN_COOKIE).unwrap();
        let ip = cookie_value(&cookies, IP_COOKIE).unwrap();
        assert_eq!(ip, "10.0.0.1");
        let cookie = format!("{}={}; {}={}", TOKEN_COOKIE, token, IP_COOKIE, ip);

        // Same address: accepted and renewed
        let me = app
            .router
            .clone()
            .oneshot(get("/api/auth/me", Some(&cookie), "10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(set_cookies(&me).len(), 2);
        let json = body_json(me).await;
        assert_eq!(json["data"]["user"]["email"], "admin@phc.id");
        let caps = json["data"]["capabilities"].as_array().unwrap();
        assert!(caps.iter().any(|c| c == "manage_users"));
        assert!(caps.iter().any(|c| c == "self_assessment"));

        // Replayed from elsewhere: rejected and cleared
        let hijack = app
            .router
            .clone()
            .oneshot(get("/api/auth/me", Some(&cookie), "172.16.0.9"))
            .await
            .unwrap();
        assert_eq!(hijack.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&hijack).iter().all(|c| c.contains("Max-Age=0")));
        assert_eq!(body_json(hijack).await["reason"], "ip_changed");

        let page = app
            .router
            .oneshot(get("/dashboard.html", Some(&cookie), "172.16.0.9"))
            .await
            .unwrap();
        assert_eq!(page.status(), StatusCode::FOUND);
        assert_eq!(
            page.headers()[header::LOCATION],
            "/login?expired=true&reason=ip_changed"
        );
    }

    #[tokio::test]
    async fn test_protected_page_served_with_session() {
        let app = test_app().await;
        let token = bearer(&app.state, "1", Role::Staff);
        let cookie = format!("{}={}; {}=10.0.0.2", TOKEN_COOKIE, token, IP_COOKIE);

        let response = app
            .router
            .oneshot(get("/dashboard.html", Some(&cookie), "10.0.0.2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_public_surface() {
        let app = test_app().await;

        let health = app
            .router
            .clone()
            .oneshot(get("/api/public/health", None, "10.0.0.3"))
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        let json = body_json(health).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "ok");

        let home = app
            .router
            .clone()
            .oneshot(get("/", Some("phc_token=expired.junk.value"), "10.0.0.3"))
            .await
            .unwrap();
        assert_eq!(home.status(), StatusCode::OK);

        std::fs::create_dir_all(app.upload_dir()).unwrap();
        std::fs::write(app.upload_dir().join("general-1-a.png"), b"png").unwrap();
        let upload = app
            .router
            .oneshot(get("/uploads/general-1-a.png", None, "10.0.0.3"))
            .await
            .unwrap();
        assert_eq!(upload.status(), StatusCode::OK);
    }
}
