//! Session gate
//!
//! Runs in front of every route. For each request it:
//! 1. lets public paths through untouched,
//! 2. authenticates the request (cookie, then bearer),
//! 3. pins cookie sessions to the client IP seen at login,
//! 4. slides cookie sessions forward on success.
//!
//! Rejections never reach a handler. API paths get a JSON 401, every other
//! path is redirected to the login page, and both session cookies are
//! cleared either way.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, Extensions, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use super::credentials::{authenticate, AuthFailure};
use super::middleware::AppState;
use crate::models::{AuthenticatedSession, CredentialSource};
use crate::services::IP_COOKIE;

/// Paths reachable without a session, matched by prefix. The site root is
/// handled separately as an exact match, and uploaded files are public
/// under the configured `upload.public_prefix`.
pub const PUBLIC_PREFIXES: &[&str] = &[
    "/login",
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/check-email",
    "/api/public/",
    "/articles",
    "/doctors",
    "/health-programs",
    "/health-info",
    "/mental-health",
    "/bmi-calculator",
    "/hubungi-kami",
];

pub fn is_public_path(path: &str, uploads_prefix: &str) -> bool {
    path == "/"
        || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        || path
            .strip_prefix(uploads_prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// JSON endpoints, which must never be redirected
pub fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// the socket peer, then `"unknown"`. Header values that do not parse as
/// an IP address are skipped.
pub fn client_ip(request: &Request) -> String {
    resolve_client_ip(request.headers(), request.extensions())
}

fn resolve_client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    forwarded_ip(headers)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Extractor for the client address, for handlers on public paths that
/// the gate does not annotate.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(resolve_client_ip(&parts.headers, &parts.extensions)))
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .and_then(parse_ip)
        .or_else(|| header_str(headers, "x-real-ip").and_then(parse_ip))
}

fn parse_ip(value: &str) -> Option<String> {
    value.trim().parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// What to write back after an admitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Renewal {
    /// Bearer credentials carry no cookie state
    Stateless,
    /// No IP binding yet; pin the current address
    BindIp,
    /// Reissue the credential and both cookies
    Slide,
}

struct Admission {
    session: AuthenticatedSession,
    renewal: Renewal,
}

/// Session gate middleware
pub async fn session_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if is_public_path(&path, state.uploads.public_prefix()) {
        return next.run(request).await;
    }

    let ip = client_ip(&request);
    let admission = match admit(&state, request.headers(), &ip) {
        Ok(admission) => admission,
        Err(failure) => {
            match &failure {
                AuthFailure::IpMismatch => {}
                AuthFailure::Missing => tracing::debug!(%path, "No credential presented"),
                AuthFailure::Invalid(e) => tracing::debug!(%path, error = %e, "Credential rejected"),
            }
            return reject(&state, &path, &failure);
        }
    };

    let session = admission.session.clone();
    request.extensions_mut().insert(admission.session);
    let mut response = next.run(request).await;

    // A handler that wrote session cookies itself (logout) has the last word.
    if response.headers().contains_key(header::SET_COOKIE) {
        return response;
    }
    renew(&state, &session, admission.renewal, response.headers_mut());
    response
}

fn admit(state: &AppState, headers: &HeaderMap, ip: &str) -> Result<Admission, AuthFailure> {
    let (credential, source) = authenticate(headers, &state.tokens, &state.cookies)?;

    let renewal = match source {
        CredentialSource::Bearer => Renewal::Stateless,
        CredentialSource::Cookie => match state.cookies.get(headers, IP_COOKIE) {
            None => Renewal::BindIp,
            Some(bound) if bound == ip => Renewal::Slide,
            Some(bound) => {
                tracing::warn!(
                    subject = %credential.subject_id,
                    bound_ip = %bound,
                    client_ip = %ip,
                    "Session used from a different IP; session destroyed"
                );
                return Err(AuthFailure::IpMismatch);
            }
        },
    };

    Ok(Admission {
        session: AuthenticatedSession {
            credential,
            source,
            client_ip: ip.to_string(),
        },
        renewal,
    })
}

fn renew(state: &AppState, session: &AuthenticatedSession, renewal: Renewal, headers: &mut HeaderMap) {
    match renewal {
        Renewal::Stateless => {}
        Renewal::BindIp => state.cookies.write_binding(headers, &session.client_ip),
        Renewal::Slide => match state.tokens.issue(session.subject_id(), session.role()) {
            Ok(token) => state
                .cookies
                .write_session(headers, &token, &session.client_ip),
            Err(e) => tracing::warn!("Failed to renew session: {}", e),
        },
    }
}

#[derive(Serialize)]
struct RejectionBody {
    success: bool,
    error: String,
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

fn reject(state: &AppState, path: &str, failure: &AuthFailure) -> Response {
    let mut headers = HeaderMap::new();
    state.cookies.clear_session(&mut headers);

    if is_api_path(path) {
        let body = RejectionBody {
            success: false,
            error: failure.to_string(),
            authenticated: false,
            reason: failure.reason(),
        };
        return (StatusCode::UNAUTHORIZED, headers, Json(body)).into_response();
    }

    headers.insert(header::LOCATION, HeaderValue::from_static(login_redirect(failure)));
    (StatusCode::FOUND, headers).into_response()
}

fn login_redirect(failure: &AuthFailure) -> &'static str {
    match failure {
        AuthFailure::Missing | AuthFailure::Invalid(_) => "/login?expired=true",
        AuthFailure::IpMismatch => "/login?expired=true&reason=ip_changed",
    }
}
