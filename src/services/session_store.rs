//! Cookie-backed session store
//!
//! The session lives entirely client-side in two cookies: the credential
//! (`phc_token`) and the IP it is pinned to (`session_ip`). Both share the
//! same attributes: `HttpOnly`, `SameSite=Lax`, `Path=/`, `Secure` in
//! production, and a max-age equal to the credential lifetime.
//!
//! There is no server-side session table, so a credential cannot be revoked
//! before it expires.

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{Duration, Utc};

/// Cookie holding the signed credential
pub const TOKEN_COOKIE: &str = "phc_token";
/// Cookie holding the client IP observed at login
pub const IP_COOKIE: &str = "session_ip";

/// Reads and writes the session cookies.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    secure: bool,
    max_age_seconds: i64,
}

impl SessionCookies {
    pub fn new(secure: bool, max_age_seconds: i64) -> Self {
        Self {
            secure,
            max_age_seconds,
        }
    }

    /// Value of cookie `name` in the request, if present and non-empty
    pub fn get(&self, headers: &HeaderMap, name: &str) -> Option<String> {
        read_cookie(headers, name)
    }

    /// `Set-Cookie` value storing `value` under `name` with a full lifetime
    pub fn set(&self, name: &str, value: &str) -> String {
        let expires = Utc::now() + Duration::seconds(self.max_age_seconds);
        self.render(name, value, self.max_age_seconds, &http_date(expires))
    }

    /// `Set-Cookie` value removing `name`
    pub fn delete(&self, name: &str) -> String {
        self.render(name, "", 0, "Thu, 01 Jan 1970 00:00:00 GMT")
    }

    /// Store a credential and its IP binding on a response
    pub fn write_session(&self, headers: &mut HeaderMap, token: &str, client_ip: &str) {
        append_cookie(headers, self.set(TOKEN_COOKIE, token));
        append_cookie(headers, self.set(IP_COOKIE, client_ip));
    }

    /// Store only the IP binding
    pub fn write_binding(&self, headers: &mut HeaderMap, client_ip: &str) {
        append_cookie(headers, self.set(IP_COOKIE, client_ip));
    }

    /// Remove both session cookies
    pub fn clear_session(&self, headers: &mut HeaderMap) {
        append_cookie(headers, self.delete(TOKEN_COOKIE));
        append_cookie(headers, self.delete(IP_COOKIE));
    }

    fn render(&self, name: &str, value: &str, max_age: i64, expires: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}; Expires={}",
            name, value, max_age, expires
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn append_cookie(headers: &mut HeaderMap, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!("Dropping unencodable cookie: {}", e),
    }
}

fn http_date(at: chrono::DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Find a cookie across every `Cookie` header of the request
fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
