//! Credential sourcing
//!
//! A request may present a credential in the `phc_token` cookie or in an
//! `Authorization: Bearer` header. Both are signed tokens and are checked
//! by the same codec, in that order. The session gate and the upload gate
//! share this single lookup.

use axum::http::{header, HeaderMap};

use crate::models::{Credential, CredentialSource};
use crate::services::{SessionCookies, TokenCodec, TokenError, TOKEN_COOKIE};

/// Strategies in priority order
const STRATEGIES: [CredentialSource; 2] = [CredentialSource::Cookie, CredentialSource::Bearer];

/// Why a request could not be authenticated. The display text is the
/// message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("Anda belum login. Silakan login terlebih dahulu.")]
    Missing,

    #[error("Sesi Anda telah berakhir. Silakan login kembali.")]
    Invalid(#[source] TokenError),

    #[error("Sesi tidak valid karena alamat IP berubah. Silakan login kembali.")]
    IpMismatch,
}

impl AuthFailure {
    /// Machine-readable reason for clients, only set for security events
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            AuthFailure::IpMismatch => Some("ip_changed"),
            _ => None,
        }
    }
}

/// Every credential the request presents, verified, in priority order
pub fn presented_credentials(
    headers: &HeaderMap,
    tokens: &TokenCodec,
    cookies: &SessionCookies,
) -> Vec<(CredentialSource, Result<Credential, TokenError>)> {
    STRATEGIES
        .iter()
        .filter_map(|&source| {
            extract(source, headers, cookies).map(|token| (source, tokens.verify(&token)))
        })
        .collect()
}

/// First valid credential. When none is valid, the failure of the
/// highest-priority credential that was presented is reported.
pub fn authenticate(
    headers: &HeaderMap,
    tokens: &TokenCodec,
    cookies: &SessionCookies,
) -> Result<(Credential, CredentialSource), AuthFailure> {
    let mut first_failure = None;

    for (source, result) in presented_credentials(headers, tokens, cookies) {
        match result {
            Ok(credential) => return Ok((credential, source)),
            Err(e) => {
                first_failure.get_or_insert(e);
            }
        }
    }

    Err(first_failure
        .map(AuthFailure::Invalid)
        .unwrap_or(AuthFailure::Missing))
}

fn extract(source: CredentialSource, headers: &HeaderMap, cookies: &SessionCookies) -> Option<String> {
    match source {
        CredentialSource::Cookie => cookies.get(headers, TOKEN_COOKIE),
        CredentialSource::Bearer => bearer_token(headers),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
