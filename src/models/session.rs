//! Session credential model

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// Claims signed into a session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user) id
    pub sub: String,
    /// Role claim
    pub role: Role,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
}

/// A verified credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub subject_id: String,
    pub role: Role,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Credential {
    /// Valid iff `now < expires_at`; no clock-skew allowance.
    pub fn is_valid_at(&self, now: i64) -> bool {
        now < self.expires_at
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }
}

impl From<Claims> for Credential {
    fn from(claims: Claims) -> Self {
        Self {
            subject_id: claims.sub,
            role: claims.role,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

/// Where a credential was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// The `phc_token` cookie; subject to IP pinning and sliding renewal
    Cookie,
    /// An `Authorization: Bearer` header; stateless
    Bearer,
}

/// Identity attached to a request the gate let through.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub credential: Credential,
    pub source: CredentialSource,
    /// Client IP observed on this request
    pub client_ip: String,
}

impl AuthenticatedSession {
    pub fn subject_id(&self) -> &str {
        &self.credential.subject_id
    }

    pub fn role(&self) -> Role {
        self.credential.role
    }
}
