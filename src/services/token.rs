//! Session credential codec
//!
//! Credentials are HS256-signed JWTs carrying `{sub, role, iat, exp}`.
//! `exp - iat` is always the configured session lifetime. Expiry is checked
//! here against the caller's clock with no leeway, so a credential is valid
//! iff `now < exp`.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use uuid::Uuid;

use crate::models::{Claims, Credential, Role};

/// Why a credential was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed credential")]
    Malformed,
    #[error("Credential signature mismatch")]
    BadSignature,
    #[error("Credential expired")]
    Expired,
    #[error("Failed to sign credential: {0}")]
    Encode(String),
}

/// Issues and verifies session credentials.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl_seconds: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in `verify_at` against an explicit clock.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl_seconds,
        }
    }

    /// Codec with a random per-process secret. Credentials do not survive
    /// a restart.
    pub fn ephemeral(ttl_seconds: i64) -> Self {
        let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        Self::new(secret.as_bytes(), ttl_seconds)
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue a credential valid for the session lifetime from now.
    pub fn issue(&self, subject_id: &str, role: Role) -> Result<String, TokenError> {
        self.issue_at(subject_id, role, Utc::now().timestamp())
    }

    /// Issue a credential as if the clock read `now`.
    pub fn issue_at(&self, subject_id: &str, role: Role, now: i64) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject_id.to_string(),
            role,
            iat: now,
            exp: now + self.ttl_seconds,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Credential, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify signature and structure, then expiry against `now`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Credential, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        let credential = Credential::from(data.claims);
        if credential.expires_at - credential.issued_at != self.ttl_seconds {
            return Err(TokenError::Malformed);
        }
        if !credential.is_valid_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(credential)
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    const TTL: i64 = 1800;
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.";

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::Admin),
            Just(Role::Staff),
            Just(Role::Doctor),
            Just(Role::Participant),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// verify(issue(s, r)) yields (s, r) before expiry and fails after
        #[test]
        fn roundtrip_within_lifetime(
            subject in "[0-9]{1,10}",
            role in role_strategy(),
            issued in 1_600_000_000i64..1_900_000_000,
            elapsed in 0i64..(2 * TTL),
        ) {
            let codec = TokenCodec::new(b"property-secret", TTL);
            let token = codec.issue_at(&subject, role, issued).unwrap();
            let result = codec.verify_at(&token, issued + elapsed);

            if elapsed < TTL {
                let credential = result.unwrap();
                prop_assert_eq!(credential.subject_id, subject);
                prop_assert_eq!(credential.role, role);
            } else {
                prop_assert_eq!(result, Err(TokenError::Expired));
            }
        }

        /// Any single-character mutation is rejected
        #[test]
        fn tampered_tokens_rejected(
            subject in "[0-9]{1,6}",
            role in role_strategy(),
            position in any::<prop::sample::Index>(),
            replacement in any::<prop::sample::Index>(),
        ) {
            let codec = TokenCodec::new(b"property-secret", TTL);
            let token = codec.issue(&subject, role).unwrap();

            let mut bytes = token.clone().into_bytes();
            let i = position.index(bytes.len());
            let mut c = ALPHABET[replacement.index(ALPHABET.len())];
            if c == bytes[i] {
                c = if c == b'A' { b'B' } else { b'A' };
            }
            bytes[i] = c;
            let tampered = String::from_utf8(bytes).unwrap();

            prop_assert!(codec.verify(&tampered).is_err());
        }
    }
}
