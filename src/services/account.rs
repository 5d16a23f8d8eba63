//! Account service
//!
//! Registration, credential checks for login, and account lookups. The
//! service never touches cookies or credentials; the API layer turns a
//! successful login into a session.

use crate::db::repositories::UserRepository;
use crate::models::{Role, User};
use crate::services::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use anyhow::Context;
use std::sync::Arc;

/// Error types for account operations
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email already registered")]
    EmailTaken,

    /// Unknown email and wrong password are deliberately indistinguishable
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Input for registering a participant
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

pub struct AccountService {
    user_repo: Arc<dyn UserRepository>,
}

impl AccountService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self { user_repo }
    }

    /// Register a participant account
    pub async fn register(&self, input: RegisterInput) -> Result<User, AccountError> {
        let name = input.name.trim();
        let email = normalize_email(&input.email);

        if name.is_empty() {
            return Err(AccountError::Validation("Nama wajib diisi".to_string()));
        }
        validate_email(&email)?;
        validate_password(&input.password)?;

        self.create_account(name, &email, &input.password, Role::Participant)
            .await
    }

    /// Check an email/password pair
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let email = normalize_email(email);

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?
            .ok_or(AccountError::InvalidCredentials)?;

        let valid = verify_password(password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, AccountError> {
        let email = normalize_email(email);
        let found = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?;
        Ok(found.is_some())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, AccountError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    pub async fn list_users(
        &self,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<User>, i64), AccountError> {
        Ok(self
            .user_repo
            .list(page, per_page)
            .await
            .context("Failed to list users")?)
    }

    /// Create the bootstrap admin unless the email is already taken.
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, AccountError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        if self.email_exists(&email).await? {
            return Ok(false);
        }

        self.create_account("Administrator", &email, password, Role::Admin)
            .await?;
        Ok(true)
    }

    async fn create_account(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AccountError> {
        if self.email_exists(email).await? {
            return Err(AccountError::EmailTaken);
        }

        let password_hash = hash_password(password).context("Failed to hash password")?;
        let user = User::new(name.to_string(), email.to_string(), password_hash, role);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, role = %created.role, "Account created");
        Ok(created)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AccountError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(AccountError::Validation("Format email tidak valid".to_string()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::Validation(format!(
            "Password minimal {} karakter",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
