//! User model
//!
//! Portal accounts and the closed set of roles a credential can assert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A portal account (back-office staff, doctors and participants alike).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Email address (unique, stored lowercase)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Account role
    pub role: Role,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with an already hashed password.
    pub fn new(name: String, email: String, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            name,
            email,
            password_hash,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    /// Subject id carried in this user's credentials
    pub fn subject_id(&self) -> String {
        self.id.to_string()
    }
}

/// Role claim carried by a credential.
///
/// - Admin: back-office administrator, implies every other role
/// - Staff: back-office operator
/// - Doctor: practitioner listed in the directory
/// - Participant: site member enrolled in health programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Doctor,
    Participant,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Staff, Role::Doctor, Role::Participant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Doctor => "doctor",
            Role::Participant => "participant",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Participant
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "doctor" => Ok(Role::Doctor),
            "participant" => Ok(Role::Participant),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}
