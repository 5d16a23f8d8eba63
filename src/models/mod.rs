//! Data models
//!
//! - Database entities (User)
//! - Session credential types shared by the token codec and the gate

mod session;
mod user;

pub use session::{AuthenticatedSession, Claims, Credential, CredentialSource};
pub use user::{Role, User};
