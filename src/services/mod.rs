//! Services layer - Business logic
//!
//! Services implement the portal's rules independent of HTTP:
//! - Account registration and credential checks
//! - Signed session tokens and the cookies that carry them
//! - Role capabilities
//! - Image upload storage

pub mod account;
pub mod password;
pub mod policy;
pub mod session_store;
pub mod token;
pub mod upload;

pub use account::{AccountError, AccountService, RegisterInput};
pub use password::{hash_password, verify_password};
pub use policy::{can, capabilities, has_role, Capability};
pub use session_store::{SessionCookies, IP_COOKIE, TOKEN_COOKIE};
pub use token::{TokenCodec, TokenError};
pub use upload::{StoredFile, UploadError, UploadKind, UploadStore};
