//! Database repositories
//!
//! Repository traits and their sqlx implementations.

pub mod user;

pub use user::{SqlxUserRepository, UserRepository};
